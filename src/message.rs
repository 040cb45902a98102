//! Type-erased message values carried between callers and actors.
//!
//! An [`Envelope`] holds exactly one value of any `'static + Clone + Send` type, together with that type's
//! runtime identity. Handlers receive envelopes by value and inspect them with [`Envelope::is`],
//! [`Envelope::downcast_ref`] or [`Envelope::downcast`]. Asking for the wrong type is an explicit
//! [`EnvelopeError::TypeMismatch`], never a reinterpretation of the bytes.
//!
//! Cloning an envelope clones the held value using the value's own [`Clone`] implementation, which is how the
//! registry and broker hand each recipient its own copy.

use std::{
    any::{self, Any, TypeId},
    fmt, mem,
};

use dyn_clone::DynClone;

use crate::error::EnvelopeError;

trait Payload: DynClone + Send {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
    fn held_type_id(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
}

dyn_clone::clone_trait_object!(Payload);

#[derive(Clone)]
struct Held<T>(T);

impl<T> Payload for Held<T>
where
    T: Any + Clone + Send,
{
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        Box::new(self.0)
    }

    fn held_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

/// A type-erased carrier for a single message value.
///
/// # Example
///
/// ```
/// use courier::message::Envelope;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// let envelope = Envelope::new(Point { x: 7, y: 8 });
/// assert!(envelope.is::<Point>());
/// assert!(envelope.downcast_ref::<String>().is_err());
/// assert_eq!(envelope.downcast::<Point>().unwrap(), Point { x: 7, y: 8 });
/// ```
#[derive(Clone, Default)]
pub struct Envelope {
    payload: Option<Box<dyn Payload>>,
}

impl Envelope {
    /// Wraps a value in a new envelope.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Clone + Send,
    {
        Envelope {
            payload: Some(Box::new(Held(value))),
        }
    }

    /// Creates an envelope holding nothing.
    ///
    /// Empty envelopes are the reply of handlers which have nothing to return.
    pub const fn empty() -> Self {
        Envelope { payload: None }
    }

    /// Returns `true` if the envelope holds no value.
    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    /// Returns the [`TypeId`] of the held value, or `None` if the envelope is empty.
    pub fn type_id(&self) -> Option<TypeId> {
        self.payload.as_deref().map(Payload::held_type_id)
    }

    /// Returns the name of the held value's type, or `None` if the envelope is empty.
    ///
    /// The name is for diagnostics only, see [`std::any::type_name`].
    pub fn type_name(&self) -> Option<&'static str> {
        self.payload.as_deref().map(Payload::type_name)
    }

    /// Returns `true` if the envelope holds a value of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id() == Some(TypeId::of::<T>())
    }

    /// Borrows the held value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Result<&T, EnvelopeError> {
        let payload = self.payload.as_deref().ok_or(EnvelopeError::Empty)?;
        payload
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| EnvelopeError::TypeMismatch {
                expected: any::type_name::<T>(),
                found: payload.type_name(),
            })
    }

    /// Consumes the envelope, returning the held value as a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, EnvelopeError> {
        let payload = self.payload.ok_or(EnvelopeError::Empty)?;
        let found = payload.type_name();
        let mismatch = EnvelopeError::TypeMismatch {
            expected: any::type_name::<T>(),
            found,
        };
        if payload.held_type_id() != TypeId::of::<T>() {
            return Err(mismatch);
        }

        payload
            .into_any()
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| mismatch)
    }

    /// Moves the value out into a new envelope, leaving this one empty.
    pub fn take(&mut self) -> Envelope {
        mem::take(self)
    }

    /// Drops the held value, leaving the envelope empty.
    pub fn clear(&mut self) {
        self.payload = None;
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => f.debug_tuple("Envelope").field(&name).finish(),
            None => write!(f, "Envelope(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn reports_held_type() {
        let envelope = Envelope::new(Point { x: 7, y: 8 });
        assert!(envelope.is::<Point>());
        assert!(!envelope.is::<(i32, i32)>());
        assert_eq!(envelope.type_id(), Some(TypeId::of::<Point>()));
        assert!(envelope.type_name().unwrap().ends_with("Point"));
        assert_eq!(envelope.downcast::<Point>(), Ok(Point { x: 7, y: 8 }));
    }

    #[test]
    fn wrong_type_is_a_mismatch() {
        let envelope = Envelope::new(Point { x: 7, y: 8 });
        assert!(matches!(
            envelope.downcast_ref::<String>(),
            Err(EnvelopeError::TypeMismatch { expected, .. }) if expected.ends_with("String")
        ));
        assert!(matches!(
            envelope.downcast::<i32>(),
            Err(EnvelopeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn empty_envelope() {
        let envelope = Envelope::empty();
        assert!(envelope.is_empty());
        assert_eq!(envelope.type_id(), None);
        assert!(!envelope.is::<()>());
        assert_eq!(envelope.downcast::<()>(), Err(EnvelopeError::Empty));
        assert_eq!(format!("{:?}", Envelope::default()), "Envelope(<empty>)");
    }

    #[test]
    fn clone_uses_value_clone() {
        #[derive(Debug)]
        struct Counted(Arc<AtomicUsize>);

        impl Clone for Counted {
            fn clone(&self) -> Self {
                self.0.fetch_add(1, Ordering::SeqCst);
                Counted(self.0.clone())
            }
        }

        let clones = Arc::new(AtomicUsize::new(0));
        let envelope = Envelope::new(Counted(clones.clone()));
        let copy = envelope.clone();
        assert_eq!(clones.load(Ordering::SeqCst), 1);
        assert!(copy.is::<Counted>());
        assert!(envelope.is::<Counted>());
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut envelope = Envelope::new(String::from("hello"));
        let moved = envelope.take();
        assert!(envelope.is_empty());
        assert_eq!(moved.downcast_ref::<String>().map(String::as_str), Ok("hello"));

        let mut envelope = moved;
        envelope.clear();
        assert!(envelope.is_empty());
    }
}
