use std::{fmt, sync::Arc};

type Step<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// A chain of functions from `T` to `T`, run in the order they were added.
///
/// Continuations are cheap to clone and can be moved to other threads, such as an actor's workers.
///
/// ```
/// use std::thread;
/// use courier::sync::Continuation;
///
/// let cont = Continuation::new(|x: i32| x + 1)
///     .then(|x| x * 10)
///     .then(|x| x - 3);
/// assert_eq!(cont.run(1), 17);
///
/// let remote = cont.clone();
/// assert_eq!(thread::spawn(move || remote.run(2)).join().unwrap(), 27);
/// ```
pub struct Continuation<T> {
    step: Step<T>,
}

impl<T: 'static> Continuation<T> {
    /// Creates a continuation running a single function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        Continuation { step: Arc::new(f) }
    }

    /// Returns a continuation feeding this one's output into `f`.
    ///
    /// `self` is left unchanged, so a prefix can be shared by several chains.
    pub fn then<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        let first = self.step.clone();
        Continuation::new(move |value| f(first(value)))
    }

    /// Runs the chain on `value`.
    pub fn run(&self, value: T) -> T {
        (self.step)(value)
    }
}

impl<T> Clone for Continuation<T> {
    fn clone(&self) -> Self {
        Continuation {
            step: self.step.clone(),
        }
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation").finish_non_exhaustive()
    }
}
