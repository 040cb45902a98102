//! Wildcard patterns over `/`-delimited names.
//!
//! Registry addresses and broker topics are names made of segments separated by `/`. A name starting with `/`
//! is absolute, and a pattern only matches names that agree with it on the leading `/`.
//!
//! Pattern segments are matched left to right:
//!
//! - a literal segment matches exactly the same segment,
//! - `+` matches any single non-empty segment,
//! - `#` matches one or more remaining non-empty segments, and may only appear as the final segment.
//!
//! Wildcards are only recognized as whole segments. `a+` or `#b` are plain literals.
//!
//! ```
//! use courier::topic::Pattern;
//!
//! let pattern: Pattern = "/a/actor/#".parse()?;
//! assert!(pattern.matches("/a/actor/1"));
//! assert!(pattern.matches("/a/actor/1/inbox"));
//! assert!(!pattern.matches("/a/actor"));
//! assert!(!pattern.matches("/b/actor/2"));
//! # Ok::<(), courier::error::PatternError>(())
//! ```

use std::{fmt, str::FromStr};

use crate::error::PatternError;

const SEPARATOR: char = '/';
const SINGLE_LEVEL: &str = "+";
const MULTI_LEVEL: &str = "#";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    SingleLevel,
    MultiLevel,
}

/// A parsed wildcard pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern {
    source: String,
    absolute: bool,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses a pattern.
    ///
    /// Fails if the pattern is empty, contains an empty segment, or has `#` anywhere but the final segment.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let (absolute, body) = split_root(pattern);
        let count = body.split(SEPARATOR).count();
        let segments: Vec<Segment> = body
            .split(SEPARATOR)
            .enumerate()
            .map(|(position, segment)| match segment {
                "" => Err(PatternError::EmptySegment {
                    pattern: pattern.to_owned(),
                    position,
                }),
                MULTI_LEVEL if position + 1 < count => Err(PatternError::MisplacedMultiLevel {
                    pattern: pattern.to_owned(),
                    position,
                }),
                MULTI_LEVEL => Ok(Segment::MultiLevel),
                SINGLE_LEVEL => Ok(Segment::SingleLevel),
                literal => Ok(Segment::Literal(literal.to_owned())),
            })
            .collect::<Result<_, _>>()?;

        Ok(Pattern {
            source: pattern.to_owned(),
            absolute,
            segments,
        })
    }

    /// Returns the pattern as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the pattern contains `+` or `#`.
    pub fn has_wildcards(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| !matches!(segment, Segment::Literal(_)))
    }

    /// Tests a name against the pattern.
    pub fn matches(&self, name: &str) -> bool {
        let (absolute, body) = split_root(name);
        if absolute != self.absolute {
            return false;
        }

        let mut parts = body.split(SEPARATOR);
        for segment in &self.segments {
            match segment {
                Segment::MultiLevel => {
                    let mut rest = parts.by_ref().peekable();
                    return rest.peek().is_some() && rest.all(|part| !part.is_empty());
                }
                Segment::SingleLevel => match parts.next() {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                Segment::Literal(literal) => {
                    if parts.next() != Some(literal.as_str()) {
                        return false;
                    }
                }
            }
        }

        parts.next().is_none()
    }
}

fn split_root(name: &str) -> (bool, &str) {
    match name.strip_prefix(SEPARATOR) {
        Some(body) => (true, body),
        None => (false, name),
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::new(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> Pattern {
        Pattern::new(s).unwrap()
    }

    #[test]
    fn multi_level_matches_one_or_more() {
        let p = pattern("/a/actor/#");
        assert!(p.matches("/a/actor/1"));
        assert!(p.matches("/a/actor/2"));
        assert!(p.matches("/a/actor/2/3"));
        assert!(!p.matches("/a/actor"));
        assert!(!p.matches("/b/actor/2"));
        assert!(!p.matches("/a/actor/"));
        assert!(!p.matches("/a/actor//x"));
        assert!(!p.matches("/a/actor/x/"));
    }

    #[test]
    fn single_level_matches_exactly_one() {
        let p = pattern("/+/actor/2");
        assert!(p.matches("/a/actor/2"));
        assert!(p.matches("/b/actor/2"));
        assert!(!p.matches("/a/actor/1"));
        assert!(!p.matches("//actor/2"));
        assert!(!p.matches("/a/b/actor/2"));
    }

    #[test]
    fn literals_match_exactly() {
        let p = pattern("sensors/kitchen");
        assert!(p.matches("sensors/kitchen"));
        assert!(!p.matches("sensors/kitchen/temp"));
        assert!(!p.matches("sensors"));
        assert!(!p.has_wildcards());

        let p = pattern("a+/#b");
        assert!(p.matches("a+/#b"));
        assert!(!p.matches("a/b"));
    }

    #[test]
    fn leading_separator_must_agree() {
        assert!(!pattern("/a/+").matches("a/b"));
        assert!(!pattern("a/+").matches("/a/b"));
        assert!(pattern("#").matches("a/b/c"));
        assert!(!pattern("#").matches("/a"));
        assert!(!pattern("#").matches(""));
        assert!(!pattern("/#").matches("/"));
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert_eq!(Pattern::new(""), Err(PatternError::Empty));
        assert!(matches!(
            Pattern::new("/a//b"),
            Err(PatternError::EmptySegment { position: 1, .. })
        ));
        assert!(matches!(
            Pattern::new("a/b/"),
            Err(PatternError::EmptySegment { position: 2, .. })
        ));
        assert!(matches!(
            Pattern::new("/"),
            Err(PatternError::EmptySegment { position: 0, .. })
        ));
        assert!(matches!(
            "/a/#/b".parse::<Pattern>(),
            Err(PatternError::MisplacedMultiLevel { position: 1, .. })
        ));
    }

    #[test]
    fn displays_source() {
        assert_eq!(pattern("/+/x/#").to_string(), "/+/x/#");
        assert_eq!(pattern("/+/x/#").as_str(), "/+/x/#");
    }
}
