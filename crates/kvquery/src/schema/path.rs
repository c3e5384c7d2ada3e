use derive_more::Deref;
use std::fmt;
use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Maximum nesting depth of a document field path.
pub const MAX_PATH_DEPTH: usize = 4;

const ROOT_PREFIX: &str = "$.";

///
/// FieldPathError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FieldPathError {
    #[error("field path is empty")]
    Empty,

    #[error("field path '{path}' has an empty segment")]
    EmptySegment { path: String },

    #[error("field path segment '{segment}' contains invalid characters")]
    InvalidSegment { segment: String },

    #[error("field path '{path}' is deeper than {max} levels")]
    TooDeep { path: String, max: usize },
}

///
/// FieldPath
///
/// Validated dotted path into a stored document, for example `$.user.age`.
/// The leading `$.` is optional on input and always present on display.
///

#[derive(Clone, Debug, Deref, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, FieldPathError> {
        let body = raw.strip_prefix(ROOT_PREFIX).unwrap_or(raw);
        if body.is_empty() {
            return Err(FieldPathError::Empty);
        }

        let mut segments = Vec::new();
        for segment in body.split('.') {
            if segment.is_empty() {
                return Err(FieldPathError::EmptySegment {
                    path: raw.to_string(),
                });
            }
            if !is_identifier(segment) {
                return Err(FieldPathError::InvalidSegment {
                    segment: segment.to_string(),
                });
            }
            segments.push(segment.to_string());
        }

        if segments.len() > MAX_PATH_DEPTH {
            return Err(FieldPathError::TooDeep {
                path: raw.to_string(),
                max: MAX_PATH_DEPTH,
            });
        }

        Ok(Self(segments))
    }

    /// Path without the root prefix, e.g. `user.age`.
    #[must_use]
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ROOT_PREFIX}{}", self.dotted())
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
