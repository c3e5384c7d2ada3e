use crate::{query::BuildError, schema::SchemaError};
use thiserror::Error as ThisError;

///
/// QueryError
///
/// Compile-time failure of a predicate snapshot.
///
/// Every problem with a query is reported here, including problems whose
/// root cause was recorded while the builder was still accumulating nodes.
/// The builder itself never fails mid-chain.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("invalid field path '{field}'")]
    InvalidFieldPath { field: String },

    #[error("query has more than {max} predicate nodes")]
    TooManyPredicates { max: usize },

    #[error("value list for '{field}' has {len} entries (max {max})")]
    TooManyValues {
        field: String,
        len: usize,
        max: usize,
    },

    #[error("bound value is {len} bytes (max {max})")]
    ValueTooLarge { len: usize, max: usize },

    #[error("rendered statement exceeds {max} bytes")]
    TextTooLarge { max: usize },

    #[error("invalid query format: {reason}")]
    InvalidQueryFormat { reason: &'static str },

    #[error("{0}")]
    Schema(#[from] SchemaError),
}

impl QueryError {
    pub(crate) const fn invalid_format(reason: &'static str) -> Self {
        Self::InvalidQueryFormat { reason }
    }

    pub(crate) fn invalid_field(field: impl Into<String>) -> Self {
        Self::InvalidFieldPath {
            field: field.into(),
        }
    }

    /// Stable classification used by callers that only care about the kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFieldPath { .. } | Self::Schema(_) => ErrorKind::InvalidFieldPath,
            Self::TooManyPredicates { .. } => ErrorKind::TooManyPredicates,
            Self::TooManyValues { .. } => ErrorKind::TooManyValues,
            Self::ValueTooLarge { .. } => ErrorKind::ValueTooLarge,
            Self::TextTooLarge { .. } => ErrorKind::TextTooLarge,
            Self::InvalidQueryFormat { .. } => ErrorKind::InvalidQueryFormat,
        }
    }
}

impl From<BuildError> for QueryError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::InvalidField { field } => Self::InvalidFieldPath { field },
            BuildError::TooManyPredicates { max } => Self::TooManyPredicates { max },
            BuildError::MixedValueKinds { .. } => {
                Self::invalid_format("value list mixes literal kinds")
            }
            BuildError::UnbalancedGroups => Self::invalid_format("unbalanced groups"),
        }
    }
}

///
/// ErrorKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    InvalidFieldPath,
    TooManyPredicates,
    TooManyValues,
    ValueTooLarge,
    TextTooLarge,
    InvalidQueryFormat,
}
