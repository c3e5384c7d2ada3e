mod op;


use derive_more::Display;

// re-exports
pub use op::{Category, Operator, classify};

///
/// CONSTANTS
///

/// Digits rendered after the decimal point for inline double literals.
pub const DOUBLE_PRECISION: usize = 15;

///
/// LiteralKind
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum LiteralKind {
    #[display("null")]
    Null,
    #[display("bool")]
    Bool,
    #[display("int32")]
    Int32,
    #[display("int64")]
    Int64,
    #[display("double")]
    Double,
    #[display("string")]
    String,
}

impl LiteralKind {
    /// Stable tag used by query fingerprints.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Null => 0x00,
            Self::Bool => 0x01,
            Self::Int32 => 0x02,
            Self::Int64 => 0x03,
            Self::Double => 0x04,
            Self::String => 0x05,
        }
    }
}

///
/// Literal
///
/// Closed set of literal values a predicate may carry.
/// Conversions from application values pick the matching kind exactly;
/// there is no implicit widening between kinds.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
}

impl Literal {
    #[must_use]
    pub const fn kind(&self) -> LiteralKind {
        match self {
            Self::Null => LiteralKind::Null,
            Self::Bool(_) => LiteralKind::Bool,
            Self::Int32(_) => LiteralKind::Int32,
            Self::Int64(_) => LiteralKind::Int64,
            Self::Double(_) => LiteralKind::Double,
            Self::String(_) => LiteralKind::String,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Size in bytes of the payload handed to the statement binder.
    /// Only text has a variable width.
    #[must_use]
    pub const fn bind_len(&self) -> usize {
        match self {
            Self::String(s) => s.len(),
            _ => 0,
        }
    }

    /// Render this literal as inline SQL text.
    ///
    /// Used only where values are embedded instead of bound, i.e. trigger
    /// conditions. Text is single-quoted with embedded quotes doubled.
    /// Non-finite doubles have no SQL spelling and render as `NULL`.
    #[must_use]
    pub fn render_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Int32(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::Double(v) if v.is_finite() => format!("{:.*}", DOUBLE_PRECISION, v),
            Self::Double(_) => "NULL".to_string(),
            Self::String(s) => quote_text(s),
        }
    }
}

// ----------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

fn quote_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}
