//! Module: schema
//! Responsibility: collaborator contracts the compiler consults while rendering.
//! Does not own: schema storage, schema evolution, or document decoding.
//! Boundary: the host store implements `SchemaInfo`; `MapSchema` is a plain
//! in-memory implementation for hosts with a static field map.

mod path;


use derive_more::Display;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

// re-exports
pub use path::{FieldPath, FieldPathError, MAX_PATH_DEPTH};

///
/// SchemaError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SchemaError {
    #[error("field '{path}' is not declared in the schema")]
    UnknownField { path: String },

    #[error("field '{path}' is not a queryable leaf")]
    NotQueryable { path: String },

    #[error(transparent)]
    Path(#[from] FieldPathError),
}

///
/// LeafType
///
/// Declared type of a queryable document leaf.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq)]
pub enum LeafType {
    Bool,
    Integer,
    Long,
    Double,
    String,
}

impl LeafType {
    /// SQL type used when casting an extracted document value.
    #[must_use]
    pub const fn sql_cast_type(self) -> &'static str {
        match self {
            Self::Bool | Self::Integer | Self::Long => "INT",
            Self::Double => "REAL",
            Self::String => "TEXT",
        }
    }
}

///
/// SchemaEncoding
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum SchemaEncoding {
    #[default]
    Json,
    FlatBuffer,
}

impl SchemaEncoding {
    /// Name of the SQL function that extracts a leaf from an encoded value.
    #[must_use]
    pub const fn extract_function(self) -> &'static str {
        match self {
            Self::Json => "json_extract_by_path",
            Self::FlatBuffer => "flatbuffer_extract_by_path",
        }
    }
}

///
/// SchemaInfo
///
/// Read-only view of the host's schema.
///

pub trait SchemaInfo: Send + Sync {
    /// Declared leaf type for `path`, or an error when the path is not a
    /// queryable leaf.
    fn field_type(&self, path: &FieldPath) -> Result<LeafType, SchemaError>;

    fn index_exists(&self, name: &str) -> bool;

    fn encoding(&self) -> SchemaEncoding;

    /// Bytes to skip at the front of a stored value before the encoded document.
    fn skip_size(&self) -> u32;
}

///
/// StoreKind
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq)]
pub enum StoreKind {
    Document,
    Relational,
}

///
/// TableDescriptor
///
/// Target table of a compile. `fields` is the projection used by relational
/// sync selects; empty means every column.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub store: StoreKind,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl TableDescriptor {
    #[must_use]
    pub fn document(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: StoreKind::Document,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn relational(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: StoreKind::Relational,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn is_relational(&self) -> bool {
        matches!(self.store, StoreKind::Relational)
    }
}

///
/// MapSchema
///

#[derive(Clone, Debug, Default)]
pub struct MapSchema {
    fields: BTreeMap<String, LeafType>,
    indexes: BTreeSet<String>,
    encoding: SchemaEncoding,
    skip_size: u32,
}

impl MapSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a leaf. Invalid paths are ignored and stay unknown.
    #[must_use]
    pub fn with_field(mut self, path: &str, ty: LeafType) -> Self {
        if let Ok(path) = FieldPath::parse(path) {
            self.fields.insert(path.dotted(), ty);
        }
        self
    }

    #[must_use]
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.indexes.insert(name.into());
        self
    }

    #[must_use]
    pub const fn with_encoding(mut self, encoding: SchemaEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub const fn with_skip_size(mut self, skip_size: u32) -> Self {
        self.skip_size = skip_size;
        self
    }
}

impl SchemaInfo for MapSchema {
    fn field_type(&self, path: &FieldPath) -> Result<LeafType, SchemaError> {
        let key = path.dotted();
        if let Some(ty) = self.fields.get(&key) {
            return Ok(*ty);
        }

        // a declared descendant means the path names an object, not a leaf
        let nested = format!("{key}.");
        if self.fields.keys().any(|declared| declared.starts_with(&nested)) {
            return Err(SchemaError::NotQueryable { path: key });
        }

        Err(SchemaError::UnknownField { path: key })
    }

    fn index_exists(&self, name: &str) -> bool {
        self.indexes.contains(name)
    }

    fn encoding(&self) -> SchemaEncoding {
        self.encoding
    }

    fn skip_size(&self) -> u32 {
        self.skip_size
    }
}
