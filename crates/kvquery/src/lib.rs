//! Query surface for the syncable key-value store: typed literals, a fluent
//! predicate builder, and the compiler that renders predicate snapshots into
//! parameterized SQL statements with positional binds.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod error;
pub mod query;
pub mod schema;
pub mod sql;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Maximum number of predicate nodes a single builder may accumulate.
pub const MAX_PREDICATE_NODES: usize = 256;

/// Maximum size of a stored key, in bytes.
///
/// Prefix-key upper bounds are padded to this width.
pub const MAX_KEY_SIZE: usize = 1024;

/// Maximum number of keys accepted by an `in_keys` filter.
pub const MAX_IN_KEYS: usize = 128;

/// Character reserved for delimiting generated predicate fragments.
/// Field names and index names may not contain it.
pub const RESERVED_MARKER: char = '^';

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// Errors, limits, and fragment internals stay in their modules.
///

pub mod prelude {
    pub use crate::{
        query::{Query, QuerySnapshot, SortMode},
        schema::{FieldPath, LeafType, SchemaInfo, StoreKind, TableDescriptor},
        sql::{Bind, Compiler, RowProjection, Statement, SyncWindow, TriggerMode},
        value::{Literal, LiteralKind, Operator},
    };
}
