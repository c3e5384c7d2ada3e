//! Module: query
//! Responsibility: predicate accumulation and the immutable snapshot handed to the compiler.
//! Does not own: SQL text, bind ordering, or schema resolution.
//! Boundary: `Query` is the single-writer builder; `QuerySnapshot` is what crosses into `sql`.

mod builder;
pub(crate) mod check;
mod fingerprint;
mod node;

// re-exports
pub use builder::{BuildError, Query};
pub use fingerprint::QueryFingerprint;
pub use node::{PredicateNode, QuerySnapshot, SortMode};
