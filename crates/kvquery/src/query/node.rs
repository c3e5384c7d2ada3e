use crate::value::{Category, Literal, LiteralKind, Operator};
use std::collections::BTreeSet;

///
/// SortMode
///
/// Ordering by write timestamp, independent of any `OrderBy` node.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SortMode {
    #[default]
    None,
    TimeAsc,
    TimeDesc,
}

impl SortMode {
    #[must_use]
    pub const fn clause(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::TimeAsc => Some("ORDER BY timestamp ASC "),
            Self::TimeDesc => Some("ORDER BY timestamp DESC "),
        }
    }
}

///
/// PredicateNode
///

#[derive(Clone, Debug, PartialEq)]
pub struct PredicateNode {
    pub(crate) op: Operator,
    pub(crate) field: String,
    pub(crate) kind: LiteralKind,
    pub(crate) values: Vec<Literal>,
}

impl PredicateNode {
    pub(crate) fn marker(op: Operator) -> Self {
        Self {
            op,
            field: String::new(),
            kind: LiteralKind::Null,
            values: Vec::new(),
        }
    }

    pub(crate) fn single(op: Operator, field: &str, value: Literal) -> Self {
        Self {
            op,
            field: field.to_string(),
            kind: value.kind(),
            values: vec![value],
        }
    }

    #[must_use]
    pub const fn op(&self) -> Operator {
        self.op
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.op.category()
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn kind(&self) -> LiteralKind {
        self.kind
    }

    #[must_use]
    pub fn values(&self) -> &[Literal] {
        &self.values
    }
}

///
/// QuerySnapshot
///
/// Immutable result of a builder. The compiler only ever reads it.
/// When `is_valid` is false the node list is a single `Invalid` marker.
///

#[derive(Clone, Debug, PartialEq)]
pub struct QuerySnapshot {
    pub(crate) nodes: Vec<PredicateNode>,
    pub(crate) prefix_key: Option<Vec<u8>>,
    pub(crate) suggest_index: Option<String>,
    pub(crate) keys: BTreeSet<Vec<u8>>,
    pub(crate) sort_mode: SortMode,
    pub(crate) has_order_by: bool,
    pub(crate) has_limit: bool,
    pub(crate) has_prefix_key: bool,
    pub(crate) is_valid: bool,
}

impl QuerySnapshot {
    pub(crate) fn invalid() -> Self {
        Self {
            nodes: vec![PredicateNode::marker(Operator::Invalid)],
            prefix_key: None,
            suggest_index: None,
            keys: BTreeSet::new(),
            sort_mode: SortMode::None,
            has_order_by: false,
            has_limit: false,
            has_prefix_key: false,
            is_valid: false,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[PredicateNode] {
        &self.nodes
    }

    #[must_use]
    pub fn prefix_key(&self) -> Option<&[u8]> {
        self.prefix_key.as_deref()
    }

    #[must_use]
    pub fn suggest_index(&self) -> Option<&str> {
        self.suggest_index.as_deref()
    }

    #[must_use]
    pub const fn keys(&self) -> &BTreeSet<Vec<u8>> {
        &self.keys
    }

    #[must_use]
    pub const fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    #[must_use]
    pub const fn has_order_by(&self) -> bool {
        self.has_order_by
    }

    #[must_use]
    pub const fn has_limit(&self) -> bool {
        self.has_limit
    }

    #[must_use]
    pub const fn has_prefix_key(&self) -> bool {
        self.has_prefix_key
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// True when no node filters on a value; only key selection and paging remain.
    #[must_use]
    pub fn is_query_only_by_key(&self) -> bool {
        self.nodes.iter().all(|node| {
            matches!(
                node.op,
                Operator::Limit | Operator::PrefixKey | Operator::InKeys
            )
        })
    }

    /// Count and offset of the trailing `Limit` node, if any.
    #[must_use]
    pub fn limit_and_offset(&self) -> Option<(i32, i32)> {
        let node = self.nodes.iter().rev().find(|n| n.op == Operator::Limit)?;
        match node.values.as_slice() {
            [count, offset] => Some((count.as_i32()?, offset.as_i32()?)),
            _ => None,
        }
    }

    /// A count ignores ordering and paging, so it only matches the row scan
    /// when neither is present.
    #[must_use]
    pub const fn is_count_valid(&self) -> bool {
        self.is_valid && !self.has_limit && !self.has_order_by
    }

    pub(crate) fn has_value_nodes(&self) -> bool {
        self.nodes.iter().any(|n| n.category().is_value())
    }

    pub(crate) fn order_by_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.op == Operator::OrderBy)
            .count()
    }
}
