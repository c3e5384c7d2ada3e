
use crate::{
    MAX_PREDICATE_NODES, RESERVED_MARKER,
    query::node::{PredicateNode, QuerySnapshot, SortMode},
    value::{Literal, LiteralKind, Operator},
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// BuildError
///
/// First problem a builder ran into. Recorded, never raised mid-chain.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum BuildError {
    #[error("invalid field '{field}'")]
    InvalidField { field: String },

    #[error("query has more than {max} predicate nodes")]
    TooManyPredicates { max: usize },

    #[error("value list for '{field}' mixes literal kinds")]
    MixedValueKinds { field: String },

    #[error("begin_group/end_group calls are unbalanced")]
    UnbalancedGroups,
}

///
/// Query
///
/// Fluent predicate builder.
///
/// Every call appends or records, and a bad argument only marks the builder
/// invalid. Callers find out at extraction: `build()` reports the recorded
/// cause, `snapshot()` collapses to an invalid snapshot.
///

#[derive(Clone, Debug, Default)]
pub struct Query {
    nodes: Vec<PredicateNode>,
    prefix_key: Option<Vec<u8>>,
    suggest_index: Option<String>,
    keys: BTreeSet<Vec<u8>>,
    has_in_keys: bool,
    sort_mode: SortMode,
    failure: Option<BuildError>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Comparisons
    // ------------------------------------------------------------------

    pub fn equal_to(&mut self, field: &str, value: impl Into<Literal>) -> &mut Self {
        self.compare(Operator::EqualTo, field, value.into())
    }

    pub fn not_equal_to(&mut self, field: &str, value: impl Into<Literal>) -> &mut Self {
        self.compare(Operator::NotEqualTo, field, value.into())
    }

    pub fn greater_than(&mut self, field: &str, value: impl Into<Literal>) -> &mut Self {
        self.compare(Operator::GreaterThan, field, value.into())
    }

    pub fn less_than(&mut self, field: &str, value: impl Into<Literal>) -> &mut Self {
        self.compare(Operator::LessThan, field, value.into())
    }

    pub fn greater_than_or_equal_to(&mut self, field: &str, value: impl Into<Literal>) -> &mut Self {
        self.compare(Operator::GreaterOrEqual, field, value.into())
    }

    pub fn less_than_or_equal_to(&mut self, field: &str, value: impl Into<Literal>) -> &mut Self {
        self.compare(Operator::LessOrEqual, field, value.into())
    }

    // ------------------------------------------------------------------
    // Relational
    // ------------------------------------------------------------------

    pub fn like(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.compare(Operator::Like, field, Literal::from(pattern))
    }

    pub fn not_like(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.compare(Operator::NotLike, field, Literal::from(pattern))
    }

    pub fn is_null(&mut self, field: &str) -> &mut Self {
        self.null_check(Operator::IsNull, field)
    }

    pub fn is_not_null(&mut self, field: &str) -> &mut Self {
        self.null_check(Operator::IsNotNull, field)
    }

    // ------------------------------------------------------------------
    // Ranges
    // ------------------------------------------------------------------

    pub fn in_list<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        self.range(Operator::In, field, values.into_iter().map(Into::into).collect())
    }

    pub fn not_in_list<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        self.range(Operator::NotIn, field, values.into_iter().map(Into::into).collect())
    }

    // ------------------------------------------------------------------
    // Links and groups
    // ------------------------------------------------------------------

    pub fn and(&mut self) -> &mut Self {
        self.push(PredicateNode::marker(Operator::And))
    }

    pub fn or(&mut self) -> &mut Self {
        self.push(PredicateNode::marker(Operator::Or))
    }

    pub fn begin_group(&mut self) -> &mut Self {
        self.push(PredicateNode::marker(Operator::BeginGroup))
    }

    pub fn end_group(&mut self) -> &mut Self {
        self.push(PredicateNode::marker(Operator::EndGroup))
    }

    // ------------------------------------------------------------------
    // Keywords
    // ------------------------------------------------------------------

    pub fn order_by(&mut self, field: &str, ascending: bool) -> &mut Self {
        if !self.accept_field(field) {
            return self;
        }
        self.push(PredicateNode::single(
            Operator::OrderBy,
            field,
            Literal::Bool(ascending),
        ))
    }

    pub const fn order_by_write_time(&mut self, ascending: bool) -> &mut Self {
        self.sort_mode = if ascending {
            SortMode::TimeAsc
        } else {
            SortMode::TimeDesc
        };
        self
    }

    /// Negative counts or offsets leave the builder unchanged.
    pub fn limit(&mut self, count: i32, offset: i32) -> &mut Self {
        if count < 0 || offset < 0 {
            return self;
        }
        self.push(PredicateNode {
            op: Operator::Limit,
            field: String::new(),
            kind: LiteralKind::Int32,
            values: vec![Literal::Int32(count), Literal::Int32(offset)],
        })
    }

    // ------------------------------------------------------------------
    // Side channels
    // ------------------------------------------------------------------

    pub fn prefix_key(&mut self, prefix: impl Into<Vec<u8>>) -> &mut Self {
        self.prefix_key = Some(prefix.into());

        let at = usize::from(self.nodes.first().is_some_and(|n| n.op == Operator::InKeys));
        self.insert(at, PredicateNode::marker(Operator::PrefixKey))
    }

    pub fn suggest_index(&mut self, name: &str) -> &mut Self {
        if !self.accept_field(name) {
            return self;
        }
        self.suggest_index = Some(name.to_string());
        self.push(PredicateNode::marker(Operator::SuggestIndex))
    }

    /// Restrict to an exact key set. Only the first call has an effect.
    pub fn in_keys<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        if self.has_in_keys {
            return self;
        }
        self.has_in_keys = true;
        self.keys = keys.into_iter().map(Into::into).collect();
        self.insert(0, PredicateNode::marker(Operator::InKeys))
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    /// Extract the snapshot, reporting why the builder is invalid.
    pub fn build(&self) -> Result<QuerySnapshot, BuildError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        check_group_balance(&self.nodes)?;

        let has = |op: Operator| self.nodes.iter().any(|n| n.op == op);

        Ok(QuerySnapshot {
            nodes: self.nodes.clone(),
            prefix_key: self.prefix_key.clone(),
            suggest_index: self.suggest_index.clone(),
            keys: self.keys.clone(),
            sort_mode: self.sort_mode,
            has_order_by: has(Operator::OrderBy),
            has_limit: has(Operator::Limit),
            has_prefix_key: self.prefix_key.is_some(),
            is_valid: true,
        })
    }

    /// Extract the snapshot. An invalid builder yields a single invalid node.
    #[must_use]
    pub fn snapshot(&self) -> QuerySnapshot {
        self.build().unwrap_or_else(|_| QuerySnapshot::invalid())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn compare(&mut self, op: Operator, field: &str, value: Literal) -> &mut Self {
        if !self.accept_field(field) {
            return self;
        }
        self.push(PredicateNode::single(op, field, value))
    }

    fn null_check(&mut self, op: Operator, field: &str) -> &mut Self {
        if !self.accept_field(field) {
            return self;
        }
        self.push(PredicateNode {
            op,
            field: field.to_string(),
            kind: LiteralKind::Null,
            values: Vec::new(),
        })
    }

    fn range(&mut self, op: Operator, field: &str, values: Vec<Literal>) -> &mut Self {
        if !self.accept_field(field) {
            return self;
        }

        let kind = values.first().map_or(LiteralKind::Null, Literal::kind);
        if values.iter().any(|v| v.kind() != kind) {
            self.fail(BuildError::MixedValueKinds {
                field: field.to_string(),
            });
            return self;
        }

        self.push(PredicateNode {
            op,
            field: field.to_string(),
            kind,
            values,
        })
    }

    fn accept_field(&mut self, field: &str) -> bool {
        if field.is_empty() || field.contains(RESERVED_MARKER) {
            self.fail(BuildError::InvalidField {
                field: field.to_string(),
            });
            return false;
        }
        true
    }

    fn push(&mut self, node: PredicateNode) -> &mut Self {
        let at = self.nodes.len();
        self.insert(at, node)
    }

    fn insert(&mut self, at: usize, node: PredicateNode) -> &mut Self {
        if self.failure.is_some() {
            return self;
        }
        if self.nodes.len() >= MAX_PREDICATE_NODES {
            self.fail(BuildError::TooManyPredicates {
                max: MAX_PREDICATE_NODES,
            });
            return self;
        }
        self.nodes.insert(at, node);
        self
    }

    fn fail(&mut self, err: BuildError) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }
}

fn check_group_balance(nodes: &[PredicateNode]) -> Result<(), BuildError> {
    let mut depth = 0usize;
    for node in nodes {
        match node.op {
            Operator::BeginGroup => depth += 1,
            Operator::EndGroup => {
                depth = depth.checked_sub(1).ok_or(BuildError::UnbalancedGroups)?;
            }
            _ => {}
        }
    }

    if depth == 0 {
        Ok(())
    } else {
        Err(BuildError::UnbalancedGroups)
    }
}
