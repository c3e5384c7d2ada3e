//! Structural validation of a snapshot against the target table.
//!
//! Runs before any rendering so the compiler can assume a well-formed node
//! list: operands and links alternate, keywords trail, side channels are in
//! range, and every field resolves to a queryable leaf.


use crate::{
    MAX_IN_KEYS, MAX_KEY_SIZE,
    error::QueryError,
    query::node::{PredicateNode, QuerySnapshot},
    schema::{FieldPath, LeafType, SchemaInfo, TableDescriptor},
    value::{Category, Operator},
};

/// Validate `snapshot` for compilation against `table`.
pub(crate) fn check(
    snapshot: &QuerySnapshot,
    schema: &dyn SchemaInfo,
    table: &TableDescriptor,
) -> Result<(), QueryError> {
    if !snapshot.is_valid() {
        return Err(QueryError::invalid_format("query builder is invalid"));
    }

    check_side_channels(snapshot, table)?;
    check_fields(snapshot, schema, table)?;
    check_sequence(snapshot.nodes())?;
    check_trailing(snapshot.nodes())?;

    Ok(())
}

/// Resolve the declared type of a field the way the compiler will render it.
pub(crate) fn resolve_field(
    field: &str,
    schema: &dyn SchemaInfo,
    table: &TableDescriptor,
) -> Result<(FieldPath, LeafType), QueryError> {
    let path = FieldPath::parse(field).map_err(|_| QueryError::invalid_field(field))?;
    if table.is_relational() && (field.starts_with("$.") || path.depth() != 1) {
        return Err(QueryError::invalid_field(field));
    }
    let ty = schema.field_type(&path)?;

    Ok((path, ty))
}

fn check_side_channels(snapshot: &QuerySnapshot, table: &TableDescriptor) -> Result<(), QueryError> {
    let count = |op: Operator| snapshot.nodes().iter().filter(|n| n.op == op).count();

    if count(Operator::PrefixKey) > 1 {
        return Err(QueryError::invalid_format("prefix key set more than once"));
    }
    if let Some(prefix) = snapshot.prefix_key() {
        if table.is_relational() {
            return Err(QueryError::invalid_format(
                "prefix key is not supported on relational tables",
            ));
        }
        if prefix.len() > MAX_KEY_SIZE {
            return Err(QueryError::invalid_format("prefix key is too long"));
        }
    }

    if count(Operator::InKeys) > 0 {
        if table.is_relational() {
            return Err(QueryError::invalid_format(
                "key sets are not supported on relational tables",
            ));
        }
        let keys = snapshot.keys();
        if keys.is_empty() {
            return Err(QueryError::invalid_format("key set is empty"));
        }
        if keys.len() > MAX_IN_KEYS {
            return Err(QueryError::invalid_format("key set is too large"));
        }
        if keys.iter().any(|k| k.is_empty() || k.len() > MAX_KEY_SIZE) {
            return Err(QueryError::invalid_format("key set holds an invalid key"));
        }
    }

    if snapshot.has_order_by() && snapshot.sort_mode().clause().is_some() {
        return Err(QueryError::invalid_format(
            "write-time order cannot be combined with order_by",
        ));
    }

    Ok(())
}

fn check_fields(
    snapshot: &QuerySnapshot,
    schema: &dyn SchemaInfo,
    table: &TableDescriptor,
) -> Result<(), QueryError> {
    for node in snapshot.nodes() {
        let category = node.category();
        if !category.is_value() && node.op != Operator::OrderBy {
            continue;
        }

        let (_, ty) = resolve_field(&node.field, schema, table)?;
        if ty != LeafType::Bool {
            continue;
        }

        match node.op {
            Operator::OrderBy => {
                return Err(QueryError::invalid_format("cannot order by a bool field"));
            }
            Operator::EqualTo | Operator::NotEqualTo => {}
            _ if category == Category::Compare => {
                return Err(QueryError::invalid_format(
                    "bool fields only support equality",
                ));
            }
            _ => {}
        }
    }

    Ok(())
}

// Body nodes are everything the predicate text is made of; side-channel
// markers sit outside the alternation.
fn check_sequence(nodes: &[PredicateNode]) -> Result<(), QueryError> {
    let body: Vec<&PredicateNode> = nodes
        .iter()
        .filter(|n| !n.category().is_side_channel())
        .collect();

    let mut seen_keyword = false;
    for (i, node) in body.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| body[p]);
        let next = body.get(i + 1).copied();

        if node.category() == Category::Invalid {
            return Err(QueryError::invalid_format("invalid node"));
        }
        if node.category() == Category::Keyword {
            seen_keyword = true;
            continue;
        }
        if seen_keyword {
            return Err(QueryError::invalid_format(
                "predicates cannot follow order_by or limit",
            ));
        }

        match node.category() {
            Category::LinkMarker => {
                if !prev.is_some_and(ends_operand) {
                    return Err(QueryError::invalid_format("link without a left operand"));
                }
                if !next.is_some_and(starts_operand) {
                    return Err(QueryError::invalid_format("link without a right operand"));
                }
            }
            Category::GroupMarker if node.op == Operator::BeginGroup => {
                if !next.is_some_and(starts_operand) {
                    return Err(QueryError::invalid_format("empty group"));
                }
            }
            _ => {
                if next.is_some_and(starts_operand) {
                    return Err(QueryError::invalid_format(
                        "adjacent predicates need a link",
                    ));
                }
            }
        }
    }

    Ok(())
}

fn check_trailing(nodes: &[PredicateNode]) -> Result<(), QueryError> {
    let last = nodes.len().saturating_sub(1);
    for (i, node) in nodes.iter().enumerate() {
        match node.op {
            Operator::SuggestIndex if i != last => {
                return Err(QueryError::invalid_format("suggest_index must be last"));
            }
            Operator::Limit => {
                let trailing = i == last
                    || (i + 1 == last && nodes[last].op == Operator::SuggestIndex);
                if !trailing {
                    return Err(QueryError::invalid_format("limit must be last"));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn starts_operand(node: &PredicateNode) -> bool {
    node.category().is_value() || node.op == Operator::BeginGroup
}

fn ends_operand(node: &PredicateNode) -> bool {
    node.category().is_value() || node.op == Operator::EndGroup
}
