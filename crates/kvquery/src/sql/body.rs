//! Predicate body rendering shared by every statement shape.

use crate::{
    error::QueryError,
    query::{PredicateNode, QuerySnapshot},
    schema::{SchemaInfo, TableDescriptor},
    sql::{Bind, field::field_expression, fragment::SqlBuffer},
    value::{Category, Literal, Operator},
};

///
/// ValueMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ValueMode {
    /// Positional placeholders with binds.
    Placeholder,
    /// Inline SQL literals, no binds.
    Inline,
}

///
/// KeywordPolicy
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum KeywordPolicy {
    Render,
    Skip,
}

///
/// BodyOptions
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct BodyOptions<'a> {
    pub(crate) access: &'a str,
    pub(crate) values: ValueMode,
    pub(crate) keywords: KeywordPolicy,
    /// A clause precedes the body, so the opening bracket links with `AND`.
    pub(crate) linked: bool,
    /// Ordering clause rendered before the first `LIMIT`, or after the body.
    pub(crate) write_time_order: Option<&'static str>,
}

impl<'a> BodyOptions<'a> {
    pub(crate) const fn prepared(linked: bool) -> Self {
        Self {
            access: "",
            values: ValueMode::Placeholder,
            keywords: KeywordPolicy::Render,
            linked,
            write_time_order: None,
        }
    }

    pub(crate) const fn inline(access: &'a str, linked: bool) -> Self {
        Self {
            access,
            values: ValueMode::Inline,
            keywords: KeywordPolicy::Render,
            linked,
            write_time_order: None,
        }
    }
}

///
/// KeywordState
///
/// Fold state for consecutive `OrderBy` nodes: one header, comma-joined terms.
///

#[derive(Clone, Copy, Debug)]
struct KeywordState {
    remaining_order_bys: usize,
    emitted_header: bool,
}

///
/// BodyRenderer
///

pub(crate) struct BodyRenderer<'a> {
    pub(crate) schema: &'a dyn SchemaInfo,
    pub(crate) table: &'a TableDescriptor,
}

impl BodyRenderer<'_> {
    pub(crate) fn render(
        &self,
        out: &mut SqlBuffer,
        snapshot: &QuerySnapshot,
        opts: BodyOptions<'_>,
    ) -> Result<(), QueryError> {
        let nodes = snapshot.nodes();
        let mut bracket_open = opens_bracket(nodes);
        if bracket_open {
            out.push(if opts.linked { " AND (" } else { " (" })?;
        }

        let mut pending_order = opts.write_time_order;
        let mut state = KeywordState {
            remaining_order_bys: snapshot.order_by_count(),
            emitted_header: false,
        };

        for node in nodes {
            match node.category() {
                Category::Compare | Category::Relational | Category::Range => {
                    self.render_value(out, node, opts)?;
                }
                Category::LinkMarker | Category::GroupMarker => {
                    out.push(node.op().sql_fragment())?;
                }
                Category::Keyword => {
                    if bracket_open {
                        out.push(") ")?;
                        bracket_open = false;
                    }
                    if opts.keywords == KeywordPolicy::Skip {
                        continue;
                    }
                    if node.op() == Operator::Limit {
                        if let Some(order) = pending_order.take() {
                            out.push(order)?;
                        }
                    }
                    self.render_keyword(out, node, &mut state)?;
                }
                Category::PrefixKeyMarker
                | Category::SuggestIndexMarker
                | Category::InKeysMarker => {}
                Category::Invalid => {
                    return Err(QueryError::invalid_format("invalid node"));
                }
            }
        }

        if bracket_open {
            out.push(") ")?;
        }
        if let Some(order) = pending_order {
            out.push(order)?;
        }

        Ok(())
    }

    fn render_value(
        &self,
        out: &mut SqlBuffer,
        node: &PredicateNode,
        opts: BodyOptions<'_>,
    ) -> Result<(), QueryError> {
        let op = node.op();
        let values = node.values();
        let is_range = op.category() == Category::Range;

        let max = out.limits().max_in_values;
        if is_range && values.len() > max {
            return Err(QueryError::TooManyValues {
                field: node.field().to_string(),
                len: values.len(),
                max,
            });
        }

        out.push(field_expression(
            node.field(),
            opts.access,
            self.schema,
            self.table,
        )?)?;
        out.push(op.sql_fragment())?;

        if op.is_value_bearing() {
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(", ")?;
                }
                render_literal(out, value, opts.values)?;
            }
        }
        if is_range {
            out.push(")")?;
        }

        Ok(())
    }

    fn render_keyword(
        &self,
        out: &mut SqlBuffer,
        node: &PredicateNode,
        state: &mut KeywordState,
    ) -> Result<(), QueryError> {
        match node.op() {
            Operator::OrderBy => {
                let ascending = node
                    .values()
                    .first()
                    .and_then(Literal::as_bool)
                    .ok_or_else(|| QueryError::invalid_format("malformed order_by"))?;

                if !state.emitted_header {
                    out.push("ORDER BY ")?;
                    state.emitted_header = true;
                }
                out.push(field_expression(node.field(), "", self.schema, self.table)?)?;
                out.push(if ascending { "ASC" } else { "DESC" })?;

                state.remaining_order_bys = state.remaining_order_bys.saturating_sub(1);
                if state.remaining_order_bys > 0 {
                    out.push(",")?;
                }
            }
            Operator::Limit => match node.values() {
                [Literal::Int32(count), Literal::Int32(offset)] => {
                    out.push(format!(" LIMIT {count} OFFSET {offset}"))?;
                }
                _ => return Err(QueryError::invalid_format("malformed limit")),
            },
            _ => {}
        }

        Ok(())
    }
}

fn render_literal(out: &mut SqlBuffer, value: &Literal, mode: ValueMode) -> Result<(), QueryError> {
    match mode {
        ValueMode::Placeholder => {
            out.bind(Bind::Literal(value.clone()))?;
            out.push(" ")
        }
        ValueMode::Inline => out.push(value.render_sql()),
    }
}

// The bracket opens only when a value node is reached before any link or
// keyword; group and side-channel markers are looked through.
fn opens_bracket(nodes: &[PredicateNode]) -> bool {
    for node in nodes {
        match node.category() {
            Category::Compare | Category::Relational | Category::Range => return true,
            Category::GroupMarker
            | Category::PrefixKeyMarker
            | Category::InKeysMarker
            | Category::SuggestIndexMarker => {}
            Category::LinkMarker | Category::Keyword | Category::Invalid => return false,
        }
    }
    false
}
