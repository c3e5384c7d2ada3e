use crate::{
    error::QueryError,
    query::check::resolve_field,
    schema::{SchemaInfo, TableDescriptor},
};

/// Render the left-hand side of a predicate on `field`.
///
/// Relational tables address the joined row's column directly. Document
/// tables extract the leaf from the stored value and cast it to the SQL type
/// of its declared leaf type. `access` qualifies the value column, e.g.
/// `NEW.` inside a trigger.
pub(crate) fn field_expression(
    field: &str,
    access: &str,
    schema: &dyn SchemaInfo,
    table: &TableDescriptor,
) -> Result<String, QueryError> {
    let (path, ty) = resolve_field(field, schema, table)?;

    if table.is_relational() {
        return Ok(format!("a.{} ", path.dotted()));
    }

    Ok(format!(
        " CAST({}({access}value, '{path}', {}) AS {}) ",
        schema.encoding().extract_function(),
        schema.skip_size(),
        ty.sql_cast_type(),
    ))
}
