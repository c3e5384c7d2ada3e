use crate::schema::{LeafType, MapSchema, TableDescriptor};

pub(crate) const TABLE: &str = "sync_data";

/// Document schema shared by unit tests.
pub(crate) fn schema() -> MapSchema {
    MapSchema::new()
        .with_field("age", LeafType::Integer)
        .with_field("score", LeafType::Integer)
        .with_field("name", LeafType::String)
        .with_field("weight", LeafType::Double)
        .with_field("active", LeafType::Bool)
        .with_field("stamp", LeafType::Long)
        .with_field("user.city", LeafType::String)
        .with_index("$.age")
}

pub(crate) fn document() -> TableDescriptor {
    TableDescriptor::document(TABLE)
}

pub(crate) fn relational() -> TableDescriptor {
    TableDescriptor::relational("orders")
}
