use crate::query::memory::MemoryTable;
use crate::types::{ColumnField, ColumnType, Row, Value};

/// Fields of an `(id BIGINT, name VARCHAR)` result.
pub fn id_name_fields() -> Vec<ColumnField> {
    vec![
        ColumnField::new("id", ColumnType::Int64),
        ColumnField::new("name", ColumnType::VarChar),
    ]
}

pub fn id_name_rows(rows: &[(i64, &str)]) -> Vec<Row> {
    rows.iter()
        .map(|(id, name)| Row::new(vec![Value::Int(*id), Value::from(*name)]))
        .collect()
}

/// Table of `(id, name)` rows, which must be given sorted by id.
pub fn id_name_table(rows: &[(i64, &str)]) -> MemoryTable {
    MemoryTable::new(id_name_fields(), id_name_rows(rows))
}
