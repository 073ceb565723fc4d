use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn get_reports_table_and_column() {
        let db = Database::in_memory().unwrap();
        let result = db.with_conn(|conn| {
            conn.query_row(
                "SELECT 'not a number'",
                [],
                // Force a type mismatch through the helper
                |row| Ok(get::<i64>(row, 0, "tasks", "id")),
            )
            .map_err(StoreError::from)?
        });
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "tasks", column: "id", .. })
        ));
    }
}
