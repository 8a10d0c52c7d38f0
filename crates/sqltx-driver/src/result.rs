//! Tabular query results.

use std::sync::Arc;

use crate::value::{FromSql, SqlValue, TypeError};

/// Column metadata for a result set.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column index within the row.
    pub index: usize,
}

/// A single row of a result set.
///
/// Column metadata is shared across all rows of the same result.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Get a value by column index.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, TypeError> {
        self.values
            .get(index)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column index",
                actual: format!("index {index} out of bounds"),
            })
            .and_then(T::from_sql)
    }

    /// Get a value by column name (case-insensitive).
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, TypeError> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column name",
                actual: format!("column '{name}' not found"),
            })?;

        self.get(index)
    }

    /// Try to get a value by column index, returning `None` if NULL or absent.
    pub fn try_get<T: FromSql>(&self, index: usize) -> Option<T> {
        self.values
            .get(index)
            .and_then(|v| T::from_sql_nullable(v).ok().flatten())
    }

    /// Get the raw value by index.
    #[must_use]
    pub fn get_raw(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Get the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// The tabular result of executing a statement.
///
/// Queries carry rows; data-modifying statements carry an affected-row
/// count and an empty row set.
#[derive(Debug, Clone)]
pub struct QueryResult {
    columns: Arc<[Column]>,
    rows: Vec<Row>,
    rows_affected: u64,
}

impl QueryResult {
    /// Build a result from column names and row values.
    #[must_use]
    pub fn new(column_names: Vec<String>, values: Vec<Vec<SqlValue>>) -> Self {
        let columns: Arc<[Column]> = column_names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Column { name, index })
            .collect();
        let rows = values
            .into_iter()
            .map(|values| Row {
                columns: Arc::clone(&columns),
                values,
            })
            .collect();
        Self {
            columns,
            rows,
            rows_affected: 0,
        }
    }

    /// Build a rowless result for a data-modifying statement.
    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            columns: Arc::from([]),
            rows: Vec::new(),
            rows_affected,
        }
    }

    /// The number of rows returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result contains no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The number of rows affected by a data-modifying statement.
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Get a row by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// The column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Iterate over the rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
