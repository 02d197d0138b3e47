use crate::sparql::laborer::error::{LaborerError, Result};
use crate::sparql::laborer::model::{Cell, Matrix};

/// Result rows indexed by column name, before projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedRows {
    columns: Vec<String>,
    rows: Vec<Vec<(String, Cell)>>,
}

impl KeyedRows {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Appends a row of key/value pairs. A row must bind exactly as many keys
    /// as there are columns.
    pub fn push_row(&mut self, row: Vec<(String, Cell)>) -> Result<()> {
        if row.len() != self.columns.len() {
            let pairs: Vec<String> = row
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            return Err(LaborerError::RowLength {
                row: self.rows.len() + 1,
                content: format!("{{{}}}", pairs.join(", ")),
                length: row.len(),
                expected: self.columns.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }
}

/// Projects keyed rows onto a matrix whose header is the column order. Each
/// cell is looked up by key.
pub fn project(keyed: KeyedRows) -> Result<Matrix> {
    let KeyedRows { columns, rows } = keyed;

    let mut matrix = Matrix::new();
    matrix.push_row(columns.iter().map(|column| Cell::from(column.as_str())).collect())?;

    for (index, mut row) in rows.into_iter().enumerate() {
        let mut cells = Vec::with_capacity(columns.len());
        for column in &columns {
            let position = row
                .iter()
                .position(|(key, _)| key == column)
                .ok_or_else(|| {
                    LaborerError::ResultsSyntax(format!(
                        "row {} does not bind column '{column}'",
                        index + 1
                    ))
                })?;
            cells.push(row.swap_remove(position).1);
        }
        matrix.push_row(cells)?;
    }

    Ok(matrix)
}
