use csv::ReaderBuilder;

use crate::sparql::laborer::error::Result;
use crate::sparql::laborer::model::{Cell, Matrix};

/// Parses a delimited body. The first row fixes the width every later row
/// must have.
pub fn harmonize_delimited(body: &[u8], delimiter: u8) -> Result<Matrix> {
    // Width is checked by the matrix so the error names the offending row.
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut matrix = Matrix::new();
    for record in reader.records() {
        let record = record?;
        matrix.push_row(record.iter().map(Cell::parse).collect())?;
    }
    Ok(matrix)
}
