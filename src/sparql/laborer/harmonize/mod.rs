//! Normalisation of SPARQL result payloads into the canonical [`Matrix`].
//!
//! Delimited bodies (CSV and TSV, and XLSX which is fetched as CSV) are read
//! row by row. JSON and XML bodies carry one keyed binding set per result
//! row; they are first collected as [`KeyedRows`] and then projected onto the
//! header so that every column lines up regardless of the order in which a
//! row lists its bindings.

pub mod delimited;
pub mod keyed;
pub mod sparql_results;

use tracing::{debug, instrument};

pub use delimited::harmonize_delimited;
pub use keyed::{KeyedRows, project};

use crate::sparql::laborer::error::Result;
use crate::sparql::laborer::model::{Matrix, RawResult, ResultFormat};

/// Converts a raw result into the canonical matrix.
///
/// A failed execution becomes a single cell holding the error message.
#[instrument(level = "debug", skip(raw))]
pub fn harmonize(raw: &RawResult, format: ResultFormat) -> Result<Matrix> {
    let body = match raw {
        RawResult::Failed(message) => return Ok(Matrix::error(message.clone())),
        RawResult::Body(body) => body,
    };

    let matrix = match format.wire_format() {
        ResultFormat::Tsv => harmonize_delimited(body, b'\t')?,
        ResultFormat::Csv | ResultFormat::Xlsx => harmonize_delimited(body, b',')?,
        ResultFormat::Json => project(sparql_results::json_keyed_rows(body)?)?,
        ResultFormat::Xml => project(sparql_results::xml_keyed_rows(body)?)?,
    };

    debug!(
        rows = matrix.row_count(),
        columns = matrix.width(),
        "harmonized result"
    );
    Ok(matrix)
}
