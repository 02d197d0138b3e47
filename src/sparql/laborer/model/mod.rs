use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::sparql::laborer::error::{LaborerError, Result};

/// A single value of the canonical result matrix.
///
/// Values whose trimmed text is an integer literal are stored as integers,
/// everything else keeps its original text. There is no null placeholder: an
/// unbound or empty value is the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Integer literal.
    Integer(i64),
    /// Any other text, kept verbatim.
    Text(String),
}

impl Cell {
    /// Opportunistically parses the text as an integer.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(value) => Cell::Integer(value),
            Err(_) => Cell::Text(text.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

/// Header-plus-rows normalization of a query result.
///
/// Row 0 is the header. Every row has exactly the width of the header; rows
/// can only be appended through [`Matrix::push_row`], which enforces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matrix {
    rows: Vec<Vec<Cell>>,
}

impl Matrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a matrix from already collected rows, checking the width of
    /// every row against the first one.
    pub fn try_from_rows(rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut matrix = Self::new();
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// One-row, one-cell matrix carrying an error message in place of a
    /// result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            rows: vec![vec![Cell::Text(message.into())]],
        }
    }

    /// Appends a row. The first row establishes the width for all others.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if let Some(header) = self.rows.first() {
            if header.len() != row.len() {
                return Err(LaborerError::RowLength {
                    row: self.rows.len(),
                    content: render_row(&row),
                    length: row.len(),
                    expected: header.len(),
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn header(&self) -> Option<&[Cell]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// All rows, header included.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Rows following the header.
    pub fn data_rows(&self) -> &[Vec<Cell>] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// Number of rows, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether at least one row follows the header.
    pub fn has_data(&self) -> bool {
        self.rows.len() > 1
    }
}

fn render_row(row: &[Cell]) -> String {
    let cells: Vec<String> = row.iter().map(Cell::to_string).collect();
    format!("[{}]", cells.join(", "))
}

/// Result serialisation requested from the endpoint and used for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFormat {
    Csv,
    Tsv,
    Xml,
    Json,
    /// Spreadsheet output. Results are fetched as CSV.
    Xlsx,
}

impl ResultFormat {
    /// Format actually requested from the endpoint.
    pub fn wire_format(self) -> ResultFormat {
        match self {
            ResultFormat::Xlsx => ResultFormat::Csv,
            other => other,
        }
    }

    /// Media type sent in the `Accept` header for this format.
    pub fn media_type(self) -> &'static str {
        match self.wire_format() {
            ResultFormat::Tsv => "text/tab-separated-values",
            ResultFormat::Xml => "application/sparql-results+xml",
            ResultFormat::Json => "application/sparql-results+json",
            ResultFormat::Csv | ResultFormat::Xlsx => "text/csv",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ResultFormat::Csv => "csv",
            ResultFormat::Tsv => "tsv",
            ResultFormat::Xml => "xml",
            ResultFormat::Json => "json",
            ResultFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ResultFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ResultFormat::Csv),
            "tsv" => Ok(ResultFormat::Tsv),
            "xml" => Ok(ResultFormat::Xml),
            "json" => Ok(ResultFormat::Json),
            "xlsx" => Ok(ResultFormat::Xlsx),
            other => Err(format!(
                "unknown output format '{other}'; possible formats are csv, tsv, xml, json, xlsx"
            )),
        }
    }
}

/// What the executor produced for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResult {
    /// Response body as received from the endpoint.
    Body(Vec<u8>),
    /// Execution failed; the message is shown in place of results.
    Failed(String),
}

impl RawResult {
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            RawResult::Body(bytes) => Some(bytes),
            RawResult::Failed(_) => None,
        }
    }
}

/// Everything known about one executed query of the current run.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    /// One-based position of the query in the collection.
    pub id: usize,
    pub title: String,
    pub description: String,
    pub query: String,
    /// Derived query used to count the result lines, if counting was enabled.
    pub query_for_count: Option<String>,
    pub raw: RawResult,
    pub matrix: Matrix,
    pub duration: Duration,
    /// Total number of result lines reported by the endpoint.
    pub line_count: Option<u64>,
    /// Opaque data attached to the query in the configuration document.
    pub user_data: Option<Value>,
}

impl QueryRecord {
    pub fn error_message(&self) -> Option<&str> {
        match &self.raw {
            RawResult::Failed(message) => Some(message),
            RawResult::Body(_) => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.raw, RawResult::Body(_))
    }
}
