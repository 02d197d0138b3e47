use crate::sparql::laborer::error::Result;
use crate::sparql::laborer::expand::Snapshot;
use crate::sparql::laborer::io::excel_write::{FolderWriter, WorkbookWriter};
use crate::sparql::laborer::model::{QueryRecord, ResultFormat};

/// Information written at the top of a run's summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunHeader {
    pub title: String,
    pub description: String,
    pub started_at: String,
    pub endpoint: String,
    /// Number of triples in the endpoint, when it was counted.
    pub triple_count: Option<u64>,
    /// Why the triples could not be counted.
    pub error: Option<String>,
}

/// Sink for the reports of one run. A writer is opened per run and closed
/// before the next run opens its own.
pub trait ReportWriter {
    fn write_header(&mut self, header: &RunHeader) -> Result<()>;

    fn write_query_summary(&mut self, record: &QueryRecord) -> Result<()>;

    fn write_query_result(&mut self, record: &QueryRecord) -> Result<()>;

    /// Flushes everything to its destination.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens the writer of a run.
pub trait WriterFactory {
    fn open(&mut self, snapshot: &Snapshot<'_>) -> Result<Box<dyn ReportWriter>>;
}

/// Local destinations: a single workbook for `xlsx`, otherwise a folder with
/// a summary workbook and the raw result files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDestinations;

impl WriterFactory for LocalDestinations {
    fn open(&mut self, snapshot: &Snapshot<'_>) -> Result<Box<dyn ReportWriter>> {
        match snapshot.output_format {
            ResultFormat::Xlsx => Ok(Box::new(WorkbookWriter::create(snapshot)?)),
            _ => Ok(Box::new(FolderWriter::create(snapshot)?)),
        }
    }
}
