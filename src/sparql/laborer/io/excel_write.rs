use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::{debug, info, instrument};

use crate::sparql::laborer::error::{LaborerError, Result};
use crate::sparql::laborer::expand::Snapshot;
use crate::sparql::laborer::io::report::{ReportWriter, RunHeader};
use crate::sparql::laborer::model::{Cell, Matrix, QueryRecord, ResultFormat};

/// Sheet holding the run summary; always the first sheet.
pub const SUMMARY_SHEET: &str = "0. Summary";
/// File name of the summary workbook inside a result folder.
pub const SUMMARY_FILE: &str = "0. Summary.xlsx";
/// Longest text written into a single cell.
pub const MAX_CELL_CHARS: usize = 255;

const MAX_SHEET_NAME_CHARS: usize = 31;
const SUMMARY_COLUMNS: u16 = 26;
const SUMMARY_COLUMN_WIDTH: f64 = 70.0;
const QUERY_LINE_HEIGHT: f64 = 15.0;

/// Summary sheet shared by every local destination.
struct SummarySheet {
    worksheet: Worksheet,
    line: u32,
    sample_limit: usize,
    title_format: Format,
    query_title_format: Format,
    query_text_format: Format,
    bold_format: Format,
}

impl SummarySheet {
    fn new(sample_limit: usize) -> Result<Self> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(SUMMARY_SHEET)?;
        for column in 0..SUMMARY_COLUMNS {
            worksheet.set_column_width(column, SUMMARY_COLUMN_WIDTH)?;
        }

        Ok(Self {
            worksheet,
            line: 0,
            sample_limit,
            title_format: Format::new().set_bold().set_font_size(16),
            query_title_format: Format::new().set_bold().set_font_size(12),
            query_text_format: Format::new().set_text_wrap(),
            bold_format: Format::new().set_bold(),
        })
    }

    fn write_header(&mut self, header: &RunHeader) -> Result<()> {
        self.line = 0;
        self.worksheet.set_row_height(0, 20)?;
        self.worksheet.write_string_with_format(
            self.line,
            0,
            truncate_chars(&header.title, MAX_CELL_CHARS),
            &self.title_format,
        )?;
        self.line += 1;
        if !header.description.trim().is_empty() {
            self.write_line(&header.description)?;
        }
        self.line += 1;

        self.write_line(&format!("Execution timestamp: {}", header.started_at))?;
        self.write_line(&format!("Endpoint: {}", header.endpoint))?;
        match (&header.error, header.triple_count) {
            (Some(error), _) => self.write_line(error)?,
            (None, Some(count)) => {
                self.write_line(&format!("Total count of triples in endpoint: {count}"))?
            }
            (None, None) => {}
        }
        self.line += 3;
        Ok(())
    }

    fn write_query(&mut self, record: &QueryRecord) -> Result<()> {
        self.worksheet.write_string_with_format(
            self.line,
            0,
            truncate_chars(&format!("{}. {}", record.id, record.title), MAX_CELL_CHARS),
            &self.query_title_format,
        )?;
        self.line += 1;

        if !record.description.trim().is_empty() {
            self.write_line(&record.description)?;
        }

        let query_lines = record.query.matches('\n').count() + 2;
        self.worksheet
            .set_row_height(self.line, QUERY_LINE_HEIGHT * query_lines as f64)?;
        self.worksheet.write_string_with_format(
            self.line,
            0,
            truncate_chars(&record.query, 32_767),
            &self.query_text_format,
        )?;
        self.line += 1;

        self.write_line(&format!(
            "Duration of execution in seconds: {:.3}",
            record.duration.as_secs_f64()
        ))?;

        if let Some(error) = record.error_message() {
            self.line += 1;
            self.write_line(&format!("NO RESULTS DUE TO ERROR: {error}"))?;
        } else {
            if let Some(count) = record.line_count {
                self.write_line(&format!("Total count of lines in results: {count}"))?;
            }
            self.line += 1;

            if self.sample_limit > 0 && !record.matrix.is_empty() {
                self.worksheet.write_string_with_format(
                    self.line,
                    0,
                    "Sample results:",
                    &self.bold_format,
                )?;
                self.line += 1;
                let shown = (self.sample_limit + 1).min(record.matrix.row_count());
                write_rows(&mut self.worksheet, self.line, &record.matrix.rows()[..shown])?;
                self.line += shown as u32;
            }
        }

        self.line += 2;
        Ok(())
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        self.worksheet
            .write_string(self.line, 0, truncate_chars(text, MAX_CELL_CHARS))?;
        self.line += 1;
        Ok(())
    }

    fn into_worksheet(self) -> Worksheet {
        self.worksheet
    }
}

/// Writes every run into a single workbook: the summary plus one sheet per
/// written query result.
pub struct WorkbookWriter {
    path: PathBuf,
    summary: SummarySheet,
    results: Vec<Worksheet>,
    sheet_names: SheetNameRegistry,
}

impl WorkbookWriter {
    #[instrument(level = "info", skip_all, fields(title = snapshot.title))]
    pub fn create(snapshot: &Snapshot<'_>) -> Result<Self> {
        fs::create_dir_all(snapshot.output_destination)?;
        let path = snapshot.output_destination.join(format!(
            "{} - {}.{}",
            snapshot.started_at,
            file_safe(snapshot.title),
            ResultFormat::Xlsx.extension()
        ));
        if path.exists() {
            return Err(LaborerError::DestinationExists(path));
        }

        let mut sheet_names = SheetNameRegistry::default();
        sheet_names.claim(SUMMARY_SHEET.to_string());
        info!(output = %path.display(), "writing results to workbook");

        Ok(Self {
            path,
            summary: SummarySheet::new(snapshot.sample_limit)?,
            results: Vec::new(),
            sheet_names,
        })
    }
}

impl ReportWriter for WorkbookWriter {
    fn write_header(&mut self, header: &RunHeader) -> Result<()> {
        self.summary.write_header(header)
    }

    fn write_query_summary(&mut self, record: &QueryRecord) -> Result<()> {
        self.summary.write_query(record)
    }

    fn write_query_result(&mut self, record: &QueryRecord) -> Result<()> {
        let mut worksheet = Worksheet::new();
        let name = self
            .sheet_names
            .assign(&format!("{}. {}", record.id, record.title));
        worksheet.set_name(&name)?;
        write_matrix(&mut worksheet, &record.matrix)?;
        debug!(sheet = %name, rows = record.matrix.row_count(), "result sheet written");
        self.results.push(worksheet);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let WorkbookWriter {
            path,
            summary,
            results,
            ..
        } = *self;

        let mut workbook = Workbook::new();
        workbook.push_worksheet(summary.into_worksheet());
        for worksheet in results {
            workbook.push_worksheet(worksheet);
        }
        workbook.save(&path)?;
        info!(output = %path.display(), "workbook saved");
        Ok(())
    }
}

/// Writes a run into a fresh folder: a summary workbook plus the raw body of
/// every written query result.
pub struct FolderWriter {
    folder: PathBuf,
    format: ResultFormat,
    summary: SummarySheet,
}

impl FolderWriter {
    #[instrument(level = "info", skip_all, fields(title = snapshot.title))]
    pub fn create(snapshot: &Snapshot<'_>) -> Result<Self> {
        fs::create_dir_all(snapshot.output_destination)?;
        let folder = snapshot.output_destination.join(format!(
            "{} - {}",
            snapshot.started_at,
            file_safe(snapshot.title)
        ));
        match fs::create_dir(&folder) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(LaborerError::DestinationExists(folder));
            }
            Err(err) => return Err(err.into()),
        }
        info!(output = %folder.display(), "writing results to folder");

        Ok(Self {
            folder,
            format: snapshot.output_format,
            summary: SummarySheet::new(snapshot.sample_limit)?,
        })
    }
}

impl ReportWriter for FolderWriter {
    fn write_header(&mut self, header: &RunHeader) -> Result<()> {
        self.summary.write_header(header)
    }

    fn write_query_summary(&mut self, record: &QueryRecord) -> Result<()> {
        self.summary.write_query(record)
    }

    fn write_query_result(&mut self, record: &QueryRecord) -> Result<()> {
        let Some(body) = record.raw.body() else {
            debug!(id = record.id, "no result body to write");
            return Ok(());
        };
        let path = self.folder.join(format!(
            "{}. {}.{}",
            record.id,
            file_safe(&record.title),
            self.format.extension()
        ));
        fs::write(&path, body)?;
        debug!(output = %path.display(), "result file written");
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let path = self.folder.join(SUMMARY_FILE);
        let mut workbook = Workbook::new();
        workbook.push_worksheet(self.summary.into_worksheet());
        workbook.save(&path)?;
        info!(output = %path.display(), "summary saved");
        Ok(())
    }
}

fn write_matrix(worksheet: &mut Worksheet, matrix: &Matrix) -> Result<()> {
    write_rows(worksheet, 0, matrix.rows())?;
    let width = matrix.width();
    if width > 0 {
        let last_row = matrix.row_count().saturating_sub(1) as u32;
        worksheet.autofilter(0, 0, last_row, (width - 1) as u16)?;
    }
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, first_row: u32, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = first_row + row_idx as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            match cell {
                Cell::Integer(value) => {
                    worksheet.write_number(row_num, col_idx as u16, *value as f64)?;
                }
                Cell::Text(value) => {
                    worksheet.write_string(
                        row_num,
                        col_idx as u16,
                        truncate_chars(value, MAX_CELL_CHARS),
                    )?;
                }
            }
        }
    }
    Ok(())
}

/// Replaces path separators so a title can be used as a single file name.
pub fn file_safe(title: &str) -> String {
    title.replace(['/', '\\'], "-")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Hands out sheet names that are valid and unique within one workbook.
#[derive(Debug, Default)]
pub struct SheetNameRegistry {
    used: HashSet<String>,
}

impl SheetNameRegistry {
    pub fn claim(&mut self, name: String) {
        self.used.insert(name.to_lowercase());
    }

    pub fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        if self.used.insert(base.to_lowercase()) {
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            let prefix = truncate_chars(&base, MAX_SHEET_NAME_CHARS - suffix.len());
            let candidate = format!("{prefix}{suffix}");
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Replaces characters Excel refuses in sheet names and enforces the length
/// limit.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];
    let sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let sanitized = truncate_chars(sanitized.trim(), MAX_SHEET_NAME_CHARS);
    let sanitized = sanitized.trim_end().to_string();
    if sanitized.is_empty() {
        "Sheet".to_string()
    } else {
        sanitized
    }
}
