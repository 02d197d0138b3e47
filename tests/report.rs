use std::fs;
use std::path::Path;
use std::time::Duration;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use serde_json::json;
use sparql_laborer::LaborerError;
use sparql_laborer::document::CollectionDocument;
use sparql_laborer::expand::ExpandedCollection;
use sparql_laborer::io::excel_write::{
    MAX_CELL_CHARS, SUMMARY_FILE, SUMMARY_SHEET, SheetNameRegistry, sanitize_sheet_name,
};
use sparql_laborer::io::executor::{Execution, Executor, count_query, parse_count};
use sparql_laborer::io::report::{LocalDestinations, WriterFactory};
use sparql_laborer::model::ResultFormat;
use sparql_laborer::run::{IterationController, run_file};
use tempfile::tempdir;

const STARTED_AT: &str = "240314_101500";

/// Executor answering every query with the same CSV body.
struct FixedExecutor(&'static str);

impl Executor for FixedExecutor {
    fn run(
        &self,
        _query: &str,
        _endpoint: &str,
        _format: ResultFormat,
    ) -> sparql_laborer::Result<Execution> {
        Ok(Execution {
            body: self.0.as_bytes().to_vec(),
            duration: Duration::from_millis(1500),
        })
    }
}

fn collection(destination: &Path, format: &str) -> ExpandedCollection {
    let document: CollectionDocument = serde_json::from_value(json!({
        "title": "People/Places",
        "description": "Weekly checks",
        "output_destination": destination.to_string_lossy(),
        "output_format": format,
        "summary_sample_limit": 1,
        "count_the_results": false,
        "endpoint": "http://example.org/sparql",
        "queries": [
            { "title": "First", "description": "Names and counts", "query": "SELECT ?name ?count {}" },
            { "title": "First", "query": "SELECT ?again {}" }
        ]
    }))
    .expect("collection document parsed");
    ExpandedCollection::expand(document, STARTED_AT).expect("collection expanded")
}

fn column_a(range: &calamine::Range<DataType>) -> Vec<String> {
    range
        .rows()
        .filter_map(|row| row.first())
        .map(|cell| cell.to_string())
        .collect()
}

#[test]
fn xlsx_output_is_a_single_workbook() {
    let temp_dir = tempdir().expect("temporary directory");
    let collection = collection(temp_dir.path(), "xlsx");

    IterationController::new(
        &collection,
        FixedExecutor("name,count\nfoo,42\nbar,7\n"),
        LocalDestinations,
    )
    .run_to_completion()
    .expect("run completed");

    let path = temp_dir
        .path()
        .join("240314_101500 - People-Places.xlsx");
    let mut workbook: Xlsx<_> = open_workbook(&path).expect("workbook opened");
    assert_eq!(
        workbook.sheet_names().to_vec(),
        vec![
            SUMMARY_SHEET.to_string(),
            "1. First".to_string(),
            "2. First".to_string()
        ]
    );

    let summary = workbook
        .worksheet_range(SUMMARY_SHEET)
        .expect("summary sheet present")
        .expect("summary sheet read");
    let lines = column_a(&summary);
    assert_eq!(lines[0], "People/Places");
    assert_eq!(lines[1], "Weekly checks");
    assert!(lines.contains(&"Execution timestamp: 240314_101500".to_string()));
    assert!(lines.contains(&"Endpoint: http://example.org/sparql".to_string()));
    assert!(lines.contains(&"1. First".to_string()));
    assert!(lines.contains(&"2. First".to_string()));
    assert!(lines.contains(&"Duration of execution in seconds: 1.500".to_string()));
    assert!(lines.contains(&"Sample results:".to_string()));
    assert!(lines.contains(&"foo".to_string()));
    assert!(!lines.contains(&"bar".to_string()), "sample limit is one row");

    let result = workbook
        .worksheet_range("1. First")
        .expect("result sheet present")
        .expect("result sheet read");
    assert_eq!(result.get_size(), (3, 2));
    assert_eq!(
        result.get_value((0, 0)),
        Some(&DataType::String("name".to_string()))
    );
    assert_eq!(result.get_value((1, 1)), Some(&DataType::Float(42.0)));
}

#[test]
fn delimited_output_is_a_folder_of_raw_results() {
    let temp_dir = tempdir().expect("temporary directory");
    let collection = collection(temp_dir.path(), "csv");
    let body = "name,count\nfoo,42\n";

    IterationController::new(&collection, FixedExecutor(body), LocalDestinations)
        .run_to_completion()
        .expect("run completed");

    let folder = temp_dir.path().join("240314_101500 - People-Places");
    assert!(folder.join(SUMMARY_FILE).is_file());
    assert_eq!(
        fs::read_to_string(folder.join("1. First.csv")).expect("first result read"),
        body
    );
    assert_eq!(
        fs::read_to_string(folder.join("2. First.csv")).expect("second result read"),
        body
    );

    let mut workbook: Xlsx<_> = open_workbook(folder.join(SUMMARY_FILE)).expect("summary opened");
    assert_eq!(workbook.sheet_names().to_vec(), vec![SUMMARY_SHEET.to_string()]);
}

#[test]
fn existing_result_folder_is_not_reused() {
    let temp_dir = tempdir().expect("temporary directory");
    let collection = collection(temp_dir.path(), "tsv");
    fs::create_dir(temp_dir.path().join("240314_101500 - People-Places"))
        .expect("folder created");

    let snapshot = collection.snapshot(0).expect("snapshot");
    let opened = LocalDestinations.open(&snapshot);
    assert!(matches!(opened, Err(LaborerError::DestinationExists(_))));
}

#[test]
fn failed_queries_are_reported_in_the_summary() {
    struct FailingExecutor;

    impl Executor for FailingExecutor {
        fn run(
            &self,
            _query: &str,
            _endpoint: &str,
            _format: ResultFormat,
        ) -> sparql_laborer::Result<Execution> {
            Err(LaborerError::QueryExecution("503 Service Unavailable".to_string()))
        }
    }

    let temp_dir = tempdir().expect("temporary directory");
    let collection = collection(temp_dir.path(), "xlsx");
    IterationController::new(&collection, FailingExecutor, LocalDestinations)
        .run_to_completion()
        .expect("run completed");

    let path = temp_dir
        .path()
        .join("240314_101500 - People-Places.xlsx");
    let mut workbook: Xlsx<_> = open_workbook(&path).expect("workbook opened");
    assert_eq!(workbook.sheet_names().to_vec(), vec![SUMMARY_SHEET.to_string()]);

    let summary = workbook
        .worksheet_range(SUMMARY_SHEET)
        .expect("summary sheet present")
        .expect("summary sheet read");
    let lines = column_a(&summary);
    assert!(lines.contains(
        &"NO RESULTS DUE TO ERROR: query execution failed: 503 Service Unavailable".to_string()
    ));
}

#[test]
fn run_file_executes_a_document_from_disk() {
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("out");
    let input = temp_dir.path().join("collection.json");
    let document = json!({
        "title": ["Alpha", "Beta"],
        "output_destination": output.to_string_lossy(),
        "output_format": "csv",
        "count_the_results": false,
        "endpoint": "http://example.org/sparql",
        "queries": [{ "title": "Names", "query": "SELECT ?name {}" }]
    });
    fs::write(&input, document.to_string()).expect("document written");

    run_file(&input, STARTED_AT, FixedExecutor("name\nfoo\n")).expect("run completed");

    for title in ["Alpha", "Beta"] {
        let folder = output.join(format!("240314_101500 - {title}"));
        assert!(folder.join(SUMMARY_FILE).is_file(), "summary for {title}");
        assert_eq!(
            fs::read_to_string(folder.join("1. Names.csv")).expect("result read"),
            "name\nfoo\n"
        );
    }
}

#[test]
fn long_description_is_truncated_in_the_summary() {
    let temp_dir = tempdir().expect("temporary directory");
    let description = "d".repeat(40_000);
    let document: CollectionDocument = serde_json::from_value(json!({
        "title": "Long",
        "description": description,
        "output_destination": temp_dir.path().to_string_lossy(),
        "output_format": "xlsx",
        "count_the_results": false,
        "endpoint": "http://example.org/sparql",
        "queries": [{ "title": "Only", "query": "SELECT ?name {}" }]
    }))
    .expect("collection document parsed");
    let collection = ExpandedCollection::expand(document, STARTED_AT).expect("collection expanded");

    IterationController::new(&collection, FixedExecutor("name\nfoo\n"), LocalDestinations)
        .run_to_completion()
        .expect("run completed");

    let path = temp_dir
        .path()
        .join("240314_101500 - Long.xlsx");
    let mut workbook: Xlsx<_> = open_workbook(&path).expect("workbook opened");
    let summary = workbook
        .worksheet_range(SUMMARY_SHEET)
        .expect("summary sheet present")
        .expect("summary sheet read");
    let lines = column_a(&summary);
    assert_eq!(lines[0], "Long");
    assert_eq!(lines[1].chars().count(), MAX_CELL_CHARS);
    assert!(lines.contains(&"1. Only".to_string()));
}

#[test]
fn sheet_names_are_sanitized_and_unique() {
    assert_eq!(sanitize_sheet_name("1. a/b: [c]?"), "1. a_b_ _c__");
    assert_eq!(sanitize_sheet_name("   "), "Sheet");
    assert_eq!(
        sanitize_sheet_name("1. ééééééééééééééééééééééééééééééééééééé").chars().count(),
        31
    );

    let mut registry = SheetNameRegistry::default();
    registry.claim(SUMMARY_SHEET.to_string());
    assert_eq!(registry.assign("0. summary"), "0. summary_1");
    assert_eq!(registry.assign("1. Query"), "1. Query");
    assert_eq!(registry.assign("1. Query"), "1. Query_1");
    assert_eq!(registry.assign("1. Query"), "1. Query_2");

    let long = "2. Abcdefghijklmnopqrstuvwxyz0123456789";
    let first = registry.assign(long);
    let second = registry.assign(long);
    assert_eq!(first.chars().count(), 31);
    assert_eq!(second.chars().count(), 31);
    assert!(second.ends_with("_1"));
    assert_ne!(first, second);
}

#[test]
fn count_query_wraps_the_first_active_select() {
    assert_eq!(
        count_query("SELECT ?s WHERE { ?s ?p ?o }\n").as_deref(),
        Some("SELECT (COUNT(*) AS ?count) WHERE {\nSELECT ?s WHERE { ?s ?p ?o }\n\n}")
    );
    assert_eq!(
        count_query("PREFIX ex: <http://ex/#>\n# Select all\nselect * { ?s ?p ?o }\n").as_deref(),
        Some(
            "PREFIX ex: <http://ex/#>\n# Select all\nSELECT (COUNT(*) AS ?count) WHERE {\nSELECT * { ?s ?p ?o }\n\n}"
        )
    );
    assert_eq!(count_query("ASK { ?s ?p ?o }\n"), None);
    assert_eq!(count_query("# SELECT only in a comment\n"), None);
}

#[test]
fn count_is_read_from_the_first_binding() {
    let body = br#"{"head":{"vars":["count"]},"results":{"bindings":[{"count":{"type":"literal","datatype":"http://www.w3.org/2001/XMLSchema#integer","value":"981"}}]}}"#;
    assert_eq!(parse_count(body).expect("count parsed"), 981);

    let empty = br#"{"head":{"vars":["count"]},"results":{"bindings":[]}}"#;
    assert!(matches!(parse_count(empty), Err(LaborerError::ResultsSyntax(_))));

    let not_a_number = br#"{"results":{"bindings":[{"count":{"type":"literal","value":"many"}}]}}"#;
    assert!(matches!(
        parse_count(not_a_number),
        Err(LaborerError::ResultsSyntax(_))
    ));
}
