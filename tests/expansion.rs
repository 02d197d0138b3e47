use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use sparql_laborer::LaborerError;
use sparql_laborer::document::{CollectionDocument, TEMPLATE, load_document, write_template};
use sparql_laborer::expand::{
    ExpandedCollection, Field, SAMPLE_LIMIT_CEILING, disambiguate, scrub_query,
};
use sparql_laborer::model::ResultFormat;
use tempfile::tempdir;

const STARTED_AT: &str = "240314_101500";

fn document(value: Value) -> CollectionDocument {
    serde_json::from_value(value).expect("collection document parsed")
}

fn field(value: Value) -> Field {
    Field::from_value("title", value).expect("field classified")
}

#[test]
fn disjoint_list_keeps_values_in_order() {
    let field = field(json!(["csv", "tsv", "xml"]));
    assert!(matches!(field, Field::DisjointList(_)));

    let values = field.resolve().expect("list resolved");
    assert_eq!(values, vec![json!("csv"), json!("tsv"), json!("xml")]);
    assert_eq!(field.cardinality().expect("cardinality"), 3);
}

#[test]
fn chain_prefixes_scalar_to_every_list_value() {
    let field = field(json!(["scalar", ["a", "b"]]));
    assert!(matches!(field, Field::ConcatenationChain(_)));

    let values = field.resolve().expect("chain resolved");
    assert_eq!(values, vec![json!("scalara"), json!("scalarb")]);
}

#[test]
fn chain_combines_lists_pairwise_and_broadcasts_singletons() {
    let field = field(json!([["http://a/", "http://b/"], "sparql", ["?x"], ["1", "2"]]));

    let values = field.resolve().expect("chain resolved");
    assert_eq!(
        values,
        vec![json!("http://a/sparql?x1"), json!("http://b/sparql?x2")]
    );
}

#[test]
fn chain_with_single_value_accumulator_broadcasts_it() {
    let field = field(json!([["q"], [1, 2, 3]]));

    let values = field.resolve().expect("chain resolved");
    assert_eq!(values, vec![json!("q1"), json!("q2"), json!("q3")]);
}

#[test]
fn chain_rejects_lists_of_different_lengths() {
    let field = field(json!([["a", "b"], ["x", "y", "z"]]));

    match field.resolve() {
        Err(LaborerError::CardinalityMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, 2);
            assert_eq!(found, 3);
        }
        other => panic!("expected a cardinality mismatch, got {other:?}"),
    }
}

#[test]
fn empty_and_deeply_nested_lists_are_rejected() {
    for value in [json!([]), json!(["a", []]), json!(["a", [["b"]]])] {
        match Field::from_value("output_format", value) {
            Err(LaborerError::InvalidValue { field, .. }) => assert_eq!(field, "output_format"),
            other => panic!("expected an invalid value, got {other:?}"),
        }
    }
}

#[test]
fn disambiguate_numbers_repeated_titles() {
    let titles = disambiguate(&["A", "A", "B", "A"]);
    assert_eq!(titles, vec!["A", "A (2)", "B", "A (3)"]);
}

#[test]
fn scalar_fields_are_broadcast_over_every_run() {
    let collection = ExpandedCollection::expand(
        document(json!({
            "title": "Sweep",
            "endpoint": "http://example.org/sparql",
            "output_format": ["csv", "TSV", "json"],
            "queries": [{ "query": "SELECT * WHERE { ?s ?p ?o }" }]
        })),
        STARTED_AT,
    )
    .expect("collection expanded");

    assert_eq!(collection.run_count(), 3);
    assert_eq!(collection.query_count(), 1);

    let formats: Vec<ResultFormat> = (0..3)
        .map(|index| {
            let snapshot = collection.snapshot(index).expect("snapshot exists");
            assert_eq!(snapshot.endpoint, "http://example.org/sparql");
            assert_eq!(snapshot.queries[0].query, "SELECT * WHERE { ?s ?p ?o }\n");
            snapshot.output_format
        })
        .collect();
    assert_eq!(
        formats,
        vec![ResultFormat::Csv, ResultFormat::Tsv, ResultFormat::Json]
    );

    let titles: Vec<String> = (0..3)
        .map(|index| collection.snapshot(index).expect("snapshot").title.to_string())
        .collect();
    assert_eq!(titles, vec!["Sweep", "Sweep (2)", "Sweep (3)"]);
    assert!(collection.snapshot(3).is_none());
}

#[test]
fn query_fields_take_part_in_the_run_count() {
    let collection = ExpandedCollection::expand(
        document(json!({
            "endpoint": "http://example.org/sparql",
            "queries": [{
                "title": ["People", "Places"],
                "query": ["SELECT ?p WHERE { ?p a <", ["Person", "Place"], "> }"]
            }]
        })),
        STARTED_AT,
    )
    .expect("collection expanded");

    assert_eq!(collection.run_count(), 2);
    let second = collection.snapshot(1).expect("second snapshot");
    assert_eq!(second.queries[0].id, 1);
    assert_eq!(second.queries[0].title, "Places");
    assert_eq!(second.queries[0].query, "SELECT ?p WHERE { ?p a <Place> }\n");
    assert_eq!(second.title, "240314_101500 (2)");
}

#[test]
fn fields_with_different_run_counts_are_rejected() {
    let result = ExpandedCollection::expand(
        document(json!({
            "endpoint": "http://example.org/sparql",
            "output_format": ["csv", "tsv"],
            "description": ["one", "two", "three"],
            "queries": [{ "query": "ASK { ?s ?p ?o }" }]
        })),
        STARTED_AT,
    );

    match result {
        Err(LaborerError::CardinalityMismatch {
            context,
            expected,
            found,
        }) => {
            assert!(context.contains("output_format"), "context was {context}");
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("expected a cardinality mismatch, got {other:?}"),
    }
}

#[test]
fn defaults_apply_to_missing_fields() {
    let collection = ExpandedCollection::expand(
        CollectionDocument::new("http://example.org/sparql"),
        STARTED_AT,
    )
    .expect("collection expanded");

    let snapshot = collection.snapshot(0).expect("snapshot exists");
    assert_eq!(snapshot.title, STARTED_AT);
    assert_eq!(snapshot.started_at, STARTED_AT);
    assert_eq!(snapshot.description, "");
    assert_eq!(snapshot.output_destination, Path::new("."));
    assert_eq!(snapshot.output_format, ResultFormat::Csv);
    assert_eq!(snapshot.sample_limit, 5);
    assert_eq!(snapshot.cooldown, Duration::ZERO);
    assert!(!snapshot.write_empty_results);
    assert!(snapshot.count_the_results);
    assert!(snapshot.queries.is_empty());
}

#[test]
fn sample_limit_is_clamped() {
    let expand = |limit: i64| {
        let collection = ExpandedCollection::expand(
            document(json!({
                "endpoint": "http://example.org/sparql",
                "summary_sample_limit": limit,
                "queries": []
            })),
            STARTED_AT,
        )
        .expect("collection expanded");
        collection.snapshot(0).expect("snapshot").sample_limit
    };

    assert_eq!(expand(150), SAMPLE_LIMIT_CEILING);
    assert_eq!(expand(150), 101);
    assert_eq!(expand(-3), 5);
    assert_eq!(expand(0), 0);
    assert_eq!(expand(42), 42);
}

#[test]
fn blank_destination_falls_back_to_working_directory() {
    let collection = ExpandedCollection::expand(
        document(json!({
            "endpoint": "http://example.org/sparql",
            "output_destination": "   ",
            "cooldown_between_queries": 3,
            "queries": []
        })),
        STARTED_AT,
    )
    .expect("collection expanded");

    let snapshot = collection.snapshot(0).expect("snapshot");
    assert_eq!(snapshot.output_destination, Path::new("."));
    assert_eq!(snapshot.cooldown, Duration::from_secs(3));
}

#[test]
fn invalid_configuration_is_reported_before_execution() {
    let missing_endpoint =
        ExpandedCollection::expand(document(json!({ "queries": [] })), STARTED_AT);
    assert!(matches!(
        missing_endpoint,
        Err(LaborerError::MissingField { ref field }) if field == "endpoint"
    ));

    let missing_query = ExpandedCollection::expand(
        document(json!({
            "endpoint": "http://example.org/sparql",
            "queries": [{ "title": "No text" }]
        })),
        STARTED_AT,
    );
    assert!(matches!(
        missing_query,
        Err(LaborerError::MissingField { ref field }) if field == "queries[0].query"
    ));

    let bad_format = ExpandedCollection::expand(
        document(json!({
            "endpoint": "http://example.org/sparql",
            "output_format": "parquet",
            "queries": []
        })),
        STARTED_AT,
    );
    assert!(matches!(bad_format, Err(LaborerError::InvalidValue { .. })));

    let bad_flag = ExpandedCollection::expand(
        document(json!({
            "endpoint": "http://example.org/sparql",
            "write_empty_results": "yes",
            "queries": []
        })),
        STARTED_AT,
    );
    assert!(matches!(bad_flag, Err(LaborerError::InvalidType { .. })));

    let negative_cooldown = ExpandedCollection::expand(
        document(json!({
            "endpoint": "http://example.org/sparql",
            "cooldown_between_queries": -1,
            "queries": []
        })),
        STARTED_AT,
    );
    assert!(matches!(
        negative_cooldown,
        Err(ref err @ LaborerError::InvalidValue { .. }) if err.is_configuration_error()
    ));
}

#[test]
fn unknown_document_keys_are_rejected() {
    let parsed = serde_json::from_value::<CollectionDocument>(json!({
        "endpoint": "http://example.org/sparql",
        "queries": [],
        "output_fromat": "csv"
    }));
    assert!(parsed.is_err());
}

#[test]
fn scrub_query_removes_common_indentation_and_blank_lines() {
    let scrubbed = scrub_query("\n\t\tSELECT *\n\n\t\tWHERE {\n\t\t\t?s ?p ?o\n   \n\t\t}");
    assert_eq!(scrubbed, "SELECT *\nWHERE {\n    ?s ?p ?o\n}\n");
}

#[test]
fn template_is_a_valid_collection() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("template.json");

    write_template(&path).expect("template written");
    let document = load_document(&path).expect("template loaded");
    let collection = ExpandedCollection::expand(document, STARTED_AT).expect("template expanded");

    assert_eq!(collection.run_count(), 1);
    assert_eq!(collection.query_count(), 3);
    let snapshot = collection.snapshot(0).expect("snapshot");
    assert_eq!(snapshot.title, "TEST QUERIES");
    assert_eq!(snapshot.sample_limit, 3);
    assert_eq!(snapshot.queries[2].title, "");

    assert!(matches!(
        write_template(&path),
        Err(LaborerError::DestinationExists(_))
    ));
    let on_disk = std::fs::read_to_string(&path).expect("template read");
    assert_eq!(on_disk, TEMPLATE);
}

#[test]
fn malformed_lists_in_a_loaded_document_name_their_field() {
    let temp_dir = tempdir().expect("temporary directory");

    let empty_title = temp_dir.path().join("empty_title.json");
    std::fs::write(
        &empty_title,
        r#"{"endpoint": "http://example.org/sparql", "queries": [], "title": []}"#,
    )
    .expect("document written");
    let document = load_document(&empty_title).expect("document loaded");
    match ExpandedCollection::expand(document, STARTED_AT) {
        Err(error @ LaborerError::InvalidValue { .. }) => {
            assert!(error.is_configuration_error());
            assert!(matches!(error, LaborerError::InvalidValue { ref field, .. } if field == "title"));
        }
        other => panic!("expected an invalid value, got {other:?}"),
    }

    let nested_query_title = temp_dir.path().join("nested.json");
    std::fs::write(
        &nested_query_title,
        r#"{"endpoint": "http://example.org/sparql",
            "queries": [{"title": ["a", [["b"]]], "query": "ASK {}"}]}"#,
    )
    .expect("document written");
    let document = load_document(&nested_query_title).expect("document loaded");
    assert!(matches!(
        ExpandedCollection::expand(document, STARTED_AT),
        Err(LaborerError::InvalidValue { ref field, .. }) if field == "queries[0].title"
    ));
}

#[test]
fn missing_document_is_reported() {
    let temp_dir = tempdir().expect("temporary directory");
    let result = load_document(&temp_dir.path().join("absent.json"));
    assert!(matches!(result, Err(LaborerError::MissingInput(_))));
}
