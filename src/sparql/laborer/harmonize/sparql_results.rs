use oxigraph::model::Term;
use oxigraph::sparql::results::{
    QueryResultsFormat, QueryResultsParser, SliceQueryResultsParserOutput,
};
use serde_json::Value;

use crate::sparql::laborer::error::{LaborerError, Result};
use crate::sparql::laborer::harmonize::keyed::KeyedRows;
use crate::sparql::laborer::model::Cell;

/// Column used for the answer of an `ASK` query.
pub const BOOLEAN_COLUMN: &str = "boolean";

/// Reads SPARQL 1.1 JSON results.
///
/// Columns follow the key order of the first binding row; without any row
/// the declared `head.vars` are used.
pub fn json_keyed_rows(body: &[u8]) -> Result<KeyedRows> {
    let document: Value = serde_json::from_slice(body)?;

    if let Some(answer) = document.get("boolean").and_then(Value::as_bool) {
        return boolean_rows(answer);
    }

    let bindings = document
        .pointer("/results/bindings")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            LaborerError::ResultsSyntax("JSON results lack 'results.bindings'".to_string())
        })?;

    let columns: Vec<String> = match bindings.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        Some(_) => {
            return Err(LaborerError::ResultsSyntax(
                "JSON binding rows must be objects".to_string(),
            ));
        }
        None => document
            .pointer("/head/vars")
            .and_then(Value::as_array)
            .map(|vars| {
                vars.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let mut keyed = KeyedRows::new(columns);
    for binding in bindings {
        let object = binding.as_object().ok_or_else(|| {
            LaborerError::ResultsSyntax("JSON binding rows must be objects".to_string())
        })?;
        let row = object
            .iter()
            .map(|(key, term)| {
                let value = term.get("value").and_then(Value::as_str).ok_or_else(|| {
                    LaborerError::ResultsSyntax(format!("binding '{key}' has no value"))
                })?;
                Ok((key.clone(), Cell::parse(value)))
            })
            .collect::<Result<Vec<_>>>()?;
        keyed.push_row(row)?;
    }

    Ok(keyed)
}

/// Reads SPARQL XML results. Columns follow the declared variable list.
pub fn xml_keyed_rows(body: &[u8]) -> Result<KeyedRows> {
    let parser = QueryResultsParser::from_format(QueryResultsFormat::Xml);
    let output = parser
        .for_slice(body)
        .map_err(|err| LaborerError::ResultsSyntax(err.to_string()))?;

    match output {
        SliceQueryResultsParserOutput::Boolean(answer) => boolean_rows(answer),
        SliceQueryResultsParserOutput::Solutions(solutions) => {
            let columns = solutions
                .variables()
                .iter()
                .map(|variable| variable.as_str().to_string())
                .collect();
            let mut keyed = KeyedRows::new(columns);
            for solution in solutions {
                let solution = solution.map_err(|err| LaborerError::ResultsSyntax(err.to_string()))?;
                let row = solution
                    .iter()
                    .map(|(variable, term)| {
                        (variable.as_str().to_string(), Cell::parse(&term_value(term)))
                    })
                    .collect();
                keyed.push_row(row)?;
            }
            Ok(keyed)
        }
    }
}

fn boolean_rows(answer: bool) -> Result<KeyedRows> {
    let mut keyed = KeyedRows::new(vec![BOOLEAN_COLUMN.to_string()]);
    keyed.push_row(vec![(
        BOOLEAN_COLUMN.to_string(),
        Cell::Text(answer.to_string()),
    )])?;
    Ok(keyed)
}

/// Lexical value of a bound term: the IRI, the blank node label, or the
/// literal text without datatype or language tag.
fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::BlankNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        #[allow(unreachable_patterns)]
        other => other.to_string(),
    }
}
