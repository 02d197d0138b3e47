use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::sparql::laborer::error::{LaborerError, Result};
use crate::sparql::laborer::model::ResultFormat;

/// Query counting every triple of an endpoint.
pub const TRIPLE_COUNT_QUERY: &str = "SELECT (COUNT(*) AS ?count) WHERE { ?s ?p ?o }";

const COUNT_PREFIX: &str = "SELECT (COUNT(*) AS ?count) WHERE {\nSELECT";
const COUNT_SUFFIX: &str = "\n}";
const ERROR_DETAIL_LIMIT: usize = 300;

/// Raw answer of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub body: Vec<u8>,
    pub duration: Duration,
}

/// Runs one query against an endpoint and returns the undecoded body.
///
/// Failures are reported as [`LaborerError::QueryExecution`].
pub trait Executor {
    fn run(&self, query: &str, endpoint: &str, format: ResultFormat) -> Result<Execution>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn run(&self, query: &str, endpoint: &str, format: ResultFormat) -> Result<Execution> {
        (**self).run(query, endpoint, format)
    }
}

/// SPARQL 1.1 protocol client posting the query as a form field.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sparql-laborer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| LaborerError::QueryExecution(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Executor for HttpExecutor {
    #[instrument(level = "debug", skip(self, query))]
    fn run(&self, query: &str, endpoint: &str, format: ResultFormat) -> Result<Execution> {
        let started = Instant::now();
        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, format.media_type())
            .form(&[("query", query)])
            .send()
            .map_err(|err| LaborerError::QueryExecution(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .unwrap_or_default()
                .trim()
                .chars()
                .take(ERROR_DETAIL_LIMIT)
                .collect();
            return Err(LaborerError::QueryExecution(format!(
                "endpoint answered {status}: {detail}"
            )));
        }

        let body = response
            .bytes()
            .map_err(|err| LaborerError::QueryExecution(err.to_string()))?
            .to_vec();
        let duration = started.elapsed();
        debug!(bytes = body.len(), ?duration, "received response");
        Ok(Execution { body, duration })
    }
}

/// Wraps a query so that the endpoint counts its result lines.
///
/// The first `select` keyword that is not commented out by a `#` earlier on
/// its line becomes a sub-select. Returns `None` when there is no such
/// keyword.
pub fn count_query(query: &str) -> Option<String> {
    let mut offset = 0;
    for line in query.split_inclusive('\n') {
        let code = line.find('#').map_or(line, |comment| &line[..comment]);
        if let Some(position) = code.to_ascii_lowercase().find("select") {
            let at = offset + position;
            let mut derived = String::with_capacity(query.len() + COUNT_PREFIX.len() + 2);
            derived.push_str(&query[..at]);
            derived.push_str(COUNT_PREFIX);
            derived.push_str(&query[at + "select".len()..]);
            derived.push_str(COUNT_SUFFIX);
            return Some(derived);
        }
        offset += line.len();
    }
    None
}

/// Reads the count out of a JSON result: the first value of the first row.
pub fn parse_count(body: &[u8]) -> Result<u64> {
    let document: Value = serde_json::from_slice(body)?;
    let value = document
        .pointer("/results/bindings/0")
        .and_then(Value::as_object)
        .and_then(|row| row.values().next())
        .and_then(|term| term.get("value"))
        .and_then(Value::as_str)
        .ok_or_else(|| LaborerError::ResultsSyntax("count result has no value".to_string()))?;
    value
        .trim()
        .parse()
        .map_err(|_| LaborerError::ResultsSyntax(format!("count '{value}' is not a number")))
}
