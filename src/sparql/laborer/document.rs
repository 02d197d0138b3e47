use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::sparql::laborer::error::{LaborerError, Result};
use crate::sparql::laborer::model::QueryRecord;

/// Query collection as written by the user, before expansion.
///
/// Every attribute except `queries` and `endpoint` is optional; defaults are
/// applied during expansion. Any attribute may hold a scalar, a list of
/// alternatives, or a concatenation chain; the shape is classified during
/// expansion (see [`crate::sparql::laborer::expand::Field`]).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionDocument {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub output_destination: Option<Value>,
    #[serde(default)]
    pub output_format: Option<Value>,
    #[serde(default)]
    pub summary_sample_limit: Option<Value>,
    #[serde(default)]
    pub cooldown_between_queries: Option<Value>,
    #[serde(default)]
    pub write_empty_results: Option<Value>,
    #[serde(default)]
    pub count_the_results: Option<Value>,
    #[serde(default)]
    pub endpoint: Option<Value>,
    #[serde(default)]
    pub queries: Option<Vec<QueryDocument>>,
}

impl CollectionDocument {
    pub fn new(endpoint: impl Into<Value>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            queries: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: QueryDocument) -> Self {
        self.queries.get_or_insert_with(Vec::new).push(query);
        self
    }
}

/// One entry of the `queries` list.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDocument {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub query: Option<Value>,
    /// Arbitrary data carried through to the query's result record.
    #[serde(default)]
    pub custom_data: Option<Value>,
    #[serde(skip)]
    pub callback: Option<QueryCallback>,
}

impl QueryDocument {
    pub fn new(query: impl Into<Value>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<Value>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_callback(mut self, callback: impl Fn(&QueryRecord) + 'static) -> Self {
        self.callback = Some(QueryCallback::new(callback));
        self
    }
}

/// Callback invoked with the finished record of its query.
pub struct QueryCallback(Box<dyn Fn(&QueryRecord)>);

impl QueryCallback {
    pub fn new(callback: impl Fn(&QueryRecord) + 'static) -> Self {
        Self(Box::new(callback))
    }

    pub fn call(&self, record: &QueryRecord) {
        (self.0)(record)
    }
}

impl fmt::Debug for QueryCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueryCallback")
    }
}

/// Reads a query collection document from disk.
#[instrument(level = "info", skip_all, fields(input = %path.display()))]
pub fn load_document(path: &Path) -> Result<CollectionDocument> {
    if !path.exists() {
        return Err(LaborerError::MissingInput(path.to_path_buf()));
    }
    let source = fs::read_to_string(path)?;
    let document: CollectionDocument = serde_json::from_str(&source)?;
    info!(
        query_count = document.queries.as_ref().map_or(0, Vec::len),
        "read query collection"
    );
    Ok(document)
}

/// Writes an example query collection to `path`. Existing files are left
/// untouched.
#[instrument(level = "info", skip_all, fields(output = %path.display()))]
pub fn write_template(path: &Path) -> Result<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(LaborerError::DestinationExists(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    file.write_all(TEMPLATE.as_bytes())?;
    info!("template written");
    Ok(())
}

/// Example query collection showing every attribute.
pub const TEMPLATE: &str = r#"{
  "title": "TEST QUERIES",
  "description": "This set of queries is used as a template for showcasing a valid query collection file.",
  "output_destination": ".",
  "output_format": "csv",
  "summary_sample_limit": 3,
  "cooldown_between_queries": 0,
  "write_empty_results": false,
  "count_the_results": true,
  "endpoint": "http://dbpedia.org/sparql",
  "queries": [
    {
      "title": "Optional title of first query",
      "description": "Optional description of first query, used to describe the purpose of the query.",
      "query": "SELECT * WHERE {\n  ?s ?p ?o\n}\nLIMIT 50\n"
    },
    {
      "title": "Second query",
      "description": "This query returns all triples which have a label associated",
      "query": "SELECT * WHERE {\n  ?s <http://www.w3.org/2000/01/rdf-schema#label> ?o\n}\nLIMIT 50\n"
    },
    {
      "query": "SELECT * WHERE {\n  ?s ?p ?o .\n  FILTER ( ?p = <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> )\n}\nLIMIT 50\n"
    }
  ]
}
"#;
