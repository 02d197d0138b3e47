//! Multi-value expansion of a query collection into per-run snapshots.

pub mod field;
pub mod titles;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

pub use field::{ChainLink, Field};
pub use titles::disambiguate;

use crate::sparql::laborer::document::{CollectionDocument, QueryCallback, QueryDocument};
use crate::sparql::laborer::error::{LaborerError, Result};
use crate::sparql::laborer::model::ResultFormat;

/// Sample limit used when none is given or a negative one is given.
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;
/// Largest sample limit actually applied.
pub const SAMPLE_LIMIT_CEILING: usize = 101;
/// Largest sample limit announced to users. It is one below
/// [`SAMPLE_LIMIT_CEILING`]; the clamping warning reports both.
pub const SAMPLE_LIMIT_ADVERTISED: usize = 100;

/// A field resolved to either one broadcast value or one value per run.
#[derive(Debug, Clone)]
struct Resolved<T> {
    field: String,
    values: Vec<T>,
}

impl<T> Resolved<T> {
    fn cardinality(&self) -> usize {
        self.values.len()
    }

    fn at(&self, index: usize) -> &T {
        if self.values.len() == 1 {
            &self.values[0]
        } else {
            &self.values[index]
        }
    }
}

/// A query collection resolved into `run_count()` concrete configurations.
///
/// Fields are resolved once; [`ExpandedCollection::snapshot`] is a pure
/// projection of the cached values.
#[derive(Debug)]
pub struct ExpandedCollection {
    runs: usize,
    started_at: String,
    titles: Vec<String>,
    description: Resolved<String>,
    output_destination: Resolved<PathBuf>,
    output_format: Resolved<ResultFormat>,
    sample_limit: Resolved<usize>,
    cooldown: Resolved<Duration>,
    write_empty_results: Resolved<bool>,
    count_the_results: Resolved<bool>,
    endpoint: Resolved<String>,
    queries: Vec<ExpandedQuery>,
}

#[derive(Debug)]
struct ExpandedQuery {
    title: Resolved<String>,
    description: Resolved<String>,
    query: Resolved<String>,
    user_data: Option<Value>,
    callback: Option<QueryCallback>,
}

/// All-scalar configuration of one run.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub index: usize,
    /// Start timestamp of the whole execution, shared by every run.
    pub started_at: &'a str,
    /// Disambiguated collection title.
    pub title: &'a str,
    pub description: &'a str,
    pub output_destination: &'a Path,
    pub output_format: ResultFormat,
    pub sample_limit: usize,
    pub cooldown: Duration,
    pub write_empty_results: bool,
    pub count_the_results: bool,
    pub endpoint: &'a str,
    pub queries: Vec<QuerySnapshot<'a>>,
}

/// One query of a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct QuerySnapshot<'a> {
    /// One-based position in the collection.
    pub id: usize,
    pub title: &'a str,
    pub description: &'a str,
    pub query: &'a str,
    pub user_data: Option<&'a Value>,
    pub callback: Option<&'a QueryCallback>,
}

impl ExpandedCollection {
    /// Resolves every field of the document and checks that all multi-valued
    /// fields agree on the number of runs.
    ///
    /// `started_at` is the execution timestamp; it doubles as the default
    /// collection title.
    #[instrument(level = "info", skip_all, fields(started_at = %started_at))]
    pub fn expand(document: CollectionDocument, started_at: &str) -> Result<Self> {
        let CollectionDocument {
            title,
            description,
            output_destination,
            output_format,
            summary_sample_limit,
            cooldown_between_queries,
            write_empty_results,
            count_the_results,
            endpoint,
            queries,
        } = document;

        let endpoint = endpoint.ok_or_else(|| LaborerError::MissingField {
            field: "endpoint".to_string(),
        })?;
        let queries = queries.ok_or_else(|| LaborerError::MissingField {
            field: "queries".to_string(),
        })?;

        let title = resolve("title", title.as_ref(), || started_at.to_string(), to_title)?;
        let description = resolve("description", description.as_ref(), String::new, to_text)?;
        let output_destination = resolve(
            "output_destination",
            output_destination.as_ref(),
            || PathBuf::from("."),
            to_destination,
        )?;
        let output_format = resolve(
            "output_format",
            output_format.as_ref(),
            || ResultFormat::Csv,
            to_format,
        )?;
        let sample_limit = resolve(
            "summary_sample_limit",
            summary_sample_limit.as_ref(),
            || DEFAULT_SAMPLE_LIMIT,
            to_sample_limit,
        )?;
        let cooldown = resolve(
            "cooldown_between_queries",
            cooldown_between_queries.as_ref(),
            || Duration::ZERO,
            to_cooldown,
        )?;
        let write_empty_results = resolve(
            "write_empty_results",
            write_empty_results.as_ref(),
            || false,
            to_flag,
        )?;
        let count_the_results = resolve(
            "count_the_results",
            count_the_results.as_ref(),
            || true,
            to_flag,
        )?;
        let endpoint = resolve("endpoint", Some(&endpoint), String::new, to_endpoint)?;

        let queries = queries
            .into_iter()
            .enumerate()
            .map(|(position, query)| expand_query(position, query))
            .collect::<Result<Vec<_>>>()?;

        let mut cardinalities: Vec<(&str, usize)> = vec![
            (title.field.as_str(), title.cardinality()),
            (description.field.as_str(), description.cardinality()),
            (output_destination.field.as_str(), output_destination.cardinality()),
            (output_format.field.as_str(), output_format.cardinality()),
            (sample_limit.field.as_str(), sample_limit.cardinality()),
            (cooldown.field.as_str(), cooldown.cardinality()),
            (write_empty_results.field.as_str(), write_empty_results.cardinality()),
            (count_the_results.field.as_str(), count_the_results.cardinality()),
            (endpoint.field.as_str(), endpoint.cardinality()),
        ];
        for query in &queries {
            cardinalities.push((query.title.field.as_str(), query.title.cardinality()));
            cardinalities.push((query.description.field.as_str(), query.description.cardinality()));
            cardinalities.push((query.query.field.as_str(), query.query.cardinality()));
        }

        let runs = cardinalities
            .iter()
            .map(|(_, cardinality)| *cardinality)
            .filter(|cardinality| *cardinality > 1)
            .max()
            .unwrap_or(1);

        for (field, cardinality) in &cardinalities {
            if *cardinality != 1 && *cardinality != runs {
                return Err(LaborerError::CardinalityMismatch {
                    context: format!("field '{field}'"),
                    expected: runs,
                    found: *cardinality,
                });
            }
        }

        let raw_titles: Vec<&String> = (0..runs).map(|index| title.at(index)).collect();
        let titles = disambiguate(&raw_titles);

        if queries.is_empty() {
            warn!("query collection does not contain any queries");
        }
        info!(runs, query_count = queries.len(), "expanded query collection");

        Ok(Self {
            runs,
            started_at: started_at.to_string(),
            titles,
            description,
            output_destination,
            output_format,
            sample_limit,
            cooldown,
            write_empty_results,
            count_the_results,
            endpoint,
            queries,
        })
    }

    /// Number of runs implied by the multi-valued fields; at least one.
    pub fn run_count(&self) -> usize {
        self.runs
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Concrete configuration of run `index`, or `None` past the last run.
    pub fn snapshot(&self, index: usize) -> Option<Snapshot<'_>> {
        if index >= self.runs {
            return None;
        }

        let queries = self
            .queries
            .iter()
            .enumerate()
            .map(|(position, query)| QuerySnapshot {
                id: position + 1,
                title: query.title.at(index),
                description: query.description.at(index),
                query: query.query.at(index),
                user_data: query.user_data.as_ref(),
                callback: query.callback.as_ref(),
            })
            .collect();

        Some(Snapshot {
            index,
            started_at: &self.started_at,
            title: &self.titles[index],
            description: self.description.at(index),
            output_destination: self.output_destination.at(index),
            output_format: *self.output_format.at(index),
            sample_limit: *self.sample_limit.at(index),
            cooldown: *self.cooldown.at(index),
            write_empty_results: *self.write_empty_results.at(index),
            count_the_results: *self.count_the_results.at(index),
            endpoint: self.endpoint.at(index),
            queries,
        })
    }
}

fn expand_query(position: usize, query: QueryDocument) -> Result<ExpandedQuery> {
    let QueryDocument {
        title,
        description,
        query,
        custom_data,
        callback,
    } = query;

    let prefix = format!("queries[{position}]");
    let query = query.ok_or_else(|| LaborerError::MissingField {
        field: format!("{prefix}.query"),
    })?;

    Ok(ExpandedQuery {
        title: resolve(
            &format!("{prefix}.title"),
            title.as_ref(),
            String::new,
            to_query_text,
        )?,
        description: resolve(
            &format!("{prefix}.description"),
            description.as_ref(),
            String::new,
            to_text,
        )?,
        query: resolve(
            &format!("{prefix}.query"),
            Some(&query),
            String::new,
            to_query,
        )?,
        user_data: custom_data,
        callback,
    })
}

fn resolve<T>(
    name: &str,
    raw: Option<&Value>,
    default: impl FnOnce() -> T,
    convert: impl Fn(&str, Value) -> Result<T>,
) -> Result<Resolved<T>> {
    let values = match raw {
        None => vec![default()],
        Some(raw) => Field::from_value(name, raw.clone())?
            .resolve()
            .map_err(|err| match err {
                LaborerError::CardinalityMismatch {
                    context,
                    expected,
                    found,
                } => LaborerError::CardinalityMismatch {
                    context: format!("{context} of field '{name}'"),
                    expected,
                    found,
                },
                other => other,
            })?
            .into_iter()
            .map(|value| convert(name, value))
            .collect::<Result<Vec<_>>>()?,
    };
    debug!(field = name, cardinality = values.len(), "resolved field");
    Ok(Resolved {
        field: name.to_string(),
        values,
    })
}

fn to_title(field: &str, value: Value) -> Result<String> {
    match value {
        Value::Object(_) => Err(LaborerError::invalid_type(field, "a string", &value)),
        other => Ok(field::render(&other)),
    }
}

fn to_text(field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => Err(LaborerError::invalid_type(field, "a string", &other)),
    }
}

fn to_query_text(field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(LaborerError::invalid_type(field, "a string", &other)),
    }
}

fn to_destination(field: &str, value: Value) -> Result<PathBuf> {
    match value {
        Value::Null => Ok(PathBuf::from(".")),
        Value::String(text) if text.trim().is_empty() => Ok(PathBuf::from(".")),
        Value::String(text) => Ok(PathBuf::from(text)),
        other => Err(LaborerError::invalid_type(field, "a string", &other)),
    }
}

fn to_format(field: &str, value: Value) -> Result<ResultFormat> {
    match value {
        Value::String(text) => text
            .parse()
            .map_err(|message: String| LaborerError::invalid_value(field, message)),
        other => Err(LaborerError::invalid_type(field, "a string", &other)),
    }
}

fn to_sample_limit(field: &str, value: Value) -> Result<usize> {
    let limit = match (value.as_i64(), value.as_u64()) {
        (Some(limit), _) => limit,
        (None, Some(_)) => i64::MAX,
        (None, None) => return Err(LaborerError::invalid_type(field, "an integer", &value)),
    };

    if limit < 0 {
        warn!(
            limit,
            replacement = DEFAULT_SAMPLE_LIMIT,
            "negative sample limit replaced with the default"
        );
        return Ok(DEFAULT_SAMPLE_LIMIT);
    }

    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    if limit > SAMPLE_LIMIT_CEILING {
        warn!(
            limit,
            advertised = SAMPLE_LIMIT_ADVERTISED,
            applied = SAMPLE_LIMIT_CEILING,
            "sample limit too high, clamped"
        );
        return Ok(SAMPLE_LIMIT_CEILING);
    }

    Ok(limit)
}

fn to_cooldown(field: &str, value: Value) -> Result<Duration> {
    if let Some(seconds) = value.as_u64() {
        return Ok(Duration::from_secs(seconds));
    }
    match value.as_i64() {
        Some(seconds) => Err(LaborerError::invalid_value(
            field,
            format!("expected zero or more seconds, found {seconds}"),
        )),
        None => Err(LaborerError::invalid_type(field, "an integer", &value)),
    }
}

fn to_flag(field: &str, value: Value) -> Result<bool> {
    match value {
        Value::Bool(flag) => Ok(flag),
        other => Err(LaborerError::invalid_type(field, "a boolean", &other)),
    }
}

fn to_endpoint(field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(text) if text.trim().is_empty() => {
            Err(LaborerError::invalid_value(field, "endpoint must not be empty"))
        }
        Value::String(text) => Ok(text.trim().to_string()),
        other => Err(LaborerError::invalid_type(field, "a string", &other)),
    }
}

fn to_query(field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(scrub_query(&text)),
        other => Err(LaborerError::invalid_type(field, "a string", &other)),
    }
}

/// Normalises the layout of a query for display: tabs become four spaces,
/// the indentation shared by all non-blank lines is removed, and blank lines
/// are dropped. Every kept line ends with a newline.
pub fn scrub_query(text: &str) -> String {
    let expanded = text.replace('\t', "    ");
    let lines: Vec<&str> = expanded
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    let indent = lines
        .iter()
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);

    let mut scrubbed = String::with_capacity(expanded.len());
    for line in lines {
        scrubbed.push_str(&line[indent..]);
        scrubbed.push('\n');
    }
    scrubbed
}
