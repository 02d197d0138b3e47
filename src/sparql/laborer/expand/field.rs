use serde_json::Value;

use crate::sparql::laborer::error::{LaborerError, Result};

/// Declared value of one configuration attribute.
///
/// The shape is decided once, when the field is expanded:
///
/// * a non-list value is a [`Field::Scalar`], broadcast to every run;
/// * a list without nested lists is a [`Field::DisjointList`] of independent
///   alternatives, one per run;
/// * a list holding at least one nested list is a
///   [`Field::ConcatenationChain`] whose links are concatenated pairwise, e.g.
///   `["queries on ", ["A", "B"]]` yields `"queries on A"` and
///   `"queries on B"`.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Scalar(Value),
    DisjointList(Vec<Value>),
    ConcatenationChain(Vec<ChainLink>),
}

/// One element of a concatenation chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainLink {
    Scalar(Value),
    List(Vec<Value>),
}

impl Field {
    /// Classifies the raw document value of the attribute named `field`.
    pub fn from_value(field: &str, value: Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            scalar => return Ok(Field::Scalar(scalar)),
        };

        if items.is_empty() {
            return Err(LaborerError::invalid_value(
                field,
                "a list of values must not be empty",
            ));
        }

        if !items.iter().any(Value::is_array) {
            return Ok(Field::DisjointList(items));
        }

        let links = items
            .into_iter()
            .map(|item| match item {
                Value::Array(values) => {
                    if values.is_empty() {
                        return Err(LaborerError::invalid_value(
                            field,
                            "a nested list of values must not be empty",
                        ));
                    }
                    if values.iter().any(Value::is_array) {
                        return Err(LaborerError::invalid_value(
                            field,
                            "lists may only be nested one level deep",
                        ));
                    }
                    Ok(ChainLink::List(values))
                }
                scalar => Ok(ChainLink::Scalar(scalar)),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Field::ConcatenationChain(links))
    }

    /// Resolves the field into its ordered run values. The number of values is
    /// the field's own cardinality.
    pub fn resolve(&self) -> Result<Vec<Value>> {
        match self {
            Field::Scalar(value) => Ok(vec![value.clone()]),
            Field::DisjointList(values) => Ok(values.clone()),
            Field::ConcatenationChain(links) => resolve_chain(links),
        }
    }

    /// Number of values the field resolves to.
    pub fn cardinality(&self) -> Result<usize> {
        match self {
            Field::Scalar(_) => Ok(1),
            Field::DisjointList(values) => Ok(values.len()),
            Field::ConcatenationChain(_) => Ok(self.resolve()?.len()),
        }
    }
}

fn resolve_chain(links: &[ChainLink]) -> Result<Vec<Value>> {
    let mut acc: Vec<Value> = Vec::new();

    for (position, link) in links.iter().enumerate() {
        if position == 0 {
            acc = match link {
                ChainLink::Scalar(value) => vec![Value::String(render(value))],
                ChainLink::List(values) => values.clone(),
            };
            continue;
        }

        acc = match link {
            ChainLink::Scalar(value) => {
                let suffix = render(value);
                acc.iter()
                    .map(|prefix| concat(prefix, &suffix))
                    .collect()
            }
            ChainLink::List(values) if values.len() == 1 => {
                let suffix = render(&values[0]);
                acc.iter()
                    .map(|prefix| concat(prefix, &suffix))
                    .collect()
            }
            ChainLink::List(values) if acc.len() == 1 => values
                .iter()
                .map(|suffix| concat(&acc[0], &render(suffix)))
                .collect(),
            ChainLink::List(values) if values.len() == acc.len() => acc
                .iter()
                .zip(values)
                .map(|(prefix, suffix)| concat(prefix, &render(suffix)))
                .collect(),
            ChainLink::List(values) => {
                return Err(LaborerError::CardinalityMismatch {
                    context: "concatenation chain".to_string(),
                    expected: acc.len(),
                    found: values.len(),
                });
            }
        };
    }

    Ok(acc)
}

fn concat(prefix: &Value, suffix: &str) -> Value {
    let mut text = render(prefix);
    text.push_str(suffix);
    Value::String(text)
}

/// Textual form of a scalar as used when concatenating.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
