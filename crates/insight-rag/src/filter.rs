//! Metadata Filter Simplification
//!
//! Flattens a boolean filter tree into a field -> accepted-values summary
//! for reporting alongside answers. Deliberately shallow: one AND of ORs of
//! equality leaves. Deeper shapes refuse instead of mis-reporting.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{ChainError, ChainResult};

/// Sentinel text emitted when serializing the no-filter case.
pub const NO_FILTERS_APPLIED: &str = "No filters applied";

/// Boolean expression tree over field equality predicates. Leaves carry
/// equality only; ranges and negations belong to the store's own query
/// language and never reach the simplifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetrievalFilter {
    And(Vec<RetrievalFilter>),
    Or(Vec<RetrievalFilter>),
    Eq { field: String, value: Value },
}

impl RetrievalFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Parse the store dialect: `{"$and": [...]}`, `{"$or": [...]}`,
    /// `{"field": {"$eq": value}}`. A multi-field object is read as an AND
    /// of its equality leaves.
    pub fn from_value(value: &Value) -> ChainResult<Self> {
        let map = value.as_object().ok_or_else(|| {
            ChainError::FilterShapeUnsupported(format!("expected an object, got {}", value))
        })?;

        if let Some(children) = map.get("$and") {
            return Ok(Self::And(Self::parse_children(children, "$and")?));
        }
        if let Some(children) = map.get("$or") {
            return Ok(Self::Or(Self::parse_children(children, "$or")?));
        }

        let mut leaves = Vec::with_capacity(map.len());
        for (field, predicate) in map {
            let eq = predicate.get("$eq").ok_or_else(|| {
                ChainError::FilterShapeUnsupported(format!(
                    "field `{}` must carry an $eq predicate, got {}",
                    field, predicate
                ))
            })?;
            leaves.push(Self::Eq {
                field: field.clone(),
                value: eq.clone(),
            });
        }
        match leaves.len() {
            0 => Err(ChainError::FilterShapeUnsupported(
                "empty filter object".into(),
            )),
            1 => Ok(leaves.remove(0)),
            _ => Ok(Self::And(leaves)),
        }
    }

    fn parse_children(children: &Value, combinator: &str) -> ChainResult<Vec<Self>> {
        let items = children.as_array().ok_or_else(|| {
            ChainError::FilterShapeUnsupported(format!("`{}` must hold an array", combinator))
        })?;
        items.iter().map(Self::from_value).collect()
    }

    /// Emit the store dialect consumed by `from_value`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::And(children) => {
                let items: Vec<Value> = children.iter().map(Self::to_value).collect();
                let mut map = Map::new();
                map.insert("$and".to_string(), Value::Array(items));
                Value::Object(map)
            }
            Self::Or(children) => {
                let items: Vec<Value> = children.iter().map(Self::to_value).collect();
                let mut map = Map::new();
                map.insert("$or".to_string(), Value::Array(items));
                Value::Object(map)
            }
            Self::Eq { field, value } => {
                let mut predicate = Map::new();
                predicate.insert("$eq".to_string(), value.clone());
                let mut leaf = Map::new();
                leaf.insert(field.clone(), Value::Object(predicate));
                Value::Object(leaf)
            }
        }
    }
}

/// Human-readable summary of the filter that was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SimplifiedFilter {
    /// No filter was supplied.
    NoFilters,
    /// field -> accepted values, in traversal order per field.
    ByField(HashMap<String, Vec<Value>>),
    /// The filter was too deep or non-equality to summarize. The raw
    /// filter still applied to retrieval; only this summary is degraded.
    Unsupported { reason: String },
}

impl Serialize for SimplifiedFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::NoFilters => serializer.serialize_str(NO_FILTERS_APPLIED),
            Self::ByField(fields) => fields.serialize(serializer),
            Self::Unsupported { reason } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("unsupported_filter", reason)?;
                map.end()
            }
        }
    }
}

/// Flatten a filter into field -> accepted values.
///
/// A root AND contributes its children as conditions; any other filter is
/// the sole condition. Each condition is either an OR over equality leaves
/// or a single equality leaf. A field named by several leaves accumulates
/// all of its values in encounter order.
pub fn simplify(filter: Option<&RetrievalFilter>) -> ChainResult<SimplifiedFilter> {
    let filter = match filter {
        Some(filter) => filter,
        None => return Ok(SimplifiedFilter::NoFilters),
    };

    let conditions: Vec<&RetrievalFilter> = match filter {
        RetrievalFilter::And(children) => children.iter().collect(),
        other => vec![other],
    };

    let mut by_field: HashMap<String, Vec<Value>> = HashMap::new();
    for condition in conditions {
        match condition {
            RetrievalFilter::Or(leaves) => {
                for leaf in leaves {
                    push_leaf(&mut by_field, leaf)?;
                }
            }
            leaf => push_leaf(&mut by_field, leaf)?,
        }
    }

    Ok(SimplifiedFilter::ByField(by_field))
}

fn push_leaf(by_field: &mut HashMap<String, Vec<Value>>, leaf: &RetrievalFilter) -> ChainResult<()> {
    match leaf {
        RetrievalFilter::Eq { field, value } => {
            by_field.entry(field.clone()).or_default().push(value.clone());
            Ok(())
        }
        RetrievalFilter::And(_) => Err(ChainError::FilterShapeUnsupported(
            "AND nested below the top level".into(),
        )),
        RetrievalFilter::Or(_) => Err(ChainError::FilterShapeUnsupported(
            "OR nested inside another condition".into(),
        )),
    }
}
