//! Metadata filter descriptors.
//!
//! A [`MetadataFilter`] is handed to the corpus provider unchanged; each
//! backend is free to translate it into its native query language. The
//! [`MetadataFilter::matches`] evaluation here is the reference semantics used
//! by the in-memory provider: `must` conditions are AND-ed, `must_not`
//! conditions are AND-NOT-ed, and a condition on a missing field never holds.

use super::types::{Metadata, MetadataValue};
use serde::{Deserialize, Serialize};

/// Filter clause with `must` (AND) and `must_not` (AND-NOT) conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub must: Vec<FilterCondition>,
    #[serde(default)]
    pub must_not: Vec<FilterCondition>,
}

/// A single condition on a metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterCondition {
    Eq {
        field: String,
        value: MetadataValue,
    },
    /// Numeric range; unset bounds are open.
    Range {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gt: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lt: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<f64>,
    },
    In {
        field: String,
        values: Vec<MetadataValue>,
    },
    /// Case-sensitive substring match on a text field.
    Contains {
        field: String,
        text: String,
    },
    Exists {
        field: String,
    },
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, condition: FilterCondition) -> Self {
        self.must.push(condition);
        self
    }

    pub fn must_not(mut self, condition: FilterCondition) -> Self {
        self.must_not.push(condition);
        self
    }

    /// True when the filter has no conditions and therefore admits everything.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }

    /// Evaluates the filter against a node's metadata.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.must.iter().all(|cond| cond.matches(metadata))
            && !self.must_not.iter().any(|cond| cond.matches(metadata))
    }
}

impl FilterCondition {
    pub fn eq(field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        FilterCondition::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Inclusive range `[min, max]`.
    pub fn between(field: impl Into<String>, min: f64, max: f64) -> Self {
        FilterCondition::Range {
            field: field.into(),
            gt: None,
            gte: Some(min),
            lt: None,
            lte: Some(max),
        }
    }

    pub fn one_of<V: Into<MetadataValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        FilterCondition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(field: impl Into<String>, text: impl Into<String>) -> Self {
        FilterCondition::Contains {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        FilterCondition::Exists {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FilterCondition::Eq { field, .. }
            | FilterCondition::Range { field, .. }
            | FilterCondition::In { field, .. }
            | FilterCondition::Contains { field, .. }
            | FilterCondition::Exists { field } => field,
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        let Some(actual) = metadata.get(self.field()) else {
            return false;
        };

        match self {
            FilterCondition::Eq { value, .. } => values_equal(actual, value),
            FilterCondition::Range {
                gt, gte, lt, lte, ..
            } => {
                let Some(x) = actual.as_f64() else {
                    return false;
                };
                gt.map_or(true, |bound| x > bound)
                    && gte.map_or(true, |bound| x >= bound)
                    && lt.map_or(true, |bound| x < bound)
                    && lte.map_or(true, |bound| x <= bound)
            }
            FilterCondition::In { values, .. } => values.iter().any(|v| values_equal(actual, v)),
            FilterCondition::Contains { text, .. } => match actual {
                MetadataValue::Text(s) => s.contains(text.as_str()),
                _ => false,
            },
            FilterCondition::Exists { .. } => true,
        }
    }
}

/// Equality with integer/float cross-comparison.
fn values_equal(a: &MetadataValue, b: &MetadataValue) -> bool {
    match (a, b) {
        (MetadataValue::Text(x), MetadataValue::Text(y)) => x == y,
        (MetadataValue::Bool(x), MetadataValue::Bool(y)) => x == y,
        (MetadataValue::Integer(x), MetadataValue::Integer(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => false,
        },
    }
}
