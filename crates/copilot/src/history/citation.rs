//! Citations attached to resolved exchanges.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A source reference returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Service-provided id, or the 1-based position when absent.
    pub label: String,
    /// Relevance in `[0, 1]`, if the service reported one.
    pub similarity: Option<f64>,
    pub source_name: Option<String>,
    pub snippet: Option<String>,
}

impl Citation {
    /// Build a citation from one element of a `sources` array.
    ///
    /// `position` is zero-based.
    pub fn from_value(position: usize, value: &Value) -> Self {
        let label = match value.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => (position + 1).to_string(),
            Some(other) => other.to_string(),
        };

        let similarity = value
            .get("similarity")
            .and_then(Value::as_f64)
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(0.0, 1.0));

        Self {
            label,
            similarity,
            source_name: first_text(value, &["source", "filename"]),
            snippet: first_text(value, &["snippet", "text"]),
        }
    }

    /// Parse a `sources` field; anything but an array yields no citations.
    pub fn parse_all(sources: Option<&Value>) -> Vec<Self> {
        sources
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(position, item)| Self::from_value(position, item))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Score with two decimals, or `?` when unknown.
    pub fn score_label(&self) -> String {
        match self.similarity {
            Some(score) => format!("{score:.2}"),
            None => "?".to_string(),
        }
    }
}

fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
