//! Indexed document representation.

use std::collections::HashMap;

use serde::Serialize;

/// Namespace prefix for user-supplied properties.
pub const PROPERTY_PREFIX: &str = "properties.";

/// Reserved system fields, written alongside the namespaced properties.
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_MIN_COUNT: &str = "min_count";
pub const FIELD_MAX_COUNT: &str = "max_count";
pub const FIELD_PARTY_ID: &str = "party_id";
pub const FIELD_SESSION_IDS: &str = "session_ids";

/// A flat field bag: text fields hold one or more raw values (tokenized on
/// whitespace at match time), numeric fields hold a single finite double.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Document {
    text: HashMap<String, Vec<String>>,
    numeric: HashMap<String, f64>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value to a text field. Multi-valued fields accumulate.
    pub fn push_text(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.text.entry(field.into()).or_default().push(value.into());
    }

    /// Set a numeric field. Non-finite values are ignored.
    pub fn set_numeric(&mut self, field: impl Into<String>, value: f64) {
        if value.is_finite() {
            self.numeric.insert(field.into(), value);
        }
    }

    /// Raw values of a text field.
    pub fn text_values(&self, field: &str) -> Option<&[String]> {
        self.text.get(field).map(|v| v.as_slice())
    }

    /// Value of a numeric field.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.numeric.get(field).copied()
    }

    /// Iterate all text fields with their values.
    pub fn text_fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.text.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Iterate all numeric fields.
    pub fn numeric_fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.numeric.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Lowercased whitespace tokens of every value of a text field.
    pub fn tokens(&self, field: &str) -> Vec<String> {
        self.text
            .get(field)
            .map(|values| {
                values
                    .iter()
                    .flat_map(|v| v.split_whitespace())
                    .map(|t| t.to_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }
}
