//! Topic routing for decoded telemetry fields
//!
//! Maps field names onto broker topics. Lookups ignore ASCII case so that
//! `TEMP=5` and `temp=5` land on the same topic; names missing from the table
//! are forward-compatible no-ops.

use super::decoder::DecodedField;
use std::collections::HashMap;
use thiserror::Error;

/// Reference deployment topics, in field order
pub const DEFAULT_TOPICS: [(&str, &str); 4] = [
    ("Temp", "sensor/Temp"),
    ("Hum", "sensor/Hum"),
    ("Soil", "sensor/Soil"),
    ("Rain", "sensor/Rain"),
];

/// A single retained publish produced for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
    /// Ask the broker to keep the value for late subscribers
    pub retain: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Duplicate field name in topic mapping: {0}")]
    DuplicateField(String),
    #[error("Empty field name in topic mapping")]
    EmptyField,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TopicEntry {
    field: String,
    topic: String,
}

/// Static field-name to topic table, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMapping {
    entries: HashMap<String, TopicEntry>,
}

impl TopicMapping {
    /// Build a mapping, rejecting names that collide when case is ignored
    pub fn new<I, F, T>(entries: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (F, T)>,
        F: Into<String>,
        T: Into<String>,
    {
        let mut table = HashMap::new();
        for (field, topic) in entries {
            let field = field.into();
            if field.trim().is_empty() {
                return Err(MappingError::EmptyField);
            }
            let key = field.to_ascii_lowercase();
            if table.contains_key(&key) {
                return Err(MappingError::DuplicateField(field));
            }
            table.insert(
                key,
                TopicEntry {
                    field,
                    topic: topic.into(),
                },
            );
        }
        Ok(Self { entries: table })
    }

    /// Case-insensitive topic lookup
    pub fn topic_for(&self, field_name: &str) -> Option<&str> {
        self.entries
            .get(&field_name.to_ascii_lowercase())
            .map(|entry| entry.topic.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as `(field, topic)` sorted by topic, for display
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .map(|e| (e.field.as_str(), e.topic.as_str()))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(b.1));
        entries
    }
}

impl Default for TopicMapping {
    fn default() -> Self {
        let entries = DEFAULT_TOPICS
            .iter()
            .map(|(field, topic)| {
                (
                    field.to_ascii_lowercase(),
                    TopicEntry {
                        field: field.to_string(),
                        topic: topic.to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

/// Route one field to its publish request (pure function)
///
/// Every request is retained so the latest reading survives for subscribers
/// that connect after it was published.
pub fn route(field: &DecodedField, mapping: &TopicMapping) -> Option<PublishRequest> {
    mapping.topic_for(&field.name).map(|topic| PublishRequest {
        topic: topic.to_string(),
        payload: field.value.clone(),
        retain: true,
    })
}
