// Documents as open field maps with a reserved identity key

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The reserved key carrying a document's caller-assigned identity.
pub const ID_FIELD: &str = "id";

/// A schema-open document: an ordered mapping of field name to value.
///
/// Documents always carry their own identity under [`ID_FIELD`] when they
/// cross a component boundary. Backends that store the identity separately
/// (as a native key) must strip it on write and re-inject it on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the caller-assigned identity, if present.
    ///
    /// Numeric ids are accepted on input and normalized to strings.
    pub fn id(&self) -> Option<String> {
        match self.0.get(ID_FIELD)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy with the identity field set to `document_id`.
    pub fn with_id(mut self, document_id: &str) -> Self {
        self.0
            .insert(ID_FIELD.to_string(), Value::String(document_id.to_string()));
        self
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
