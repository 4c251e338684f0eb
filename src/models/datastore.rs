// Datastore schema types

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::models::document::{Document, ID_FIELD};

/// Field types understood by the document-store engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Keyword,
    Long,
    Double,
    Boolean,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(FieldType::Text),
            "keyword" => Ok(FieldType::Keyword),
            "long" => Ok(FieldType::Long),
            "double" => Ok(FieldType::Double),
            "boolean" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            _ => Err(RetrievalError::Invalid(format!("unknown field type: {}", s))),
        }
    }
}

/// One field of a datastore schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl DatastoreField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// A named, schema-typed document collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datastore {
    pub name: String,
    pub fields: Vec<DatastoreField>,
}

impl Datastore {
    pub fn new(name: impl Into<String>, fields: Vec<DatastoreField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&DatastoreField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Checks that a document carries an identity and only schema-known
    /// fields. Used by the batch upload path to count format errors without
    /// aborting the batch.
    pub fn is_valid_document(&self, document: &Document) -> bool {
        if document.id().is_none() {
            return false;
        }
        document
            .keys()
            .all(|key| key == ID_FIELD || self.field(key).is_some())
    }
}

/// Size statistics of a datastore's document collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreStats {
    pub name: String,
    pub documents: u64,
    pub size_in_bytes: u64,
}
