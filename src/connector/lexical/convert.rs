// Translation between core model types and the document-store wire format.
//
// The document strip/inject pair is the single choke point for identity
// handling: the identity field never reaches the store as a document
// property, it travels as the store's native key.

use serde_json::{json, Value};

use crate::error::{Result, RetrievalError};
use crate::models::{Datastore, DatastoreField, Document, Index, ID_FIELD};

/// Builds the collection mapping body for a datastore schema.
///
/// The identity field is deliberately absent from the mapping; it is carried
/// by the store's native document key.
pub(crate) fn mapping_from_datastore(datastore: &Datastore) -> Value {
    let mut properties = serde_json::Map::new();
    for field in &datastore.fields {
        if field.name == ID_FIELD {
            continue;
        }
        properties.insert(field.name.clone(), json!({ "type": field.field_type }));
    }
    json!({ "mappings": { "properties": properties } })
}

/// Reads a datastore schema back out of a collection mapping body.
///
/// Properties with types outside the supported vocabulary are skipped.
pub(crate) fn datastore_from_mapping(datastore_name: &str, body: &Value) -> Datastore {
    let mut fields = Vec::new();
    if let Some(properties) = body["mappings"]["properties"].as_object() {
        for (name, config) in properties {
            let raw_type = config["type"].as_str().unwrap_or_default();
            match raw_type.parse() {
                Ok(field_type) => fields.push(DatastoreField::new(name.clone(), field_type)),
                Err(_) => {
                    tracing::debug!(datastore = datastore_name, field = %name, %raw_type,
                        "skipping field with unsupported type");
                }
            }
        }
    }
    Datastore::new(datastore_name, fields)
}

pub(crate) fn record_from_index(index: &Index) -> Result<Value> {
    serde_json::to_value(index).map_err(|err| RetrievalError::Backend(err.to_string()))
}

pub(crate) fn index_from_record(record: &Value) -> Result<Index> {
    serde_json::from_value(record.clone())
        .map_err(|err| RetrievalError::Backend(format!("malformed index record: {}", err)))
}

/// Strips the identity field from a document, returning the native key and
/// the remaining payload.
pub(crate) fn source_from_document(document: &Document) -> Result<(String, Value)> {
    let id = document.id().ok_or_else(|| {
        RetrievalError::Invalid("document is missing the identity field".to_string())
    })?;
    let mut source = serde_json::Map::new();
    for (field, value) in document.fields() {
        if field != ID_FIELD {
            source.insert(field.clone(), value.clone());
        }
    }
    Ok((id, Value::Object(source)))
}

/// Re-injects the native key as the identity field of a read document.
pub(crate) fn document_from_source(source: &Value, document_id: &str) -> Document {
    let document: Document = match source.as_object() {
        Some(fields) => fields
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect(),
        None => Document::new(),
    };
    document.with_id(document_id)
}

/// Builds the ndjson body for a bulk upsert, dropping documents that do not
/// match the datastore schema. Returns the body and the number of locally
/// rejected documents.
pub(crate) fn bulk_body(
    datastore: &Datastore,
    collection: &str,
    documents: &[Document],
) -> (String, usize) {
    let mut body = String::new();
    let mut rejected = 0;
    for document in documents {
        if !datastore.is_valid_document(document) {
            rejected += 1;
            continue;
        }
        let Ok((id, source)) = source_from_document(document) else {
            rejected += 1;
            continue;
        };
        body.push_str(&json!({ "index": { "_index": collection, "_id": id } }).to_string());
        body.push('\n');
        body.push_str(&source.to_string());
        body.push('\n');
    }
    (body, rejected)
}

/// Aggregates per-item outcomes of a bulk response into `(successes, errors)`.
pub(crate) fn bulk_counts(response: &Value, rejected: usize) -> (usize, usize) {
    let mut successes = 0;
    let mut errors = rejected;
    if let Some(items) = response["items"].as_array() {
        for item in items {
            let status = item["index"]["status"].as_u64().unwrap_or(500);
            if (200..300).contains(&status) {
                successes += 1;
            } else {
                errors += 1;
            }
        }
    }
    (successes, errors)
}
