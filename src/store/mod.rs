use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppError;

#[cfg(test)]
pub mod memory;
pub mod sqlite;

pub type Document = Map<String, Value>;

/// Field predicate understood by every store backend.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Lt(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::Lt(field.to_string(), value.into())
    }

    pub fn is_in(field: &str, values: &[&str]) -> Self {
        Self::In(
            field.to_string(),
            values.iter().map(|value| Value::from(*value)).collect(),
        )
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq(field, expected) => doc.get(field) == Some(expected),
            Self::Lt(field, bound) => doc
                .get(field)
                .and_then(|value| compare_values(value, bound))
                .map(|ordering| ordering == Ordering::Less)
                .unwrap_or(false),
            Self::In(field, allowed) => doc
                .get(field)
                .map(|value| allowed.contains(value))
                .unwrap_or(false),
        }
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldChange {
    Set(Value),
    Increment(i64),
}

/// Partial update applied to an existing record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    changes: Vec<(String, FieldChange)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.changes
            .push((field.to_string(), FieldChange::Set(value.into())));
        self
    }

    pub fn increment(mut self, field: &str, by: i64) -> Self {
        self.changes
            .push((field.to_string(), FieldChange::Increment(by)));
        self
    }

    pub fn apply(&self, doc: &mut Document) {
        for (field, change) in &self.changes {
            match change {
                FieldChange::Set(value) => {
                    doc.insert(field.clone(), value.clone());
                }
                FieldChange::Increment(by) => {
                    let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
                    doc.insert(field.clone(), Value::from(current + by));
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        record: Document,
        merge: bool,
    },
    Update {
        collection: String,
        id: String,
        patch: Patch,
    },
}

impl WriteOp {
    pub fn set(collection: &str, id: &str, record: Document, merge: bool) -> Self {
        Self::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            record,
            merge,
        }
    }

    pub fn update(collection: &str, id: &str, patch: Patch) -> Self {
        Self::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub data: Document,
}

/// Document database used as the system of record. Collections hold JSON
/// objects addressed by string ids.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    async fn set(
        &self,
        collection: &str,
        id: &str,
        record: Document,
        merge: bool,
    ) -> Result<(), AppError>;

    /// Fails with `NotFound` when the record does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<(), AppError>;

    /// Records matching every filter, ordered by id.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Snapshot>, AppError>;

    /// All-or-nothing commit.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), AppError>;

    fn generate_id(&self, collection: &str) -> String;
}

pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Merges nested objects key by key; any other value replaces the old one.
pub fn merge_into(target: &mut Document, incoming: Document) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_into(existing, nested),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

pub fn apply_set(existing: Option<Document>, record: Document, merge: bool) -> Document {
    match existing {
        Some(mut current) if merge => {
            merge_into(&mut current, record);
            current
        }
        _ => record,
    }
}

pub fn not_found(collection: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{collection}/{id}"))
}
