//! Document persistence seam.
//!
//! Every engine talks to a [`DocumentStore`]: schemaless JSON documents in
//! named collections, with a small fixed operation set. Single-document
//! mutations are atomic; nothing spans documents, and concurrent writers
//! follow last-write-wins per field.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Communities,
    SubGroups,
    Messages,
    Groups,
    Posts,
    Comments,
    Polls,
    Services,
    Settings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Communities => "communities",
            Collection::SubGroups => "subgroups",
            Collection::Messages => "messages",
            Collection::Groups => "groups",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
            Collection::Polls => "polls",
            Collection::Services => "services",
            Collection::Settings => "settings",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document predicate. Field names address top-level keys only.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gte(String, Value),
    /// Array field contains the value.
    Contains(String, Value),
    /// Array field does not contain the value (missing field matches).
    NotContains(String, Value),
    /// Field value is one of the listed values.
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn id(id: &str) -> Filter {
        Filter::Eq("id".into(), Value::String(id.into()))
    }

    pub fn field(name: &str, value: impl Into<Value>) -> Filter {
        Filter::Eq(name.into(), value.into())
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::Ne(field, value) => doc.get(field) != Some(value),
            Filter::Gte(field, value) => match doc.get(field) {
                Some(actual) => compare_values(actual, value) >= std::cmp::Ordering::Equal,
                None => false,
            },
            Filter::Contains(field, value) => doc
                .get(field)
                .and_then(Value::as_array)
                .map(|arr| arr.contains(value))
                .unwrap_or(false),
            Filter::NotContains(field, value) => !doc
                .get(field)
                .and_then(Value::as_array)
                .map(|arr| arr.contains(value))
                .unwrap_or(false),
            Filter::In(field, values) => doc
                .get(field)
                .map(|actual| values.contains(actual))
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Total order over JSON values for sorting and range filters. Numbers and
/// strings compare naturally; everything else falls back to type rank.
pub(crate) fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(field: &str) -> Sort {
        Sort { field: field.into(), descending: false }
    }

    pub fn desc(field: &str) -> Sort {
        Sort { field: field.into(), descending: true }
    }
}

/// The persistence contract. Mutations apply to every matching document
/// and return how many were touched.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: Collection, doc: Value) -> StoreResult<()>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Value>>;

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: Option<&Sort>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>>;

    /// Atomic per-document field writes.
    async fn set_fields(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Value,
    ) -> StoreResult<u64>;

    /// Add to an array field iff absent. Idempotent.
    async fn add_to_set(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64>;

    /// Remove every occurrence from an array field. Idempotent.
    async fn pull(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64>;

    /// Append to an array field unconditionally.
    async fn push(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64>;

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<bool>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;
}

pub fn to_doc<T: Serialize>(value: &T) -> StoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn from_doc<T: DeserializeOwned>(doc: Value) -> StoreResult<T> {
    Ok(serde_json::from_value(doc)?)
}
