//! Cluster connection boundary
//!
//! The schema builder never talks to a cluster itself. It selects an index
//! through [`Connection::select_index`], which only resolves the logical
//! name, and passes the resolved name to every operation explicitly. A
//! connection therefore carries no "current index" and can be shared between
//! callers when the implementation allows it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blueprint::IndexBlueprint;
use crate::error::Result;

/// Index metadata as reported by the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub index: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(
        default,
        rename = "docs.count",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_count"
    )]
    pub docs_count: Option<u64>,
    #[serde(default, rename = "store.size", skip_serializing_if = "Option::is_none")]
    pub store_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl IndexInfo {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            health: None,
            status: None,
            uuid: None,
            docs_count: None,
            store_size: None,
            created_at: None,
        }
    }

    /// System indexes start with a dot
    pub fn is_system(&self) -> bool {
        self.index.starts_with('.')
    }
}

// `_cat/indices` reports counts as strings
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid document count {n}"))),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid document count '{s}'"))),
        Some(other) => Err(D::Error::custom(format!("invalid document count {other}"))),
    }
}

/// Apply an index naming prefix
///
/// Names that already carry the prefix are left alone so resolving twice is
/// harmless.
pub fn resolve_index_name(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => {
            let prefixed = format!("{prefix}_");
            if name.starts_with(&prefixed) {
                name.to_string()
            } else {
                format!("{prefixed}{name}")
            }
        }
        _ => name.to_string(),
    }
}

/// Cluster operations required by the schema builder
///
/// All operations except [`select_index`](Connection::select_index) and the
/// prefix accessors take the resolved index name.
pub trait Connection {
    /// Set or clear the naming prefix applied by `select_index`
    fn set_index_prefix(&mut self, prefix: Option<String>);

    fn index_prefix(&self) -> Option<&str>;

    /// Resolve a logical index name to the cluster index name
    fn select_index(&self, name: &str) -> String {
        resolve_index_name(self.index_prefix(), name)
    }

    fn index_exists(&self, index: &str) -> Result<bool>;

    /// List indexes, optionally limited to one target
    fn indices(&self, target: Option<&str>, include_system: bool) -> Result<Vec<IndexInfo>>;

    fn index_settings(&self, index: &str) -> Result<Value>;

    /// Get-mapping response: `{index: {mappings: {properties: ...}}}`
    fn index_mappings(&self, index: &str) -> Result<Value>;

    /// Mapping of specific fields; `raw` keeps the engine's response shape
    fn field_mapping(&self, index: &str, fields: &[&str], raw: bool) -> Result<Value>;

    fn index_create(&self, index: &str, blueprint: &IndexBlueprint) -> Result<()>;

    fn index_modify(&self, index: &str, blueprint: &IndexBlueprint) -> Result<()>;

    /// Apply a serialized `{"analysis": [...]}` payload
    fn index_analyzer_settings(&self, index: &str, payload: &Value) -> Result<()>;

    fn index_delete(&self, index: &str) -> Result<bool>;

    /// Copy all documents from one index into another
    fn reindex(&self, from: &str, to: &str) -> Result<Value>;

    /// Arbitrary index-admin operation
    fn indices_dsl(&self, method: &str, params: Value) -> Result<Value>;
}
