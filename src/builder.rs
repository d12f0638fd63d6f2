//! Schema Builder
//!
//! Façade over a [`Connection`] for index lifecycle and introspection.
//! Holds no index metadata: every call goes back to the connection.

use serde_json::Value;
use tracing::{debug, info};

use crate::analyzer::AnalyzerBlueprint;
use crate::blueprint::IndexBlueprint;
use crate::config::ConnectionConfig;
use crate::connection::{Connection, IndexInfo};
use crate::error::Result;
use crate::mapping;

/// Index lifecycle operations against one connection
pub struct SchemaBuilder<C> {
    connection: C,
    include_system_indices: bool,
}

impl<C: Connection> SchemaBuilder<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            include_system_indices: false,
        }
    }

    /// Build with the connection section of a [`SchemaConfig`](crate::SchemaConfig)
    pub fn with_config(connection: C, config: &ConnectionConfig) -> Self {
        let mut builder = Self::new(connection);
        builder.include_system_indices = config.include_system_indices;
        if config.index_prefix.is_some() {
            builder.override_prefix(config.index_prefix.clone());
        }
        builder
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn into_inner(self) -> C {
        self.connection
    }

    // ------------------------------------------------------------------
    // Index metadata
    // ------------------------------------------------------------------

    /// Change the naming prefix applied to every index
    pub fn override_prefix(&mut self, prefix: Option<String>) -> &mut Self {
        self.connection.set_index_prefix(prefix);
        self
    }

    pub fn get_settings(&self, index: &str) -> Result<Value> {
        let index = self.connection.select_index(index);
        self.connection.index_settings(&index)
    }

    /// Metadata of an index, `None` when it does not exist
    pub fn get_index(&self, index: &str) -> Result<Option<IndexInfo>> {
        if !self.has_index(index)? {
            return Ok(None);
        }

        let resolved = self.connection.select_index(index);
        let mut indices = self
            .connection
            .indices(Some(&resolved), self.include_system_indices)?;
        let position = indices.iter().position(|info| info.index == resolved).unwrap_or(0);
        Ok(if indices.is_empty() {
            None
        } else {
            Some(indices.swap_remove(position))
        })
    }

    pub fn has_index(&self, index: &str) -> Result<bool> {
        let index = self.connection.select_index(index);
        self.connection.index_exists(&index)
    }

    pub fn get_indices(&self) -> Result<Vec<IndexInfo>> {
        self.connection.indices(None, self.include_system_indices)
    }

    // ------------------------------------------------------------------
    // Create / modify / delete
    // ------------------------------------------------------------------

    /// Create an index from a populated blueprint
    pub fn create<F>(&self, index: &str, populate: F) -> Result<Option<IndexInfo>>
    where
        F: FnOnce(&mut IndexBlueprint),
    {
        let resolved = self.connection.select_index(index);
        let blueprint = Self::populated(&resolved, populate);
        info!(index = %resolved, fields = blueprint.fields().len(), "Creating index");
        self.connection.index_create(&resolved, &blueprint)?;

        self.get_index(index)
    }

    /// Create an index unless it already exists
    ///
    /// An existing index is returned as is; `populate` is not called.
    pub fn create_if_not_exists<F>(&self, index: &str, populate: F) -> Result<Option<IndexInfo>>
    where
        F: FnOnce(&mut IndexBlueprint),
    {
        if self.has_index(index)? {
            debug!(index, "Index exists, skipping create");
            return self.get_index(index);
        }
        self.create(index, populate)
    }

    /// Update mappings or settings of an existing index
    pub fn modify<F>(&self, index: &str, populate: F) -> Result<Option<IndexInfo>>
    where
        F: FnOnce(&mut IndexBlueprint),
    {
        let resolved = self.connection.select_index(index);
        let blueprint = Self::populated(&resolved, populate);
        info!(index = %resolved, "Modifying index");
        self.connection.index_modify(&resolved, &blueprint)?;

        self.get_index(index)
    }

    fn populated<F>(index: &str, populate: F) -> IndexBlueprint
    where
        F: FnOnce(&mut IndexBlueprint),
    {
        let mut blueprint = IndexBlueprint::new(index);
        populate(&mut blueprint);
        blueprint
    }

    pub fn delete(&self, index: &str) -> Result<bool> {
        let index = self.connection.select_index(index);
        info!(index = %index, "Deleting index");
        self.connection.index_delete(&index)
    }

    /// Delete an index when present; `false` without a delete call otherwise
    pub fn delete_if_exists(&self, index: &str) -> Result<bool> {
        if !self.has_index(index)? {
            debug!(index, "Index absent, nothing to delete");
            return Ok(false);
        }
        self.delete(index)
    }

    /// Copy all documents from one index into another
    pub fn reindex(&self, from: &str, to: &str) -> Result<Value> {
        let from = self.connection.select_index(from);
        let to = self.connection.select_index(to);
        info!(from = %from, to = %to, "Reindexing");
        self.connection.reindex(&from, &to)
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    /// Declare analysis components for an index
    pub fn set_analyzer<F>(&self, index: &str, populate: F) -> Result<Option<IndexInfo>>
    where
        F: FnOnce(&mut AnalyzerBlueprint),
    {
        let mut blueprint = AnalyzerBlueprint::new(index);
        populate(&mut blueprint);
        blueprint.build(&self.connection)?;

        self.get_index(index)
    }

    // ------------------------------------------------------------------
    // Mappings
    // ------------------------------------------------------------------

    pub fn get_mappings(&self, index: &str) -> Result<Value> {
        let index = self.connection.select_index(index);
        self.connection.index_mappings(&index)
    }

    pub fn get_field_mapping(&self, index: &str, fields: &[&str], raw: bool) -> Result<Value> {
        let index = self.connection.select_index(index);
        self.connection.field_mapping(&index, fields, raw)
    }

    /// Logical field names of an index
    ///
    /// Unlike [`has_field`](Self::has_field) this keeps the failure:
    /// connection errors and malformed mappings are reported separately.
    pub fn field_names(&self, index: &str) -> Result<Vec<String>> {
        let index = self.connection.select_index(index);
        let response = self.connection.index_mappings(&index)?;
        mapping::field_names(&response, &index)
    }

    /// Whether `field` exists in the mapping; `false` on any failure
    pub fn has_field(&self, index: &str, field: &str) -> bool {
        self.has_fields(index, &[field])
    }

    /// Whether every one of `fields` exists; `false` on any failure
    pub fn has_fields(&self, index: &str, fields: &[&str]) -> bool {
        match self.field_names(index) {
            Ok(names) => fields.iter().all(|field| names.iter().any(|name| name == field)),
            Err(err) => {
                debug!(index, error = %err, "Field lookup failed, reporting absent");
                false
            }
        }
    }

    /// Flatten a nested mapping tree into dotted paths
    pub fn flatten(&self, tree: &Value) -> Vec<(String, Value)> {
        mapping::flatten_fields(tree)
    }

    // ------------------------------------------------------------------
    // Escape hatch
    // ------------------------------------------------------------------

    /// Run an arbitrary index-admin operation
    pub fn dsl(&self, method: &str, params: Value) -> Result<Value> {
        self.connection.indices_dsl(method, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, MemoryConnection};
    use serde_json::json;

    fn builder() -> SchemaBuilder<MemoryConnection> {
        SchemaBuilder::new(MemoryConnection::new())
    }

    #[test]
    fn test_get_index_absent_is_none() {
        let schema = builder();
        assert!(schema.get_index("missing").unwrap().is_none());
        assert!(!schema.has_index("missing").unwrap());
    }

    #[test]
    fn test_create_returns_index_info() {
        let schema = builder();
        let info = schema
            .create("posts", |index| {
                index.text("title");
            })
            .unwrap()
            .unwrap();
        assert_eq!(info.index, "posts");
        assert_eq!(schema.connection().count("index_create"), 1);
    }

    #[test]
    fn test_create_propagates_rejection() {
        let schema = builder();
        let err = schema.create("Bad Name", |_| {}).unwrap_err();
        assert!(matches!(err, crate::SchemaError::InvalidIndexName { .. }));
    }

    #[test]
    fn test_prefix_applies_to_every_operation() {
        let mut schema = builder();
        schema.override_prefix(Some("dev".into()));
        schema.create("posts", |index| {
            index.keyword("slug");
        })
        .unwrap();

        assert_eq!(schema.connection().index_names(), vec!["dev_posts"]);
        assert!(schema.has_field("posts", "slug"));
        assert!(schema.delete("posts").unwrap());
    }

    #[test]
    fn test_select_precedes_every_targeted_call() {
        let schema = SchemaBuilder::new(MemoryConnection::new().with_index("posts", json!({})));
        schema.get_settings("posts").unwrap();
        schema.get_mappings("posts").unwrap();
        schema.get_field_mapping("posts", &["title"], false).unwrap();

        let calls = schema.connection().calls();
        for pair in calls.chunks(2) {
            assert_eq!(pair[0], Call::SelectIndex("posts".into()));
        }
        assert_eq!(calls.len(), 6);
    }

    #[test]
    fn test_has_fields_empty_request() {
        let connection = MemoryConnection::new()
            .with_index("posts", json!({"title": {"type": "text"}}))
            .with_index("fresh", json!({}))
            .with_raw_mappings("bare", json!({"bare": {"mappings": {"properties": {}}}}));
        let schema = SchemaBuilder::new(connection);

        assert!(schema.has_fields("posts", &[]));
        assert!(schema.has_fields("bare", &[]));
        assert!(!schema.has_fields("missing", &[]));

        // {"fresh": {"mappings": {}}} carries no properties tree
        assert!(!schema.has_fields("fresh", &[]));
        assert!(schema.field_names("fresh").unwrap_err().is_malformed());
    }

    #[test]
    fn test_field_names_keeps_failure_kind() {
        let connection = MemoryConnection::new()
            .with_raw_mappings("broken", json!({"broken": {"settings": {}}}))
            .with_index("posts", json!({}));
        let schema = SchemaBuilder::new(connection);

        assert!(schema.field_names("broken").unwrap_err().is_malformed());
        assert!(schema.field_names("missing").unwrap_err().is_not_found());

        schema.connection().fail_on("index_mappings");
        let err = schema.field_names("posts").unwrap_err();
        assert!(matches!(err, crate::SchemaError::Connection { .. }));
    }

    #[test]
    fn test_with_config_applies_connection_section() {
        let config = ConnectionConfig {
            index_prefix: Some("qa".into()),
            include_system_indices: true,
        };
        let connection = MemoryConnection::new().with_index(".tasks", json!({}));
        let schema = SchemaBuilder::with_config(connection, &config);

        assert_eq!(schema.connection().index_prefix(), Some("qa"));
        assert_eq!(schema.get_indices().unwrap().len(), 1);
    }
}
