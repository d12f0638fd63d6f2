//! In-memory connection
//!
//! Models indexes, settings and mappings the way an Elasticsearch cluster
//! reports them, without any transport. Every call is recorded so callers can
//! see exactly what a schema change would send to a real cluster.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, OnceLock};

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::blueprint::IndexBlueprint;
use crate::connection::{Connection, IndexInfo};
use crate::error::{Result, SchemaError};
use crate::mapping::STRUCTURAL_MARKER;

/// A call received by a [`MemoryConnection`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SelectIndex(String),
    IndexExists(String),
    Indices { target: Option<String>, include_system: bool },
    IndexSettings(String),
    IndexMappings(String),
    FieldMapping { index: String, fields: Vec<String>, raw: bool },
    IndexCreate { index: String, body: Value },
    IndexModify { index: String, body: Value },
    IndexAnalyzerSettings { index: String, payload: Value },
    IndexDelete(String),
    Reindex { from: String, to: String },
    IndicesDsl { method: String, params: Value },
}

impl Call {
    /// Operation name, as used by [`MemoryConnection::fail_on`]
    pub fn operation(&self) -> &'static str {
        match self {
            Call::SelectIndex(_) => "select_index",
            Call::IndexExists(_) => "index_exists",
            Call::Indices { .. } => "indices",
            Call::IndexSettings(_) => "index_settings",
            Call::IndexMappings(_) => "index_mappings",
            Call::FieldMapping { .. } => "field_mapping",
            Call::IndexCreate { .. } => "index_create",
            Call::IndexModify { .. } => "index_modify",
            Call::IndexAnalyzerSettings { .. } => "index_analyzer_settings",
            Call::IndexDelete(_) => "index_delete",
            Call::Reindex { .. } => "reindex",
            Call::IndicesDsl { .. } => "indices_dsl",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredIndex {
    info: IndexInfo,
    settings: Map<String, Value>,
    properties: Map<String, Value>,
    raw_mappings: Option<Value>,
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, StoredIndex>,
    calls: Vec<Call>,
    failures: HashSet<String>,
    next_id: u64,
}

/// Check an index name against the engine's naming rules
pub fn validate_index_name(name: &str) -> Result<()> {
    static FORBIDDEN: OnceLock<Regex> = OnceLock::new();
    let forbidden = FORBIDDEN.get_or_init(|| {
        Regex::new(r#"[\\/*?"<>|,#:\s]"#).expect("index name pattern is valid")
    });

    let reason = if name.is_empty() {
        Some("must not be empty".to_string())
    } else if name == "." || name == ".." {
        Some("must not be '.' or '..'".to_string())
    } else if name.starts_with(['-', '_', '+']) {
        Some("must not start with '-', '_' or '+'".to_string())
    } else if name.len() > 255 {
        Some("must not be longer than 255 bytes".to_string())
    } else if name.chars().any(|c| c.is_uppercase()) {
        Some("must be lowercase".to_string())
    } else {
        forbidden
            .find(name)
            .map(|m| format!("must not contain '{}'", m.as_str()))
    };

    match reason {
        Some(reason) => Err(SchemaError::InvalidIndexName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Connection backed by process memory
#[derive(Debug, Default)]
pub struct MemoryConnection {
    prefix: Option<String>,
    state: Mutex<State>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an index with a `properties` tree, without recording a call
    pub fn with_index(self, index: &str, properties: Value) -> Self {
        {
            let mut state = self.lock();
            let properties = properties.as_object().cloned().unwrap_or_default();
            state.insert(index, Map::new(), properties);
        }
        self
    }

    /// Seed an index whose get-mapping response is returned verbatim
    pub fn with_raw_mappings(self, index: &str, response: Value) -> Self {
        {
            let mut state = self.lock();
            state.insert(index, Map::new(), Map::new());
            if let Some(stored) = state.indices.get_mut(index) {
                stored.raw_mappings = Some(response);
            }
        }
        self
    }

    /// Make every later call of `operation` fail with a connection error
    pub fn fail_on(&self, operation: &str) {
        self.lock().failures.insert(operation.to_string());
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded calls of one operation
    pub fn count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.lock().indices.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a call and lock the state for serving it
    fn serve(&self, call: Call) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        let operation = call.operation();
        state.calls.push(call);
        if state.failures.contains(operation) {
            return Err(SchemaError::connection(operation, "injected failure"));
        }
        Ok(state)
    }
}

impl State {
    fn insert(&mut self, index: &str, settings: Map<String, Value>, properties: Map<String, Value>) {
        self.next_id += 1;
        let mut info = IndexInfo::new(index);
        info.health = Some("green".to_string());
        info.status = Some("open".to_string());
        info.uuid = Some(format!("mem-{:08}", self.next_id));
        info.docs_count = Some(0);
        info.created_at = Some(Utc::now());

        self.indices.insert(
            index.to_string(),
            StoredIndex {
                info,
                settings,
                properties,
                raw_mappings: None,
            },
        );
    }

    fn get(&self, index: &str) -> Result<&StoredIndex> {
        self.indices.get(index).ok_or_else(|| SchemaError::IndexNotFound {
            index: index.to_string(),
        })
    }

    fn get_mut(&mut self, index: &str) -> Result<&mut StoredIndex> {
        self.indices.get_mut(index).ok_or_else(|| SchemaError::IndexNotFound {
            index: index.to_string(),
        })
    }

    fn list(&self, target: Option<&str>, include_system: bool) -> Vec<IndexInfo> {
        self.indices
            .values()
            .map(|stored| &stored.info)
            .filter(|info| include_system || !info.is_system())
            .filter(|info| match target {
                Some(pattern) => matches_pattern(pattern, &info.index),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn settings(&self, index: &str) -> Result<Value> {
        let stored = self.get(index)?;
        let mut settings = stored.settings.clone();
        settings.insert("provided_name".to_string(), Value::from(index));
        if let Some(uuid) = &stored.info.uuid {
            settings.insert("uuid".to_string(), Value::from(uuid.as_str()));
        }
        Ok(json!({ index: { "settings": { "index": settings } } }))
    }

    fn mappings(&self, index: &str) -> Result<Value> {
        let stored = self.get(index)?;
        if let Some(raw) = &stored.raw_mappings {
            return Ok(raw.clone());
        }
        let mappings = if stored.properties.is_empty() {
            json!({})
        } else {
            json!({ STRUCTURAL_MARKER: stored.properties })
        };
        Ok(json!({ index: { "mappings": mappings } }))
    }

    fn delete(&mut self, index: &str) -> Result<bool> {
        self.get(index)?;
        self.indices.remove(index);
        Ok(true)
    }
}

fn matches_pattern(pattern: &str, index: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => index.starts_with(prefix),
        None => pattern == index,
    }
}

/// Merge incoming field mappings into existing ones
///
/// New fields are added, `properties` and `fields` are merged recursively and
/// other parameters are replaced. A field may not change its type.
fn merge_properties(existing: &mut Map<String, Value>, incoming: &Map<String, Value>, path: &str) -> Result<()> {
    for (name, mapping) in incoming {
        let full_name = if path.is_empty() {
            name.clone()
        } else {
            format!("{path}.{name}")
        };

        let Some(current) = existing.get_mut(name).and_then(Value::as_object_mut) else {
            existing.insert(name.clone(), mapping.clone());
            continue;
        };
        let Some(incoming_def) = mapping.as_object() else {
            continue;
        };

        let old_type = current.get("type").and_then(Value::as_str);
        let new_type = incoming_def.get("type").and_then(Value::as_str);
        if let (Some(old_type), Some(new_type)) = (old_type, new_type) {
            if old_type != new_type {
                return Err(SchemaError::connection(
                    "index_modify",
                    format!("mapper [{full_name}] cannot be changed from type [{old_type}] to [{new_type}]"),
                ));
            }
        }

        for (key, value) in incoming_def {
            if key == STRUCTURAL_MARKER || key == "fields" {
                if let (Some(Value::Object(children)), Some(incoming_children)) =
                    (current.get_mut(key), value.as_object())
                {
                    merge_properties(children, incoming_children, &full_name)?;
                    continue;
                }
            }
            current.insert(key.clone(), value.clone());
        }
    }
    Ok(())
}

/// Group a `{"analysis": [...]}` payload into the engine's settings shape:
/// `{analyzer: {name: {...}}, tokenizer: {...}, ...}`
fn group_analysis(payload: &Value) -> Result<Map<String, Value>> {
    let definitions = payload
        .get("analysis")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::connection("index_analyzer_settings", "payload has no analysis list"))?;

    let mut grouped = Map::new();
    for definition in definitions {
        let entry = definition.as_object();
        let kind = entry.and_then(|e| e.get("config")).and_then(Value::as_str);
        let name = entry.and_then(|e| e.get("name")).and_then(Value::as_str);
        let (Some(entry), Some(kind), Some(name)) = (entry, kind, name) else {
            return Err(SchemaError::connection(
                "index_analyzer_settings",
                format!("analysis entry without config or name: {definition}"),
            ));
        };

        let params: Map<String, Value> = entry
            .iter()
            .filter(|(key, _)| key.as_str() != "config" && key.as_str() != "name")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let group = grouped
            .entry(kind)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(group) = group {
            group.insert(name.to_string(), Value::Object(params));
        }
    }
    Ok(grouped)
}

/// Resolve a dotted field name through `properties` and `fields` levels
fn lookup_field<'a>(properties: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let mut definition = properties.get(segments.next()?)?;

    for segment in segments {
        definition = [STRUCTURAL_MARKER, "fields"]
            .iter()
            .filter_map(|level| definition.get(*level))
            .find_map(|children| children.get(segment))?;
    }
    Some(definition)
}

impl Connection for MemoryConnection {
    fn set_index_prefix(&mut self, prefix: Option<String>) {
        debug!(prefix = ?prefix, "Index prefix set");
        self.prefix = prefix.filter(|p| !p.is_empty());
    }

    fn index_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn select_index(&self, name: &str) -> String {
        let resolved = crate::connection::resolve_index_name(self.index_prefix(), name);
        self.lock().calls.push(Call::SelectIndex(resolved.clone()));
        resolved
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        let state = self.serve(Call::IndexExists(index.to_string()))?;
        Ok(state.indices.contains_key(index))
    }

    fn indices(&self, target: Option<&str>, include_system: bool) -> Result<Vec<IndexInfo>> {
        let state = self.serve(Call::Indices {
            target: target.map(String::from),
            include_system,
        })?;
        Ok(state.list(target, include_system))
    }

    fn index_settings(&self, index: &str) -> Result<Value> {
        let state = self.serve(Call::IndexSettings(index.to_string()))?;
        state.settings(index)
    }

    fn index_mappings(&self, index: &str) -> Result<Value> {
        let state = self.serve(Call::IndexMappings(index.to_string()))?;
        state.mappings(index)
    }

    fn field_mapping(&self, index: &str, fields: &[&str], raw: bool) -> Result<Value> {
        let state = self.serve(Call::FieldMapping {
            index: index.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            raw,
        })?;
        let stored = state.get(index)?;

        let mut found = Map::new();
        for &field in fields {
            let Some(definition) = lookup_field(&stored.properties, field) else {
                continue;
            };
            let leaf = field.rsplit('.').next().unwrap_or(field);
            let entry = if raw {
                json!({ "full_name": field, "mapping": { leaf: definition } })
            } else {
                definition.clone()
            };
            found.insert(field.to_string(), entry);
        }

        if raw {
            Ok(json!({ index: { "mappings": found } }))
        } else {
            Ok(Value::Object(found))
        }
    }

    fn index_create(&self, index: &str, blueprint: &IndexBlueprint) -> Result<()> {
        let mut state = self.serve(Call::IndexCreate {
            index: index.to_string(),
            body: blueprint.to_body(),
        })?;
        validate_index_name(index)?;
        if state.indices.contains_key(index) {
            return Err(SchemaError::IndexAlreadyExists {
                index: index.to_string(),
            });
        }

        let properties = blueprint.to_mapping().as_object().cloned().unwrap_or_default();
        state.insert(index, blueprint.settings().clone(), properties);
        info!(index, fields = blueprint.fields().len(), "Index created");
        Ok(())
    }

    fn index_modify(&self, index: &str, blueprint: &IndexBlueprint) -> Result<()> {
        let mut state = self.serve(Call::IndexModify {
            index: index.to_string(),
            body: blueprint.to_body(),
        })?;
        let stored = state.get_mut(index)?;

        let incoming = blueprint.to_mapping().as_object().cloned().unwrap_or_default();
        let mut merged = stored.properties.clone();
        merge_properties(&mut merged, &incoming, "")?;
        stored.properties = merged;
        for (key, value) in blueprint.settings() {
            stored.settings.insert(key.clone(), value.clone());
        }
        info!(index, "Index modified");
        Ok(())
    }

    fn index_analyzer_settings(&self, index: &str, payload: &Value) -> Result<()> {
        let mut state = self.serve(Call::IndexAnalyzerSettings {
            index: index.to_string(),
            payload: payload.clone(),
        })?;
        let stored = state.get_mut(index)?;
        let grouped = group_analysis(payload)?;

        let analysis = stored
            .settings
            .entry("analysis")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(analysis) = analysis {
            for (kind, components) in grouped {
                let slot = analysis.entry(kind).or_insert_with(|| Value::Object(Map::new()));
                if let (Value::Object(slot), Value::Object(components)) = (slot, components) {
                    slot.extend(components);
                }
            }
        }
        info!(index, "Analysis settings applied");
        Ok(())
    }

    fn index_delete(&self, index: &str) -> Result<bool> {
        let mut state = self.serve(Call::IndexDelete(index.to_string()))?;
        let deleted = state.delete(index)?;
        info!(index, "Index deleted");
        Ok(deleted)
    }

    fn reindex(&self, from: &str, to: &str) -> Result<Value> {
        let mut state = self.serve(Call::Reindex {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        let source = state.get(from)?.clone();
        if !state.indices.contains_key(to) {
            validate_index_name(to)?;
            state.insert(to, Map::new(), source.properties.clone());
        }

        let total = source.info.docs_count.unwrap_or(0);
        if let Some(dest) = state.indices.get_mut(to) {
            dest.info.docs_count = Some(dest.info.docs_count.unwrap_or(0) + total);
        }
        Ok(json!({ "total": total, "created": total, "updated": 0, "failures": [] }))
    }

    fn indices_dsl(&self, method: &str, params: Value) -> Result<Value> {
        let mut state = self.serve(Call::IndicesDsl {
            method: method.to_string(),
            params: params.clone(),
        })?;
        let index = params
            .get("index")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::UnsupportedOperation(format!("{method} requires an 'index' parameter")))?;

        match method {
            "exists" => Ok(Value::Bool(state.indices.contains_key(index))),
            "get_settings" => state.settings(index),
            "get_mapping" => state.mappings(index),
            "delete" => Ok(json!({ "acknowledged": state.delete(index)? })),
            "stats" => {
                let docs = state.get(index)?.info.docs_count.unwrap_or(0);
                Ok(json!({ "indices": { index: { "primaries": { "docs": { "count": docs } } } } }))
            }
            other => Err(SchemaError::UnsupportedOperation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_index_name() {
        assert!(validate_index_name("blog_posts").is_ok());
        assert!(validate_index_name("logs-2024.01").is_ok());
        for bad in ["", ".", "..", "_hidden", "-x", "+x", "Posts", "a b", "a/b", "a*", "a,b", "a#b"] {
            let err = validate_index_name(bad).unwrap_err();
            assert!(matches!(err, SchemaError::InvalidIndexName { .. }), "{bad} accepted");
        }
    }

    #[test]
    fn test_create_and_mappings() {
        let connection = MemoryConnection::new();
        let mut blueprint = IndexBlueprint::new("posts");
        blueprint.text("title");
        connection.index_create("posts", &blueprint).unwrap();

        let mappings = connection.index_mappings("posts").unwrap();
        assert_eq!(mappings["posts"]["mappings"]["properties"]["title"]["type"], "text");

        let err = connection.index_create("posts", &blueprint).unwrap_err();
        assert!(matches!(err, SchemaError::IndexAlreadyExists { .. }));
    }

    #[test]
    fn test_empty_mapping_shape() {
        let connection = MemoryConnection::new().with_index("empty", json!({}));
        let mappings = connection.index_mappings("empty").unwrap();
        assert_eq!(mappings, json!({"empty": {"mappings": {}}}));
    }

    #[test]
    fn test_modify_merges_and_rejects_type_change() {
        let connection = MemoryConnection::new().with_index(
            "posts",
            json!({"comments": {"type": "nested", "properties": {"author": {"type": "text"}}}}),
        );

        let mut blueprint = IndexBlueprint::new("posts");
        blueprint.nested("comments").with_properties(|c| {
            c.date("posted_at");
        });
        blueprint.integer("status");
        connection.index_modify("posts", &blueprint).unwrap();

        let mappings = connection.index_mappings("posts").unwrap();
        let props = &mappings["posts"]["mappings"]["properties"];
        assert_eq!(props["comments"]["properties"]["author"]["type"], "text");
        assert_eq!(props["comments"]["properties"]["posted_at"]["type"], "date");
        assert_eq!(props["status"]["type"], "integer");

        let mut conflicting = IndexBlueprint::new("posts");
        conflicting.keyword("slug");
        conflicting.keyword("status");
        let err = connection.index_modify("posts", &conflicting).unwrap_err();
        assert!(err.to_string().contains("cannot be changed from type [integer] to [keyword]"));

        // rejected as a whole
        let after = connection.index_mappings("posts").unwrap();
        assert_eq!(after, mappings);
        assert!(after["posts"]["mappings"]["properties"].get("slug").is_none());
    }

    #[test]
    fn test_analysis_grouped_into_settings() {
        let connection = MemoryConnection::new().with_index("posts", json!({}));
        let payload = json!({"analysis": [
            {"config": "tokenizer", "name": "my_tokenizer", "type": "pattern"},
            {"config": "analyzer", "name": "my_analyzer", "type": "custom", "tokenizer": "my_tokenizer"}
        ]});
        connection.index_analyzer_settings("posts", &payload).unwrap();

        let settings = connection.index_settings("posts").unwrap();
        let analysis = &settings["posts"]["settings"]["index"]["analysis"];
        assert_eq!(analysis["tokenizer"]["my_tokenizer"]["type"], "pattern");
        assert_eq!(analysis["analyzer"]["my_analyzer"]["tokenizer"], "my_tokenizer");

        let err = connection
            .index_analyzer_settings("posts", &json!({"analysis": [{"name": "x"}]}))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Connection { .. }));
    }

    #[test]
    fn test_field_mapping_shapes() {
        let connection = MemoryConnection::new().with_index(
            "posts",
            json!({
                "title": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
                "comments": {"type": "nested", "properties": {"author": {"type": "text"}}}
            }),
        );

        let raw = connection
            .field_mapping("posts", &["comments.author", "missing"], true)
            .unwrap();
        assert_eq!(
            raw,
            json!({"posts": {"mappings": {"comments.author": {
                "full_name": "comments.author",
                "mapping": {"author": {"type": "text"}}
            }}}})
        );

        let plain = connection.field_mapping("posts", &["title.keyword"], false).unwrap();
        assert_eq!(plain, json!({"title.keyword": {"type": "keyword"}}));
    }

    #[test]
    fn test_indices_listing() {
        let connection = MemoryConnection::new()
            .with_index("posts", json!({}))
            .with_index("posts_archive", json!({}))
            .with_index(".tasks", json!({}));

        let names = |infos: Vec<IndexInfo>| infos.into_iter().map(|i| i.index).collect::<Vec<_>>();
        assert_eq!(names(connection.indices(None, false).unwrap()), vec!["posts", "posts_archive"]);
        assert_eq!(names(connection.indices(None, true).unwrap()).len(), 3);
        assert_eq!(names(connection.indices(Some("posts"), false).unwrap()), vec!["posts"]);
        assert_eq!(names(connection.indices(Some("posts*"), false).unwrap()).len(), 2);
    }

    #[test]
    fn test_reindex_creates_destination() {
        let connection = MemoryConnection::new().with_index("old", json!({"a": {"type": "text"}}));
        let result = connection.reindex("old", "new").unwrap();
        assert_eq!(result["failures"], json!([]));

        let mappings = connection.index_mappings("new").unwrap();
        assert_eq!(mappings["new"]["mappings"]["properties"]["a"]["type"], "text");
        assert!(connection.reindex("absent", "other").unwrap_err().is_not_found());
    }

    #[test]
    fn test_indices_dsl() {
        let connection = MemoryConnection::new().with_index("posts", json!({}));
        assert_eq!(connection.indices_dsl("exists", json!({"index": "posts"})).unwrap(), json!(true));
        assert_eq!(
            connection.indices_dsl("delete", json!({"index": "posts"})).unwrap(),
            json!({"acknowledged": true})
        );
        assert_eq!(connection.indices_dsl("exists", json!({"index": "posts"})).unwrap(), json!(false));

        let err = connection.indices_dsl("shrink", json!({"index": "posts"})).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_injected_failure_is_recorded() {
        let connection = MemoryConnection::new().with_index("posts", json!({}));
        connection.fail_on("index_mappings");

        let err = connection.index_mappings("posts").unwrap_err();
        assert!(matches!(err, SchemaError::Connection { .. }));
        assert_eq!(connection.count("index_mappings"), 1);
    }
}
