//! Analyzer blueprints
//!
//! An [`AnalyzerBlueprint`] collects analysis components for one index in
//! declaration order. The engine resolves components by name, so a custom
//! analyzer may reference a tokenizer or filter declared before it; the
//! serialized `analysis` list keeps that order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;

/// Kind of analysis component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Analyzer,
    Tokenizer,
    CharFilter,
    Filter,
}

impl AnalyzerKind {
    /// Key used by the engine for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Analyzer => "analyzer",
            AnalyzerKind::Tokenizer => "tokenizer",
            AnalyzerKind::CharFilter => "char_filter",
            AnalyzerKind::Filter => "filter",
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named analysis component with engine-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    #[serde(rename = "config")]
    kind: AnalyzerKind,
    name: String,
    #[serde(flatten)]
    parameters: Map<String, Value>,
}

impl AnalyzerDefinition {
    pub fn new(kind: AnalyzerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parameters: Map::new(),
        }
    }

    pub fn kind(&self) -> AnalyzerKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.parameters
    }

    /// Set a parameter, keeping the position of an existing key
    pub fn param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Project into the engine payload shape: `{config, name, ...parameters}`
    ///
    /// Parameters named `config` or `name` never override the identity keys.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("config".to_string(), Value::from(self.kind.as_str()));
        payload.insert("name".to_string(), Value::from(self.name.as_str()));
        for (key, value) in &self.parameters {
            if key == "config" || key == "name" {
                continue;
            }
            payload.insert(key.clone(), value.clone());
        }
        Value::Object(payload)
    }
}

/// Ordered collection of analysis components for one index
#[derive(Debug, Clone)]
pub struct AnalyzerBlueprint {
    index: String,
    definitions: Vec<AnalyzerDefinition>,
}

impl AnalyzerBlueprint {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            definitions: Vec::new(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn definitions(&self) -> &[AnalyzerDefinition] {
        &self.definitions
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Declare a custom analyzer
    pub fn analyzer(&mut self, name: impl Into<String>) -> &mut AnalyzerDefinition {
        self.add(AnalyzerKind::Analyzer, name)
    }

    /// Declare a tokenizer
    pub fn tokenizer(&mut self, name: impl Into<String>) -> &mut AnalyzerDefinition {
        self.add(AnalyzerKind::Tokenizer, name)
    }

    /// Declare a character filter
    pub fn char_filter(&mut self, name: impl Into<String>) -> &mut AnalyzerDefinition {
        self.add(AnalyzerKind::CharFilter, name)
    }

    /// Declare a token filter
    pub fn filter(&mut self, name: impl Into<String>) -> &mut AnalyzerDefinition {
        self.add(AnalyzerKind::Filter, name)
    }

    /// Append an already built definition
    pub fn push(&mut self, definition: AnalyzerDefinition) -> &mut AnalyzerDefinition {
        self.definitions.push(definition);
        let last = self.definitions.len() - 1;
        &mut self.definitions[last]
    }

    fn add(&mut self, kind: AnalyzerKind, name: impl Into<String>) -> &mut AnalyzerDefinition {
        self.push(AnalyzerDefinition::new(kind, name))
    }

    /// Serialize into `{"analysis": [...]}` in declaration order
    pub fn to_payload(&self) -> Value {
        let analysis: Vec<Value> = self.definitions.iter().map(AnalyzerDefinition::to_payload).collect();
        json!({ "analysis": analysis })
    }

    /// Apply the blueprint to its index
    ///
    /// Selects the index once. Issues a single analyzer-settings call when at
    /// least one component was declared and returns whether it did so.
    pub fn build<C: Connection + ?Sized>(&self, connection: &C) -> Result<bool> {
        let index = connection.select_index(&self.index);
        if self.definitions.is_empty() {
            debug!(index = %index, "No analysis components declared, skipping");
            return Ok(false);
        }

        let payload = self.to_payload();
        debug!(index = %index, components = self.definitions.len(), "Applying analysis settings");
        connection.index_analyzer_settings(&index, &payload)?;
        Ok(true)
    }
}
