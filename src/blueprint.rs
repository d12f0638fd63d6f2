//! Index blueprints
//!
//! Structural description of an index handed to `create`/`modify` populate
//! closures. The schema builder never inspects it; connections project it
//! into a request body with [`IndexBlueprint::to_body`].

use serde_json::{json, Map, Value};

/// One field in an index mapping
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    name: String,
    field_type: String,
    parameters: Map<String, Value>,
    fields: Vec<FieldDefinition>,
    properties: Vec<FieldDefinition>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            parameters: Map::new(),
            fields: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    /// Multi-fields declared under this field
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Child fields of an object or nested field
    pub fn properties(&self) -> &[FieldDefinition] {
        &self.properties
    }

    pub fn param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn analyzer(&mut self, analyzer: impl Into<String>) -> &mut Self {
        self.param("analyzer", analyzer.into())
    }

    /// Declare child fields, for `object` and `nested` fields
    pub fn with_properties(&mut self, populate: impl FnOnce(&mut IndexBlueprint)) -> &mut Self {
        let mut children = IndexBlueprint::new(self.name.clone());
        populate(&mut children);
        self.properties.extend(children.fields);
        self
    }

    /// Mapping definition of this field, without its name
    pub fn to_mapping(&self) -> Value {
        let mut mapping = Map::new();
        mapping.insert("type".to_string(), Value::from(self.field_type.as_str()));
        for (key, value) in &self.parameters {
            mapping.insert(key.clone(), value.clone());
        }
        if !self.fields.is_empty() {
            mapping.insert("fields".to_string(), properties_map(&self.fields));
        }
        if !self.properties.is_empty() {
            mapping.insert("properties".to_string(), properties_map(&self.properties));
        }
        Value::Object(mapping)
    }
}

fn properties_map(fields: &[FieldDefinition]) -> Value {
    let mut map = Map::new();
    for field in fields {
        map.insert(field.name.clone(), field.to_mapping());
    }
    Value::Object(map)
}

/// Structural blueprint for creating or modifying an index
#[derive(Debug, Clone, Default)]
pub struct IndexBlueprint {
    index: String,
    fields: Vec<FieldDefinition>,
    settings: Map<String, Value>,
}

impl IndexBlueprint {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            fields: Vec::new(),
            settings: Map::new(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.settings.is_empty()
    }

    /// Declare a field of any type
    ///
    /// Declaring a name twice adds the second declaration as a multi-field
    /// of the first, keyed by its type.
    pub fn field(&mut self, name: impl Into<String>, field_type: impl Into<String>) -> &mut FieldDefinition {
        let name = name.into();
        let field_type = field_type.into();

        match self.fields.iter().position(|f| f.name == name) {
            Some(pos) => {
                let parent = &mut self.fields[pos];
                parent.fields.push(FieldDefinition::new(field_type.clone(), field_type));
                let last = parent.fields.len() - 1;
                &mut parent.fields[last]
            }
            None => {
                self.fields.push(FieldDefinition::new(name, field_type));
                let last = self.fields.len() - 1;
                &mut self.fields[last]
            }
        }
    }

    pub fn text(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "text")
    }

    pub fn keyword(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "keyword")
    }

    pub fn integer(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "integer")
    }

    pub fn long(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "long")
    }

    pub fn float(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "float")
    }

    pub fn double(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "double")
    }

    pub fn boolean(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "boolean")
    }

    pub fn date(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "date")
    }

    pub fn geo_point(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "geo_point")
    }

    pub fn ip(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "ip")
    }

    pub fn nested(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "nested")
    }

    pub fn object(&mut self, name: impl Into<String>) -> &mut FieldDefinition {
        self.field(name, "object")
    }

    /// Set an index setting such as `number_of_shards`
    pub fn setting(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// The `properties` map of the mapping
    pub fn to_mapping(&self) -> Value {
        properties_map(&self.fields)
    }

    /// Full request body: `{settings, mappings: {properties}}`
    pub fn to_body(&self) -> Value {
        json!({
            "settings": Value::Object(self.settings.clone()),
            "mappings": { "properties": self.to_mapping() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_name_becomes_multi_field() {
        let mut blueprint = IndexBlueprint::new("blog_posts");
        blueprint.text("title");
        blueprint.keyword("title").param("ignore_above", 256);

        assert_eq!(blueprint.fields().len(), 1);
        let mapping = blueprint.to_mapping();
        assert_eq!(mapping["title"]["type"], "text");
        assert_eq!(mapping["title"]["fields"]["keyword"]["type"], "keyword");
        assert_eq!(mapping["title"]["fields"]["keyword"]["ignore_above"], 256);
    }

    #[test]
    fn test_nested_properties() {
        let mut blueprint = IndexBlueprint::new("blog_posts");
        blueprint.nested("comments").with_properties(|c| {
            c.text("author");
            c.object("meta").with_properties(|m| {
                m.integer("likes");
            });
        });

        let mapping = blueprint.to_mapping();
        assert_eq!(mapping["comments"]["type"], "nested");
        assert_eq!(mapping["comments"]["properties"]["author"]["type"], "text");
        assert_eq!(
            mapping["comments"]["properties"]["meta"]["properties"]["likes"]["type"],
            "integer"
        );
    }

    #[test]
    fn test_body_shape() {
        let mut blueprint = IndexBlueprint::new("posts");
        blueprint.setting("number_of_shards", 1);
        blueprint.text("content").analyzer("my_analyzer");

        let body = blueprint.to_body();
        assert_eq!(body["settings"]["number_of_shards"], 1);
        assert_eq!(body["mappings"]["properties"]["content"]["analyzer"], "my_analyzer");
        assert!(!blueprint.is_empty());
        assert!(IndexBlueprint::new("empty").is_empty());
    }
}
