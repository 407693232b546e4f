//! Schema: the set of searchable fields, their types and boosts.
//!
//! The matching engine consults the schema at compile time; a query naming
//! a field the schema lacks fails before any matcher is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LanceError, Result};

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Tokenized full text with positions and length norms.
    Text,
    /// A single untokenized term.
    String,
    /// A 64-bit integer, indexed as a single term.
    Integer,
    /// A 64-bit float, indexed as a single term.
    Float,
}

impl FieldType {
    /// Whether values are split into multiple terms.
    pub fn is_tokenized(&self) -> bool {
        matches!(self, FieldType::Text)
    }

    /// Whether values compare numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }
}

/// Definition of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field type.
    pub field_type: FieldType,
    /// Multiplier applied to every term weight in this field.
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl FieldDefinition {
    /// Create a field definition with boost 1.0.
    pub fn new(field_type: FieldType) -> Self {
        FieldDefinition {
            field_type,
            boost: 1.0,
        }
    }

    /// Set the field boost.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

/// The set of fields known to an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: BTreeMap<String, FieldDefinition>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Schema::default()
    }

    /// Add a field. Adding the same name twice is an error.
    pub fn add_field<S: Into<String>>(&mut self, name: S, definition: FieldDefinition) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(LanceError::schema("field name must not be empty"));
        }
        if !definition.boost.is_finite() || definition.boost < 0.0 {
            return Err(LanceError::schema(format!(
                "field '{name}' has invalid boost {}",
                definition.boost
            )));
        }
        if self.fields.contains_key(&name) {
            return Err(LanceError::schema(format!("field '{name}' already exists")));
        }
        self.fields.insert(name, definition);
        Ok(())
    }

    /// Builder-style variant of [`Schema::add_field`].
    pub fn with_field<S: Into<String>>(mut self, name: S, definition: FieldDefinition) -> Result<Self> {
        self.add_field(name, definition)?;
        Ok(self)
    }

    /// Check whether a field exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Get a field definition or fail with [`LanceError::NoSuchField`].
    pub fn field(&self, name: &str) -> Result<&FieldDefinition> {
        self.fields
            .get(name)
            .ok_or_else(|| LanceError::no_such_field(name))
    }

    /// Get the boost of a field.
    pub fn field_boost(&self, name: &str) -> Result<f32> {
        Ok(self.field(name)?.boost)
    }

    /// Get the type of a field.
    pub fn field_type(&self, name: &str) -> Result<FieldType> {
        Ok(self.field(name)?.field_type)
    }

    /// Field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        for (name, definition) in &schema.fields {
            if !definition.boost.is_finite() || definition.boost < 0.0 {
                return Err(LanceError::schema(format!(
                    "field '{name}' has invalid boost {}",
                    definition.boost
                )));
            }
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_fields() {
        let schema = Schema::new()
            .with_field("title", FieldDefinition::new(FieldType::Text).with_boost(2.0))
            .unwrap()
            .with_field("year", FieldDefinition::new(FieldType::Integer))
            .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.field_boost("title").unwrap(), 2.0);
        assert_eq!(schema.field_type("year").unwrap(), FieldType::Integer);
        assert!(matches!(
            schema.field_boost("body"),
            Err(LanceError::NoSuchField(f)) if f == "body"
        ));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut schema = Schema::new();
        schema.add_field("title", FieldDefinition::new(FieldType::Text)).unwrap();
        assert!(schema.add_field("title", FieldDefinition::new(FieldType::String)).is_err());
    }

    #[test]
    fn test_schema_from_json() {
        let json = r#"{"fields": {
            "body": {"field_type": "text"},
            "tag": {"field_type": "string", "boost": 0.5}
        }}"#;
        let schema = Schema::from_json(json).unwrap();
        assert_eq!(schema.field_boost("body").unwrap(), 1.0);
        assert_eq!(schema.field_boost("tag").unwrap(), 0.5);
        assert_eq!(schema.field_type("tag").unwrap(), FieldType::String);

        let bad = r#"{"fields": {"body": {"field_type": "text", "boost": -1.0}}}"#;
        assert!(Schema::from_json(bad).is_err());
    }
}
