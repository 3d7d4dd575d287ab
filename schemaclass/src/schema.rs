//! JSON Schema parsing.
//!
//! A raw schema document is parsed once into a tree of shared [`Schema`]
//! descriptions. Every node of a schema-class tree points at the `Schema`
//! it was built from, so rebuilding array items or swapping oneOf
//! candidates never has to look at the raw document again.
//!
//! The node-type discriminators are checked in a fixed priority order:
//! `oneOf` (or `anyOf`), then `enum` (or `const`), then `type`.

use std::{fmt, sync::Arc};

use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};

/// Type tag of a schema entry and of every tree node built from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Object,
    Array,
    String,
    Boolean,
    Number,
    Integer,
    Enum,
    OneOf,
}

impl NodeType {
    /// The discriminator string as written in the schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Object => "object",
            NodeType::Array => "array",
            NodeType::String => "string",
            NodeType::Boolean => "boolean",
            NodeType::Number => "number",
            NodeType::Integer => "integer",
            NodeType::Enum => "enum",
            NodeType::OneOf => "oneOf",
        }
    }

    /// Whether nodes of this type hold a single value rather than children.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, NodeType::Object | NodeType::Array | NodeType::OneOf)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed schema entry.
#[derive(Debug, Clone)]
pub struct Schema {
    /// `description` annotation.
    pub description: Option<String>,
    /// `default` annotation, unconverted.
    pub default: Option<Value>,
    /// `readOnly` annotation.
    pub read_only: bool,
    /// Type-specific part of the schema.
    pub kind: SchemaKind,
}

/// Type-specific schema content.
#[derive(Debug, Clone)]
pub enum SchemaKind {
    Object(ObjectSchema),
    Array { items: Arc<Schema> },
    String,
    Boolean,
    Number,
    Integer,
    Enum { values: Vec<Value> },
    OneOf { variants: Vec<Arc<Schema>> },
}

/// Schema of an `object` entry.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    /// Declared properties, in declaration order.
    pub properties: Vec<(String, Arc<Schema>)>,
    /// Names listed in `required`.
    pub required: Vec<String>,
    /// Whether keys beyond `properties` are accepted. `false` means frozen.
    pub additional_properties: bool,
}

impl ObjectSchema {
    /// Whether `name` is listed in `required`.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

impl Schema {
    /// Parse a raw JSON Schema document.
    ///
    /// Local `$ref` pointers are resolved against `document` itself.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidSchema`] when an entry has no usable
    /// type discriminator, when a frozen object lacks `properties`, when an
    /// `enum` is not a non-empty array or its default is not a member, or
    /// when references form a cycle.
    pub fn parse(document: &Value) -> Result<Arc<Schema>> {
        let mut parser = SchemaParser {
            document,
            resolving: Vec::new(),
        };
        parser.parse(document, "")
    }

    /// Type tag of this entry.
    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            SchemaKind::Object(_) => NodeType::Object,
            SchemaKind::Array { .. } => NodeType::Array,
            SchemaKind::String => NodeType::String,
            SchemaKind::Boolean => NodeType::Boolean,
            SchemaKind::Number => NodeType::Number,
            SchemaKind::Integer => NodeType::Integer,
            SchemaKind::Enum { .. } => NodeType::Enum,
            SchemaKind::OneOf { .. } => NodeType::OneOf,
        }
    }

    /// Object part of the schema, if this is an `object` entry.
    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match &self.kind {
            SchemaKind::Object(o) => Some(o),
            _ => None,
        }
    }
}

struct SchemaParser<'a> {
    document: &'a Value,
    resolving: Vec<String>,
}

impl SchemaParser<'_> {
    fn parse(&mut self, raw: &Value, path: &str) -> Result<Arc<Schema>> {
        let obj = raw
            .as_object()
            .ok_or_else(|| SchemaError::invalid_schema(path, "schema entry must be an object"))?;

        if let Some(reference) = obj.get("$ref") {
            let target = self.parse_ref(reference, path)?;
            return with_annotations(target, obj, path);
        }

        if let Some(all_of) = obj.get("allOf") {
            let entries = all_of
                .as_array()
                .ok_or_else(|| SchemaError::invalid_schema(path, "`allOf` must be an array"))?;
            if entries.len() != 1 {
                return Err(SchemaError::invalid_schema(
                    path,
                    "`allOf` is only supported with a single schema",
                ));
            }
            let inner = self.parse(&entries[0], &format!("{path}/allOf/0"))?;
            return with_annotations(inner, obj, path);
        }

        let (description, default, read_only) = annotations(obj, path)?;

        let union = obj
            .get("oneOf")
            .map(|v| ("oneOf", v))
            .or_else(|| obj.get("anyOf").map(|v| ("anyOf", v)));
        if let Some((keyword, variants)) = union {
            return self.parse_union(keyword, variants, obj, path);
        }

        let kind = if let Some(values) = obj.get("enum") {
            parse_enum(values, default.as_ref(), path)?
        } else if let Some(constant) = obj.get("const") {
            parse_enum(&Value::Array(vec![constant.clone()]), default.as_ref(), path)?
        } else {
            match type_name(obj, path)? {
                "object" => SchemaKind::Object(self.parse_object(obj, path)?),
                "array" => {
                    let items = obj.get("items").ok_or_else(|| {
                        SchemaError::invalid_schema(path, "array schema without `items`")
                    })?;
                    SchemaKind::Array {
                        items: self.parse(items, &format!("{path}/items"))?,
                    }
                }
                "string" => SchemaKind::String,
                "boolean" => SchemaKind::Boolean,
                "number" => SchemaKind::Number,
                "integer" => SchemaKind::Integer,
                other => {
                    return Err(SchemaError::invalid_schema(
                        path,
                        format!("unsupported type `{other}`"),
                    ));
                }
            }
        };

        Ok(Arc::new(Schema {
            description,
            default,
            read_only,
            kind,
        }))
    }

    fn parse_ref(&mut self, reference: &Value, path: &str) -> Result<Arc<Schema>> {
        let reference = reference
            .as_str()
            .ok_or_else(|| SchemaError::invalid_schema(path, "`$ref` must be a string"))?;
        if self.resolving.iter().any(|r| r == reference) {
            return Err(SchemaError::invalid_schema(
                path,
                format!("recursive reference `{reference}`"),
            ));
        }
        let target = resolve_ref(self.document, reference).ok_or_else(|| {
            SchemaError::invalid_schema(path, format!("cannot resolve reference `{reference}`"))
        })?;

        trace!("resolving schema reference {reference}");
        self.resolving.push(reference.to_string());
        let parsed = self.parse(target, reference);
        self.resolving.pop();
        parsed
    }

    fn parse_union(
        &mut self,
        keyword: &str,
        variants: &Value,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Result<Arc<Schema>> {
        let entries = variants
            .as_array()
            .ok_or_else(|| SchemaError::invalid_schema(path, format!("`{keyword}` must be an array")))?;

        let mut parsed = Vec::with_capacity(entries.len());
        let mut dropped_null = false;
        for (i, entry) in entries.iter().enumerate() {
            if is_null_schema(entry) {
                dropped_null = true;
                continue;
            }
            parsed.push(self.parse(entry, &format!("{path}/{keyword}/{i}"))?);
        }

        if parsed.is_empty() {
            return Err(SchemaError::invalid_schema(
                path,
                format!("`{keyword}` has no usable schemas"),
            ));
        }

        // `Option<T>` style unions collapse to `T`.
        if dropped_null && parsed.len() == 1 {
            let only = parsed.remove(0);
            return with_annotations(only, obj, path);
        }

        let (description, default, read_only) = annotations(obj, path)?;
        Ok(Arc::new(Schema {
            description,
            default,
            read_only,
            kind: SchemaKind::OneOf { variants: parsed },
        }))
    }

    fn parse_object(&mut self, obj: &Map<String, Value>, path: &str) -> Result<ObjectSchema> {
        let additional_properties = match obj.get("additionalProperties") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(_) => true,
        };

        let mut properties = Vec::new();
        match obj.get("properties") {
            Some(Value::Object(props)) => {
                for (name, child) in props {
                    let child = self.parse(child, &format!("{path}/properties/{name}"))?;
                    properties.push((name.clone(), child));
                }
            }
            Some(_) => {
                return Err(SchemaError::invalid_schema(path, "`properties` must be an object"));
            }
            None if !additional_properties => {
                return Err(SchemaError::invalid_schema(
                    path,
                    "object schema without `properties` must allow `additionalProperties`",
                ));
            }
            None => {}
        }

        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ObjectSchema {
            properties,
            required,
            additional_properties,
        })
    }
}

type Annotations = (Option<String>, Option<Value>, bool);

fn annotations(obj: &Map<String, Value>, path: &str) -> Result<Annotations> {
    let description = match obj.get("description") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(SchemaError::invalid_schema(path, "`description` must be a string"));
        }
    };
    let read_only = match obj.get("readOnly") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(SchemaError::invalid_schema(path, "`readOnly` must be a boolean")),
    };
    Ok((description, obj.get("default").cloned(), read_only))
}

/// Overlay the annotations written next to a `$ref`/`allOf` onto its target.
fn with_annotations(
    target: Arc<Schema>,
    obj: &Map<String, Value>,
    path: &str,
) -> Result<Arc<Schema>> {
    let (description, default, read_only) = annotations(obj, path)?;
    if description.is_none() && default.is_none() && !read_only {
        return Ok(target);
    }

    let mut schema = (*target).clone();
    if description.is_some() {
        schema.description = description;
    }
    if let Some(default) = default {
        if let SchemaKind::Enum { values } = &schema.kind {
            if !values.contains(&default) {
                return Err(SchemaError::invalid_schema(
                    path,
                    format!("default {default} is not one of the enum values"),
                ));
            }
        }
        schema.default = Some(default);
    }
    schema.read_only |= read_only;
    Ok(Arc::new(schema))
}

fn parse_enum(values: &Value, default: Option<&Value>, path: &str) -> Result<SchemaKind> {
    let values = match values {
        Value::Array(values) if !values.is_empty() => values.clone(),
        Value::Array(_) => return Err(SchemaError::invalid_schema(path, "`enum` must not be empty")),
        _ => return Err(SchemaError::invalid_schema(path, "`enum` must be an array")),
    };
    if let Some(default) = default {
        if !values.contains(default) {
            return Err(SchemaError::invalid_schema(
                path,
                format!("default {default} is not one of the enum values"),
            ));
        }
    }
    Ok(SchemaKind::Enum { values })
}

fn type_name<'a>(obj: &'a Map<String, Value>, path: &str) -> Result<&'a str> {
    match obj.get("type") {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .ok_or_else(|| SchemaError::invalid_schema(path, "`type` lists no non-null type")),
        Some(_) => Err(SchemaError::invalid_schema(path, "`type` must be a string or an array")),
        None => Err(SchemaError::invalid_schema(path, "missing `type`, `enum` or `oneOf`")),
    }
}

fn is_null_schema(raw: &Value) -> bool {
    raw.get("type").and_then(Value::as_str) == Some("null")
}

/// Resolve a local `#/...` JSON pointer inside `document`.
fn resolve_ref<'a>(document: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(document);
    }
    let mut current = document;
    for token in pointer.strip_prefix('/')?.split('/') {
        let token = token.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&token)?,
            Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_discriminator_priority() {
        let schema = Schema::parse(&json!({
            "type": "string",
            "enum": ["a", "b"],
        }))
        .unwrap();
        assert_eq!(schema.node_type(), NodeType::Enum);

        let schema = Schema::parse(&json!({
            "type": "string",
            "enum": ["a"],
            "oneOf": [{ "type": "string" }, { "type": "number" }],
        }))
        .unwrap();
        assert_eq!(schema.node_type(), NodeType::OneOf);
    }

    #[test]
    fn test_object_properties_keep_declaration_order() {
        let schema = Schema::parse(&json!({
            "type": "object",
            "required": ["zeta"],
            "properties": {
                "zeta": { "type": "string" },
                "alpha": { "type": "integer", "readOnly": true },
            },
        }))
        .unwrap();
        let object = schema.as_object().unwrap();
        let names: Vec<_> = object.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert!(object.is_required("zeta"));
        assert!(!object.is_required("alpha"));
        assert!(object.properties[1].1.read_only);
        assert!(!object.additional_properties);
    }

    #[test]
    fn test_invalid_schemas() {
        let cases = [
            json!({ "description": "no type" }),
            json!({ "type": "date" }),
            json!({ "type": "object" }),
            json!({ "enum": "a" }),
            json!({ "enum": [] }),
            json!({ "enum": ["a", "b"], "default": "c" }),
            json!({ "type": "array" }),
            json!({ "type": "null" }),
        ];
        for case in cases {
            let err = Schema::parse(&case).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidSchema { .. }),
                "{case} should be rejected, got {err}"
            );
        }
    }

    #[test]
    fn test_open_object_without_properties() {
        let schema = Schema::parse(&json!({
            "type": "object",
            "additionalProperties": { "type": "string" },
        }))
        .unwrap();
        let object = schema.as_object().unwrap();
        assert!(object.additional_properties);
        assert!(object.properties.is_empty());
    }

    #[test]
    fn test_local_references() {
        let schema = Schema::parse(&json!({
            "type": "object",
            "properties": {
                "level": { "$ref": "#/$defs/Level", "description": "Log level" },
            },
            "$defs": {
                "Level": { "type": "string", "enum": ["info", "debug"] },
            },
        }))
        .unwrap();
        let level = &schema.as_object().unwrap().properties[0].1;
        assert_eq!(level.node_type(), NodeType::Enum);
        assert_eq!(level.description.as_deref(), Some("Log level"));
    }

    #[test]
    fn test_recursive_reference_is_rejected() {
        let err = Schema::parse(&json!({
            "$ref": "#/definitions/Node",
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": { "next": { "$ref": "#/definitions/Node" } },
                },
            },
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema { .. }));
    }

    #[test]
    fn test_nullable_forms() {
        let schema = Schema::parse(&json!({ "type": ["string", "null"] })).unwrap();
        assert_eq!(schema.node_type(), NodeType::String);

        let schema = Schema::parse(&json!({
            "anyOf": [{ "type": "integer" }, { "type": "null" }],
            "description": "optional count",
        }))
        .unwrap();
        assert_eq!(schema.node_type(), NodeType::Integer);
        assert_eq!(schema.description.as_deref(), Some("optional count"));

        let schema = Schema::parse(&json!({ "const": "fixed" })).unwrap();
        assert!(matches!(&schema.kind, SchemaKind::Enum { values } if values == &[json!("fixed")]));
    }
}
