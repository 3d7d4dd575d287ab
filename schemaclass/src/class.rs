//! The [`SchemaClass`] facade.
//!
//! A facade owns one primary tree plus one private tree per fallback value,
//! all in a single [`Arena`]. Named properties of the root object are looked
//! up through a map built once at construction; everything else goes
//! through the JSON-path API.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    error::Result,
    path::parse_json_path,
    schema::{NodeType, Schema},
    serializer::{Mimetype, SerializeOptions, Serializer, drive},
    tree::{self, Arena, NodeId, NodeRef},
};

/// Declared property of the root object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub node_type: NodeType,
    /// Setting through [`SchemaClass::set_property`] fails.
    pub read_only: bool,
    /// Listed in the root schema's `required`.
    pub required: bool,
    node: NodeId,
}

/// Typed configuration object built from a JSON Schema and JSON values.
///
/// ```
/// use schemaclass::SchemaClass;
/// use serde_json::json;
///
/// let schema = json!({
///     "type": "object",
///     "properties": { "port": { "type": "integer", "default": 80 } },
/// });
/// let mut class = SchemaClass::new(&schema, json!({})).unwrap();
/// assert_eq!(class.get("port").unwrap(), Some(json!(80)));
///
/// class.set("port", json!("8080")).unwrap();
/// assert_eq!(class.get_property("port"), Some(json!(8080)));
/// assert!(class.is_dirty());
/// ```
#[derive(Debug)]
pub struct SchemaClass {
    schema: Arc<Schema>,
    arena: Arena,
    root: NodeId,
    /// Roots of the fallback trees, highest priority first.
    fallbacks: Vec<NodeId>,
    /// Primary value as passed in, consulted by [`SchemaClass::alias`].
    original: Value,
    properties: IndexMap<String, PropertyDescriptor>,
}

/// Outcome of walking a path through the tree.
enum Resolved<'p> {
    Node(NodeId),
    /// The walk stopped at `last`; `rest` was not matched by any typed node.
    Partial { last: NodeId, rest: &'p [String] },
}

impl SchemaClass {
    /// Build a facade over `value`.
    ///
    /// # Errors
    ///
    /// Fails when the schema is invalid or a required field gets an
    /// unusable value.
    pub fn new(schema: &Value, value: Value) -> Result<Self> {
        Self::with_fallbacks(schema, value, Vec::new())
    }

    /// Build a facade over `value` backed by lower-priority `fallbacks`.
    ///
    /// Fields the primary value leaves undefined are read from the first
    /// fallback defining them.
    pub fn with_fallbacks(schema: &Value, value: Value, fallbacks: Vec<Value>) -> Result<Self> {
        Self::from_schema(Schema::parse(schema)?, value, fallbacks)
    }

    /// Build a facade from an already parsed schema.
    pub fn from_schema(schema: Arc<Schema>, value: Value, fallbacks: Vec<Value>) -> Result<Self> {
        let mut arena = Arena::new();

        // The last fallback is the bottom of the forward chain.
        let mut forward = None;
        let mut fallback_roots = Vec::with_capacity(fallbacks.len());
        for fallback in fallbacks.iter().rev() {
            let id = arena.build(&schema, Some(fallback), None, "", forward)?;
            fallback_roots.push(id);
            forward = Some(id);
        }
        fallback_roots.reverse();

        let root = arena.build(&schema, Some(&value), None, "", forward)?;
        let properties = arena
            .node(root)
            .children()
            .map(|child| {
                let descriptor = PropertyDescriptor {
                    name: child.name().to_string(),
                    node_type: child.node_type(),
                    read_only: child.read_only(),
                    required: child.required(),
                    node: child.id(),
                };
                (descriptor.name.clone(), descriptor)
            })
            .collect();
        debug!(
            "schema class built: {} nodes, {} fallback(s)",
            arena.len(),
            fallback_roots.len()
        );

        Ok(Self {
            schema,
            arena,
            root,
            fallbacks: fallback_roots,
            original: value,
            properties,
        })
    }

    /// Parsed schema of the root.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Root of the primary tree.
    pub fn root(&self) -> NodeRef<'_> {
        self.arena.node(self.root)
    }

    /// Root of the `index`-th fallback tree.
    pub fn fallback(&self, index: usize) -> Option<NodeRef<'_>> {
        self.fallbacks.get(index).map(|id| self.arena.node(*id))
    }

    /// Resolved root value, forwarded and default values included.
    pub fn value(&self) -> Option<Value> {
        self.arena.value(self.root)
    }

    /// The primary value the facade was built from.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// Whether anything was written since construction.
    pub fn is_dirty(&self) -> bool {
        self.arena.node(self.root).dirty()
    }

    /// Declared properties of the root object, in schema order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    /// Descriptor of one declared root property.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    /// Value of a declared root property, or a passthrough key of an open root.
    pub fn get_property(&self, name: &str) -> Option<Value> {
        match self.properties.get(name) {
            Some(p) => self.arena.value(p.node),
            None => self
                .arena
                .value(self.root)
                .and_then(|v| v.get(name).cloned()),
        }
    }

    /// Assign a root property.
    ///
    /// # Errors
    ///
    /// [`SettingReadOnlyProperty`](crate::SchemaError::SettingReadOnlyProperty)
    /// for read-only properties,
    /// [`UnknownProperty`](crate::SchemaError::UnknownProperty) for undeclared
    /// names on a frozen root, plus any validation error of the node.
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        match self.properties.get(name) {
            Some(p) => self.arena.set(p.node, Some(value), false, false),
            None => {
                self.arena
                    .set_passthrough(self.root, &[name.to_string()], Some(value))?;
                Ok(())
            }
        }
    }

    fn resolve<'p>(&self, fragments: &'p [String]) -> Resolved<'p> {
        let mut current = self.root;
        for (i, fragment) in fragments.iter().enumerate() {
            match self.arena.step(current, fragment) {
                Some(next) => current = next,
                None => {
                    trace!(
                        "path resolution stopped at `{}` before `{fragment}`",
                        self.arena.path_of(current)
                    );
                    return Resolved::Partial {
                        last: current,
                        rest: &fragments[i..],
                    };
                }
            }
        }
        Resolved::Node(current)
    }

    /// Typed node at `path`, if one resolves.
    ///
    /// # Errors
    ///
    /// [`InvalidJsonPath`](crate::SchemaError::InvalidJsonPath) for malformed paths.
    pub fn node(&self, path: &str) -> Result<Option<NodeRef<'_>>> {
        let fragments = parse_json_path(path)?;
        Ok(match self.resolve(&fragments) {
            Resolved::Node(id) => Some(self.arena.node(id)),
            Resolved::Partial { .. } => None,
        })
    }

    /// Value at `path`.
    ///
    /// When no typed node resolves, the passthrough data of the deepest
    /// resolved node is searched instead.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let fragments = parse_json_path(path)?;
        Ok(match self.resolve(&fragments) {
            Resolved::Node(id) => self.arena.value(id),
            Resolved::Partial { last, rest } => self
                .arena
                .value(last)
                .and_then(|v| tree::walk(&v, rest).cloned()),
        })
    }

    /// Assign the value at `path`.
    ///
    /// A typed node validates the value. Otherwise the value is written into
    /// the passthrough area of the enclosing open object.
    ///
    /// # Errors
    ///
    /// [`UnknownProperty`](crate::SchemaError::UnknownProperty) when no typed
    /// node resolves and there is no open object to hold the value, plus any
    /// validation error of the node.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let fragments = parse_json_path(path)?;
        match self.resolve(&fragments) {
            Resolved::Node(id) => self.arena.set(id, Some(value), false, false),
            Resolved::Partial { last, rest } => {
                self.arena.set_passthrough(last, rest, Some(value))?;
                Ok(())
            }
        }
    }

    /// Make the value at `path` undefined.
    ///
    /// The node stays defined and reads as `None`: fallback and default
    /// values no longer show through.
    ///
    /// # Errors
    ///
    /// [`InvalidValue`](crate::SchemaError::InvalidValue) when the node is
    /// required, [`UnknownProperty`](crate::SchemaError::UnknownProperty) when
    /// the path names no typed node and no passthrough key can live there.
    pub fn unset(&mut self, path: &str) -> Result<()> {
        let fragments = parse_json_path(path)?;
        match self.resolve(&fragments) {
            Resolved::Node(id) => self.arena.set(id, None, false, false),
            Resolved::Partial { last, rest } => {
                self.arena.set_passthrough(last, rest, None)?;
                Ok(())
            }
        }
    }

    /// Type of the node at `path`.
    pub fn type_of(&self, path: &str) -> Result<Option<NodeType>> {
        Ok(self.node(path)?.map(|n| n.node_type()))
    }

    /// Whether the node at `path` was assigned a value of its own.
    pub fn defined(&self, path: &str) -> Result<bool> {
        Ok(self.node(path)?.is_some_and(|n| n.defined()))
    }

    /// Clear the node at `path` without validation. Unresolved paths are ignored.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let fragments = parse_json_path(path)?;
        if let Resolved::Node(id) = self.resolve(&fragments) {
            self.arena.destroy(id);
        }
        Ok(())
    }

    /// Pull a value from `destination` in the original primary value into
    /// the node at `source`, bypassing read-only.
    ///
    /// Used to migrate a value from a deprecated location. Returns `false`
    /// when `source` does not resolve or the original value has nothing at
    /// `destination`.
    pub fn alias(&mut self, source: &str, destination: &str) -> Result<bool> {
        let source_fragments = parse_json_path(source)?;
        let destination_fragments = parse_json_path(destination)?;
        let Resolved::Node(id) = self.resolve(&source_fragments) else {
            return Ok(false);
        };
        let Some(value) = tree::walk(&self.original, &destination_fragments).cloned() else {
            return Ok(false);
        };
        debug!("aliasing `{source}` to `{destination}`");
        self.arena.set(id, Some(value), false, true)?;
        Ok(true)
    }

    /// Serialize the primary tree in the format named by `mimetype`.
    ///
    /// # Errors
    ///
    /// [`UnknownMimetype`](crate::SchemaError::UnknownMimetype) when no
    /// serializer handles `mimetype`.
    pub fn serialize(&self, mimetype: &str, options: &SerializeOptions) -> Result<String> {
        let mimetype: Mimetype = mimetype.parse()?;
        mimetype.serialize(self.root(), options)
    }

    /// Drive a custom serializer over the primary tree.
    pub fn serialize_with<S: Serializer + ?Sized>(&self, serializer: &mut S) -> Result<()> {
        drive(self.root(), serializer)
    }

    /// Tear down every tree of this facade.
    pub fn dispose(mut self) {
        debug!("disposing schema class with {} nodes", self.arena.len());
        self.arena.clear();
        self.fallbacks.clear();
        self.properties.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::SchemaError;

    fn app_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string", "description": "Project name" },
                "version": { "type": "string", "readOnly": true },
                "port": { "type": "integer", "default": 8080 },
                "mode": { "enum": ["dev", "prod"] },
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": true,
                        "properties": { "name": { "type": "string" } },
                    },
                },
                "assets": {
                    "oneOf": [
                        { "type": "string" },
                        { "type": "array", "items": { "type": "string" } },
                    ],
                },
            },
        })
    }

    fn app() -> SchemaClass {
        let _ = env_logger::builder().is_test(true).try_init();
        SchemaClass::new(
            &app_schema(),
            json!({
                "name": "app",
                "version": "1.0",
                "items": [{ "name": "a", "extra": { "x": 1 } }],
                "legacyName": "old",
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_properties() {
        let class = app();
        let names: Vec<_> = class.properties().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["name", "version", "port", "mode", "items", "assets"]);

        let version = class.property("version").unwrap();
        assert!(version.read_only);
        assert!(!version.required);
        assert!(class.property("name").unwrap().required);
        assert_eq!(class.property("items").unwrap().node_type, NodeType::Array);

        assert_eq!(class.get_property("port"), Some(json!(8080)));
        assert_eq!(class.get_property("missing"), None);
    }

    #[test]
    fn test_set_property() {
        let mut class = app();
        class.set_property("name", json!("renamed")).unwrap();
        assert_eq!(class.get_property("name"), Some(json!("renamed")));
        assert!(class.is_dirty());

        let err = class.set_property("version", json!("2.0")).unwrap_err();
        assert!(matches!(err, SchemaError::SettingReadOnlyProperty { ref name } if name == "version"));
        assert_eq!(class.get_property("version"), Some(json!("1.0")));
    }

    #[test]
    fn test_path_access() {
        let mut class = app();
        assert_eq!(class.get("items[0].name").unwrap(), Some(json!("a")));
        assert_eq!(class.get("items[1].name").unwrap(), None);
        assert_eq!(class.type_of("items[0]").unwrap(), Some(NodeType::Object));
        assert_eq!(class.type_of("items[0].name").unwrap(), Some(NodeType::String));
        assert_eq!(class.type_of("nothing").unwrap(), None);

        class.set("items[0].name", json!(7)).unwrap();
        assert_eq!(class.get("items[0].name").unwrap(), Some(json!("7")));
        assert!(class.node("items[0].name").unwrap().unwrap().dirty());

        let err = class.get("items..name").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJsonPath { .. }));
    }

    #[test]
    fn test_passthrough_paths() {
        let mut class = app();
        assert_eq!(class.get("items[0].extra.x").unwrap(), Some(json!(1)));
        assert_eq!(class.type_of("items[0].extra").unwrap(), None);

        class.set("items[0].extra.y", json!(true)).unwrap();
        assert_eq!(class.get("items[0].extra").unwrap(), Some(json!({ "x": 1, "y": true })));
        assert!(class.is_dirty());

        class.set("items[0].fresh", json!([1])).unwrap();
        assert_eq!(class.get("items[0].fresh[0]").unwrap(), Some(json!(1)));

        // The root is frozen: there is nowhere to put the value.
        let err = class.set("unknown", json!(1)).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownProperty { ref path } if path == "unknown"));
        assert_eq!(class.get("unknown").unwrap(), None);
        let err = class.set_property("unknown", json!(1)).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownProperty { .. }));

        let err = class.set("name.inner", json!(1)).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownProperty { ref path } if path == "name.inner"));
        assert_eq!(class.get("name").unwrap(), Some(json!("app")));

        let err = class.set("items[0].missing.z", json!(1)).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownProperty { ref path } if path == "items[0].missing.z"));

        class.unset("items[0].extra").unwrap();
        assert_eq!(class.get("items[0].extra").unwrap(), None);
    }

    #[test]
    fn test_frozen_root_drops_unknown_keys() {
        let schema = json!({
            "type": "object",
            "properties": { "a": { "type": "integer" } },
        });
        let class = SchemaClass::new(&schema, json!({ "a": 1, "extra": 2 })).unwrap();
        let names: Vec<_> = class.root().children().map(|c| c.name()).collect();
        assert_eq!(names, ["a"]);
        assert_eq!(class.get("extra").unwrap(), None);
        let out = class.serialize("application/json", &SerializeOptions::default().with_indent(0)).unwrap();
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn test_required_enforcement() {
        let mut class = app();
        let err = class.unset("name").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidValue { ref name, .. } if name == "name"));
        assert_eq!(class.get("name").unwrap(), Some(json!("app")));

        class.set("port", json!(1)).unwrap();
        class.unset("port").unwrap();
        assert!(class.defined("port").unwrap());
        assert!(class.node("port").unwrap().unwrap().dirty());
        assert_eq!(class.get("port").unwrap(), None);
    }

    #[test]
    fn test_enum_membership() {
        let mut class = SchemaClass::new(&app_schema(), json!({ "name": "a", "mode": "X" })).unwrap();
        assert!(!class.defined("mode").unwrap());

        class.set("mode", json!("prod")).unwrap();
        assert_eq!(class.get("mode").unwrap(), Some(json!("prod")));

        let err = class.set("mode", json!("test")).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidUpdateValue { .. }));
    }

    #[test]
    fn test_one_of_dispatch() {
        let mut class =
            SchemaClass::new(&app_schema(), json!({ "name": "a", "assets": ["x", "y"] })).unwrap();
        assert_eq!(class.get("assets").unwrap(), Some(json!(["x", "y"])));
        assert_eq!(class.type_of("assets").unwrap(), Some(NodeType::OneOf));
        assert_eq!(class.get("assets[1]").unwrap(), Some(json!("y")));

        class.set("assets", json!("hello")).unwrap();
        assert_eq!(class.get("assets").unwrap(), Some(json!("hello")));
        assert_eq!(class.get("assets[1]").unwrap(), None);
    }

    #[test]
    fn test_one_of_picks_integer_for_fractional_number() {
        let schema = json!({
            "type": "object",
            "properties": {
                "v": { "oneOf": [{ "type": "integer" }, { "type": "string" }] },
            },
        });
        let mut class = SchemaClass::new(&schema, json!({ "v": 2.5 })).unwrap();
        assert_eq!(class.get("v").unwrap(), Some(json!(2)));
        let current = class.node("v").unwrap().unwrap().current().unwrap();
        assert_eq!(current.node_type(), NodeType::Integer);

        class.set("v", json!(7.9)).unwrap();
        assert_eq!(class.get("v").unwrap(), Some(json!(7)));
        class.set("v", json!("text")).unwrap();
        assert_eq!(class.get("v").unwrap(), Some(json!("text")));
    }

    #[test]
    fn test_dirty_propagation() {
        let mut class = app();
        assert!(!class.is_dirty());
        class.set("items[0].name", json!("b")).unwrap();
        let item = class.node("items[0]").unwrap().unwrap();
        assert!(item.dirty());
        assert!(item.parent().unwrap().dirty());
        assert!(class.is_dirty());
        assert!(!class.node("name").unwrap().unwrap().dirty());
    }

    #[test]
    fn test_fallback_forwarding() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": { "type": "integer" },
                "b": { "type": "string" },
            },
        });
        let mut class = SchemaClass::with_fallbacks(
            &schema,
            json!({}),
            vec![json!({ "a": 5 }), json!({ "a": 1, "b": "low" })],
        )
        .unwrap();
        assert_eq!(class.get("a").unwrap(), Some(json!(5)));
        assert_eq!(class.get("b").unwrap(), Some(json!("low")));
        assert!(!class.defined("a").unwrap());

        class.set("a", json!(9)).unwrap();
        assert_eq!(class.get("a").unwrap(), Some(json!(9)));
        let fallback = class.fallback(0).unwrap();
        assert_eq!(fallback.child("a").unwrap().value(), Some(json!(5)));
        assert!(!fallback.dirty());

        // Unsetting hides the fallback instead of revealing it again.
        class.unset("a").unwrap();
        assert!(class.defined("a").unwrap());
        assert_eq!(class.get("a").unwrap(), None);
        assert_eq!(class.get("b").unwrap(), Some(json!("low")));
        let out = class
            .serialize("application/json", &SerializeOptions::default().with_indent(0))
            .unwrap();
        assert_eq!(out, "{}");
    }

    #[test]
    fn test_delete() {
        let mut class = app();
        assert!(class.defined("items").unwrap());
        class.delete("items").unwrap();
        assert!(!class.defined("items").unwrap());
        assert_eq!(class.get("items[0].name").unwrap(), None);

        // Nothing resolves: no-op.
        class.delete("nothing.here").unwrap();
    }

    #[test]
    fn test_alias() {
        let mut class = app();
        assert!(class.alias("version", "legacyName").unwrap());
        assert_eq!(class.get("version").unwrap(), Some(json!("old")));

        assert!(!class.alias("version", "missing").unwrap());
        assert!(!class.alias("missing", "legacyName").unwrap());
    }

    #[test]
    fn test_serialize() {
        let class = app();
        let json = class.serialize("text/json", &SerializeOptions::default()).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed,
            json!({
                "name": "app",
                "version": "1.0",
                "items": [{ "name": "a", "extra": { "x": 1 } }],
            })
        );

        let dts = class
            .serialize("text/x.dts", &SerializeOptions::default().with_interface_name("App"))
            .unwrap();
        assert!(dts.starts_with("export interface App {"));
        assert!(dts.contains("\n    name: string;"));
        assert!(dts.contains("\n    port?: number;"));

        let err = class.serialize("text/html", &SerializeOptions::default()).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownMimetype(_)));
    }

    #[test]
    fn test_serialize_with_custom_serializer() {
        #[derive(Default)]
        struct Leaves(Vec<String>);

        impl Serializer for Leaves {
            fn object(&mut self, node: NodeRef<'_>) -> Result<()> {
                for child in node.children() {
                    self.property(child)?;
                }
                Ok(())
            }

            fn property(&mut self, node: NodeRef<'_>) -> Result<()> {
                node.serialize(self)
            }

            fn array(&mut self, node: NodeRef<'_>) -> Result<()> {
                for item in node.items() {
                    item.serialize(self)?;
                }
                Ok(())
            }

            fn output_value(&mut self, node: NodeRef<'_>) -> Result<()> {
                if node.defined() {
                    self.0.push(node.path());
                }
                Ok(())
            }
        }

        let class = app();
        let mut leaves = Leaves::default();
        class.serialize_with(&mut leaves).unwrap();
        assert_eq!(leaves.0, ["name", "version", "items[0].name"]);
    }

    #[test]
    fn test_dispose() {
        let class = app();
        assert!(class.root().defined());
        class.dispose();

        let mut layered = SchemaClass::with_fallbacks(
            &app_schema(),
            json!({ "name": "app" }),
            vec![json!({ "name": "base", "port": 1 })],
        )
        .unwrap();
        layered.set("port", json!(2)).unwrap();
        assert!(layered.arena.len() > layered.root().children().count());
        assert!(layered.fallback(0).is_some());
        layered.dispose();
    }
}
