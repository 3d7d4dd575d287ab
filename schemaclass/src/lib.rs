//! # schemaclass
//!
//! Typed configuration trees driven by JSON Schema.
//!
//! A [`SchemaClass`] is built from a JSON Schema document and one or more
//! JSON values. It mirrors the schema as a tree of typed nodes, converts
//! and validates values as they are assigned, tracks which parts were
//! modified, and reads undefined fields from lower-priority fallback values
//! or schema defaults.
//!
//! ## Features
//!
//! - Node kinds for object, array, string, boolean, number, integer, enum and oneOf
//! - Dotted and bracketed path access: `build.targets[0].name`
//! - Fallback chains: a project config backed by a global one
//! - Streaming serializers for JSON and TypeScript interface declarations
//! - TOML and JSON config files with automatic backup on save
//! - Schemas generated from Rust types with `schemars`
//!
//! ## Quick Start
//!
//! ```rust
//! use schemaclass::{SchemaClass, SerializeOptions};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": {
//!         "name": { "type": "string" },
//!         "tags": { "type": "array", "items": { "type": "string" } },
//!     },
//! });
//!
//! let mut class = SchemaClass::new(&schema, json!({ "name": "app" })).unwrap();
//! class.set("tags", json!(["cli"])).unwrap();
//!
//! let text = class.serialize("application/json", &SerializeOptions::default()).unwrap();
//! assert_eq!(text, "{\n  \"name\": \"app\",\n  \"tags\": [\n    \"cli\"\n  ]\n}\n");
//! ```
//!
//! ## Modules
//!
//! - [`schema`] - Parsing JSON Schema documents
//! - [`tree`] - The node arena and its read views
//! - [`serializer`] - Output formats
//! - [`config`] - Loading and saving config files

#[macro_use]
extern crate log;

mod class;
mod error;
mod path;
mod typed;

/// Loading and saving config files.
pub mod config;

/// JSON Schema parsing.
pub mod schema;

/// Output formats.
pub mod serializer;

/// Arena-backed node tree.
pub mod tree;

pub use class::{PropertyDescriptor, SchemaClass};
pub use config::ConfigFile;
pub use error::{Result, SchemaError};
pub use path::parse_json_path;
pub use schema::{NodeType, Schema};
pub use serializer::{Mimetype, SerializeOptions, Serializer};
pub use serde_json::Value;
pub use tree::{NodeId, NodeRef};
