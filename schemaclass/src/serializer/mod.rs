//! Tree serializers.
//!
//! A [`Serializer`] has one callback per node shape. Each node picks exactly
//! one of them in [`NodeRef::serialize`], so a new output format is a new
//! `Serializer` implementation and never a change to the tree.
//!
//! Two formats are built in, selected by [`Mimetype`]:
//!
//! - [`json::JsonSerializer`] writes the tree's own data as JSON text.
//! - [`dts::DtsSerializer`] writes a TypeScript interface describing the schema.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SchemaError},
    tree::NodeRef,
};

/// JSON text output.
pub mod json;

/// TypeScript interface output.
pub mod dts;

pub use dts::DtsSerializer;
pub use json::JsonSerializer;

/// Visitor over a schema-class tree.
///
/// Only the structural callbacks and [`output_value`](Serializer::output_value)
/// are mandatory. The typed leaf callbacks fall back to `output_value`.
pub trait Serializer {
    /// Called once before the root node.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once after the root node.
    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    /// An object node. Implementations usually call [`Serializer::property`]
    /// for each child.
    fn object(&mut self, node: NodeRef<'_>) -> Result<()>;

    /// A named child of an object.
    fn property(&mut self, node: NodeRef<'_>) -> Result<()>;

    /// An array node.
    fn array(&mut self, node: NodeRef<'_>) -> Result<()>;

    /// Any node without a more specific callback.
    fn output_value(&mut self, node: NodeRef<'_>) -> Result<()>;

    fn output_one_of(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.output_value(node)
    }

    fn output_enum(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.output_value(node)
    }

    fn output_string(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.output_value(node)
    }

    fn output_number(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.output_value(node)
    }

    fn output_boolean(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.output_value(node)
    }
}

/// Run a serializer over the tree rooted at `root`.
///
/// # Errors
///
/// Propagates any error raised by the serializer callbacks.
pub fn drive<S: Serializer + ?Sized>(root: NodeRef<'_>, serializer: &mut S) -> Result<()> {
    serializer.start()?;
    root.serialize(serializer)?;
    serializer.end()
}

/// Output formats known to [`SchemaClass::serialize`](crate::SchemaClass::serialize).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mimetype {
    /// `application/json`, `text/json`
    Json,
    /// `text/x.typescript`, `text/x.dts`
    TypeDeclaration,
}

impl FromStr for Mimetype {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "application/json" | "text/json" => Ok(Mimetype::Json),
            "text/x.typescript" | "text/x.dts" => Ok(Mimetype::TypeDeclaration),
            other => Err(SchemaError::UnknownMimetype(other.to_string())),
        }
    }
}

impl fmt::Display for Mimetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mimetype::Json => f.write_str("application/json"),
            Mimetype::TypeDeclaration => f.write_str("text/x.typescript"),
        }
    }
}

impl Mimetype {
    /// Serialize the tree rooted at `root` in this format.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize(&self, root: NodeRef<'_>, options: &SerializeOptions) -> Result<String> {
        match self {
            Mimetype::Json => {
                let mut serializer =
                    JsonSerializer::new(options.indent.unwrap_or(JsonSerializer::DEFAULT_INDENT));
                drive(root, &mut serializer)?;
                Ok(serializer.into_inner())
            }
            Mimetype::TypeDeclaration => {
                let mut serializer = DtsSerializer::new(
                    options.interface_name.clone(),
                    options.indent.unwrap_or(DtsSerializer::DEFAULT_INDENT),
                );
                drive(root, &mut serializer)?;
                Ok(serializer.into_inner())
            }
        }
    }
}

/// Serializer settings.
///
/// Deserializable so they can live in a config file next to the data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializeOptions {
    /// Indentation width, `0` for compact output. `None` picks the
    /// format's default (2 for JSON, 4 for declarations).
    pub indent: Option<usize>,
    /// Name of the generated interface. Without it an anonymous
    /// `interface _` with a default export is emitted.
    pub interface_name: Option<String>,
}

impl SerializeOptions {
    /// Options with an explicit indentation width.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }

    /// Options with a named interface.
    pub fn with_interface_name(mut self, name: impl Into<String>) -> Self {
        self.interface_name = Some(name.into());
        self
    }
}

/// Per-nesting-level serializer state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    /// Nothing emitted at this level yet.
    pub empty: bool,
    /// Currently writing the value of a property.
    pub property: bool,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            empty: true,
            property: false,
        }
    }
}
