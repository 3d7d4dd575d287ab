//! JSON writer.
//!
//! Only data the tree holds itself is written: undefined nodes and nodes
//! explicitly set to undefined are skipped, and forwarded and default
//! values never appear. The output
//! is built in a single pass, tracking per nesting level whether anything
//! was emitted yet so commas land only between emitted siblings.

use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};

use super::{Frame, Serializer};
use crate::{error::Result, tree::NodeRef};

/// Streams a schema-class tree as JSON text.
pub struct JsonSerializer {
    out: String,
    indent: usize,
    state: Vec<Frame>,
}

impl JsonSerializer {
    /// Indentation used when none is configured.
    pub const DEFAULT_INDENT: usize = 2;

    /// Create a serializer. `indent == 0` produces compact single-line output.
    pub fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
            state: Vec::new(),
        }
    }

    /// Accumulated output.
    pub fn into_inner(self) -> String {
        self.out
    }

    fn will_output_value(&mut self) {
        let Some(top) = self.state.last_mut() else {
            return;
        };
        let was_empty = top.empty;
        let property = top.property;
        top.empty = false;
        if !property {
            if !was_empty {
                self.out.push(',');
            }
            self.write_indent();
        }
    }

    fn write_indent(&mut self) {
        if self.indent == 0 {
            return;
        }
        self.out.push('\n');
        self.out
            .extend(std::iter::repeat_n(' ', self.state.len() * self.indent));
    }

    fn write_key(&mut self, key: &str) -> Result<()> {
        self.out.push_str(&serde_json::to_string(key)?);
        self.out.push_str(if self.indent == 0 { ":" } else { ": " });
        Ok(())
    }

    /// Write a raw value, indented to the current nesting depth.
    fn write_value(&mut self, value: &Value) -> Result<()> {
        if self.indent == 0 {
            self.out.push_str(&serde_json::to_string(value)?);
            return Ok(());
        }

        let pad = " ".repeat(self.indent);
        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(pad.as_bytes()));
        value.serialize(&mut ser)?;
        let text = String::from_utf8_lossy(&buf);

        let margin = format!("\n{}", " ".repeat(self.state.len() * self.indent));
        self.out.push_str(&text.replace('\n', &margin));
        Ok(())
    }

    fn with_property<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        if let Some(top) = self.state.last_mut() {
            top.property = true;
        }
        let res = f(self);
        if let Some(top) = self.state.last_mut() {
            top.property = false;
        }
        res
    }
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INDENT)
    }
}

impl Serializer for JsonSerializer {
    fn end(&mut self) -> Result<()> {
        if self.indent > 0 && !self.out.is_empty() {
            self.out.push('\n');
        }
        Ok(())
    }

    fn object(&mut self, node: NodeRef<'_>) -> Result<()> {
        if !node.has_value() {
            return Ok(());
        }
        self.will_output_value();
        self.out.push('{');
        self.state.push(Frame::default());

        for child in node.children() {
            self.property(child)?;
        }
        if !node.frozen() {
            if let Some(extras) = node.extras() {
                for (key, value) in extras {
                    if node.child(key).is_some() {
                        continue;
                    }
                    self.will_output_value();
                    self.write_key(key)?;
                    self.write_value(value)?;
                }
            }
        }

        let frame = self.state.pop().unwrap_or_default();
        if !frame.empty {
            self.write_indent();
        }
        self.out.push('}');
        Ok(())
    }

    fn property(&mut self, node: NodeRef<'_>) -> Result<()> {
        if !node.has_value() {
            return Ok(());
        }
        self.will_output_value();
        self.write_key(node.name())?;
        self.with_property(|s| node.serialize(s))
    }

    fn array(&mut self, node: NodeRef<'_>) -> Result<()> {
        if !node.has_value() {
            return Ok(());
        }
        self.will_output_value();
        if node.items().next().is_none() {
            self.out.push_str("[]");
            return Ok(());
        }

        self.out.push('[');
        self.state.push(Frame::default());
        for item in node.items() {
            item.serialize(self)?;
        }
        let frame = self.state.pop().unwrap_or_default();
        if !frame.empty {
            self.write_indent();
        }
        self.out.push(']');
        Ok(())
    }

    fn output_value(&mut self, node: NodeRef<'_>) -> Result<()> {
        if !node.has_value() {
            return Ok(());
        }
        let Some(value) = node.value() else {
            return Ok(());
        };
        self.will_output_value();
        self.write_value(&value)
    }
}
