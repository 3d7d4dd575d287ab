//! TypeScript interface generator.
//!
//! Describes the schema rather than the data: every declared property is
//! written whether or not it holds a value, arrays are rendered from their
//! item prototype and oneOf nodes from all of their candidates.

use super::{Frame, Serializer};
use crate::{error::Result, tree::NodeRef};

/// Streams a schema-class tree as a TypeScript interface declaration.
pub struct DtsSerializer {
    out: String,
    indent: usize,
    interface_name: Option<String>,
    state: Vec<Frame>,
}

impl DtsSerializer {
    /// Indentation used when none is configured.
    pub const DEFAULT_INDENT: usize = 4;

    /// Create a serializer.
    ///
    /// Without `interface_name` the output is `interface _ { ... }` followed
    /// by `export default _;`. `indent == 0` disables pretty printing.
    pub fn new(interface_name: Option<String>, indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
            interface_name,
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
        top.empty = false;
        if !top.property {
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

    fn write_comment(&mut self, description: &str) {
        self.out.push_str("/**");
        self.write_indent();
        for line in description.lines() {
            self.out.push_str(" * ");
            self.out.push_str(line);
            self.write_indent();
        }
        self.out.push_str(" */");
        self.write_indent();
    }
}

impl Serializer for DtsSerializer {
    fn start(&mut self) -> Result<()> {
        match &self.interface_name {
            Some(name) => {
                self.out.push_str("export interface ");
                self.out.push_str(name);
                self.out.push(' ');
            }
            None => self.out.push_str("interface _ "),
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.indent > 0 {
            self.out.push('\n');
        }
        if self.interface_name.is_none() {
            self.out.push_str("export default _;\n");
        }
        Ok(())
    }

    fn object(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        self.out.push('{');
        self.state.push(Frame::default());

        for child in node.children() {
            self.property(child)?;
        }
        if !node.frozen() {
            self.will_output_value();
            self.out.push_str("[name: string]: any;");
        }

        let frame = self.state.pop().unwrap_or_default();
        if !frame.empty {
            self.write_indent();
        }
        self.out.push('}');
        Ok(())
    }

    fn property(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        if let Some(description) = node.description() {
            self.write_comment(description);
        }
        self.out.push_str(&property_key(node.name()));
        if !node.required() {
            self.out.push('?');
        }
        self.out.push_str(": ");

        if let Some(top) = self.state.last_mut() {
            top.property = true;
        }
        let res = node.serialize(self);
        if let Some(top) = self.state.last_mut() {
            top.property = false;
        }
        res?;

        self.out.push(';');
        Ok(())
    }

    fn array(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        match node.item_prototype() {
            Some(prototype) => prototype.serialize(self)?,
            None => self.out.push_str("any"),
        }
        self.out.push_str("[]");
        Ok(())
    }

    fn output_one_of(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        self.out.push('(');
        for (i, candidate) in node.items().enumerate() {
            if i > 0 {
                self.out.push_str(" | ");
            }
            candidate.serialize(self)?;
        }
        self.out.push(')');
        Ok(())
    }

    fn output_enum(&mut self, node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        self.out.push('(');
        for (i, value) in node.enum_values().iter().enumerate() {
            if i > 0 {
                self.out.push_str(" | ");
            }
            self.out.push_str(&serde_json::to_string(value)?);
        }
        self.out.push(')');
        Ok(())
    }

    fn output_string(&mut self, _node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        self.out.push_str("string");
        Ok(())
    }

    fn output_number(&mut self, _node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        self.out.push_str("number");
        Ok(())
    }

    fn output_boolean(&mut self, _node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        self.out.push_str("boolean");
        Ok(())
    }

    fn output_value(&mut self, _node: NodeRef<'_>) -> Result<()> {
        self.will_output_value();
        self.out.push_str("any");
        Ok(())
    }
}

/// Quote property names that are not plain identifiers.
fn property_key(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{schema::Schema, serializer::drive, tree::Arena};

    fn to_dts(schema: Value, name: Option<&str>, indent: usize) -> String {
        let schema = Schema::parse(&schema).unwrap();
        let mut arena = Arena::new();
        let root = arena.build(&schema, None, None, "", None).unwrap();
        let mut serializer = DtsSerializer::new(name.map(str::to_string), indent);
        drive(arena.node(root), &mut serializer).unwrap();
        serializer.into_inner()
    }

    #[test]
    fn test_named_interface() {
        let out = to_dts(
            json!({
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string", "description": "Project name" },
                    "port": { "type": "integer" },
                    "build": {
                        "type": "object",
                        "additionalProperties": true,
                        "properties": { "release": { "type": "boolean" } },
                    },
                },
            }),
            Some("Config"),
            4,
        );
        let expected = "\
export interface Config {
    /**
     * Project name
     */
    name: string;
    port?: number;
    build?: {
        release?: boolean;
        [name: string]: any;
    };
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_anonymous_interface() {
        let out = to_dts(
            json!({
                "type": "object",
                "properties": { "tags": { "type": "array", "items": { "type": "string" } } },
            }),
            None,
            2,
        );
        assert_eq!(out, "interface _ {\n  tags?: string[];\n}\nexport default _;\n");
    }

    #[test]
    fn test_unions_and_enums() {
        let out = to_dts(
            json!({
                "type": "object",
                "required": ["assets", "mode"],
                "properties": {
                    "assets": {
                        "oneOf": [
                            { "type": "string" },
                            { "type": "array", "items": { "type": "string" } },
                        ],
                    },
                    "mode": { "enum": ["dev", "prod", 3] },
                    "with-dash": { "type": "number" },
                },
            }),
            Some("Options"),
            0,
        );
        assert_eq!(
            out,
            "export interface Options {assets: (string | string[]);mode: (\"dev\" | \"prod\" | 3);\"with-dash\"?: number;}"
        );
    }

    #[test]
    fn test_property_key_quoting() {
        assert_eq!(property_key("name"), "name");
        assert_eq!(property_key("$schema"), "$schema");
        assert_eq!(property_key("with-dash"), "\"with-dash\"");
        assert_eq!(property_key("1st"), "\"1st\"");
    }
}
