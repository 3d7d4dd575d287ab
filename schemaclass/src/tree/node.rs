//! Node storage and leaf value coercion.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use super::NodeId;
use crate::schema::{NodeType, Schema, SchemaKind};

/// One live node of a schema-class tree.
#[derive(Debug)]
pub(crate) struct Node {
    /// Key within the parent. Empty for roots and item prototypes.
    pub name: String,
    pub schema: Arc<Schema>,
    /// Non-owning back-reference.
    pub parent: Option<NodeId>,
    /// Equivalent node in the next lower-priority tree.
    pub forward: Option<NodeId>,
    /// Holds a value of its own. Forced on by `dirty`.
    pub defined: bool,
    /// Explicitly set to undefined, hiding forwarded and default values.
    pub cleared: bool,
    pub dirty: bool,
    /// Schema-only node that never holds live data (array item prototype).
    pub template: bool,
    pub state: NodeState,
}

/// Per-kind node state.
#[derive(Debug)]
pub(crate) enum NodeState {
    Object(ObjectState),
    Array(ArrayState),
    String(LeafState),
    Boolean(LeafState),
    Number(LeafState),
    Integer(LeafState),
    Enum(LeafState),
    OneOf(OneOfState),
}

#[derive(Debug, Default)]
pub(crate) struct ObjectState {
    pub children: IndexMap<String, NodeId>,
    /// Passthrough keys of an open object.
    pub extras: Map<String, Value>,
}

#[derive(Debug)]
pub(crate) struct ArrayState {
    pub prototype: NodeId,
    pub items: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub(crate) struct LeafState {
    pub value: Option<Value>,
    /// Schema default, already converted.
    pub default: Option<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct OneOfState {
    /// One candidate per `oneOf` entry, in declaration order.
    pub prototypes: Vec<NodeId>,
    pub current: Option<NodeId>,
}

impl NodeState {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeState::Object(_) => NodeType::Object,
            NodeState::Array(_) => NodeType::Array,
            NodeState::String(_) => NodeType::String,
            NodeState::Boolean(_) => NodeType::Boolean,
            NodeState::Number(_) => NodeType::Number,
            NodeState::Integer(_) => NodeType::Integer,
            NodeState::Enum(_) => NodeType::Enum,
            NodeState::OneOf(_) => NodeType::OneOf,
        }
    }

    pub fn leaf(&self) -> Option<&LeafState> {
        match self {
            NodeState::String(l)
            | NodeState::Boolean(l)
            | NodeState::Number(l)
            | NodeState::Integer(l)
            | NodeState::Enum(l) => Some(l),
            _ => None,
        }
    }

    pub fn leaf_mut(&mut self) -> Option<&mut LeafState> {
        match self {
            NodeState::String(l)
            | NodeState::Boolean(l)
            | NodeState::Number(l)
            | NodeState::Integer(l)
            | NodeState::Enum(l) => Some(l),
            _ => None,
        }
    }
}

/// Whether `value` carries the runtime type the schema expects.
///
/// OneOf dispatch picks the first candidate for which this holds.
pub(crate) fn is_compatible(schema: &Schema, value: &Value) -> bool {
    match &schema.kind {
        SchemaKind::Object(_) => value.is_object(),
        SchemaKind::Array { .. } => value.is_array(),
        SchemaKind::String => value.is_string(),
        SchemaKind::Boolean => value.is_boolean(),
        SchemaKind::Number | SchemaKind::Integer => value.is_number(),
        SchemaKind::Enum { values } => values.contains(value),
        SchemaKind::OneOf { variants } => variants.iter().any(|v| is_compatible(v, value)),
    }
}

/// Coerce `value` for a leaf schema. `None` means no usable value.
///
/// `null` is kept as a literal on every non-enum leaf.
pub(crate) fn convert(schema: &Schema, value: &Value) -> Option<Value> {
    if let SchemaKind::Enum { values } = &schema.kind {
        return values.contains(value).then(|| value.clone());
    }
    if value.is_null() {
        return Some(Value::Null);
    }
    match &schema.kind {
        SchemaKind::String => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        SchemaKind::Boolean => Some(Value::Bool(truthy(value))),
        SchemaKind::Number => match value {
            Value::Number(n) => Some(Value::Number(n.clone())),
            other => to_number(other).and_then(number_value),
        },
        SchemaKind::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Value::Number(n.clone())),
            other => to_number(other).map(f64::floor).and_then(number_value),
        },
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        _ => None,
    }
}

/// Integral floats are stored as integers so that `2` stays `2` in JSON.
fn number_value(f: f64) -> Option<Value> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE {
        Some(Value::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}
