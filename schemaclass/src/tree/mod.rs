//! The schema node tree.
//!
//! Every node of one [`SchemaClass`](crate::SchemaClass), across the primary
//! tree and all of its fallback trees, lives in a single [`Arena`]. Parent
//! and forward links are plain [`NodeId`] indices into that arena, so the
//! cyclic parent/child and tree/fallback relations need no reference
//! counting and tearing a tree down is dropping the arena.
//!
//! Topology is fixed after construction except for array items, which are
//! rebuilt whenever the array value is replaced. Their old slots go to a
//! free list and are reused by later builds.

mod node;

use std::sync::Arc;

use serde_json::{Map, Value};

use node::{ArrayState, LeafState, Node, NodeState, ObjectState, OneOfState};

use crate::{
    error::{Result, SchemaError, display_value},
    schema::{NodeType, Schema, SchemaKind},
    serializer::Serializer,
};

/// Index of a node inside its [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Owner of all nodes of one schema-class instance.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

impl Arena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live node slots.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }

    /// Read view of a node.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { arena: self, id }
    }

    pub(crate) fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                NodeId(slot)
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Return a subtree's slots to the free list.
    fn release(&mut self, id: NodeId) {
        let mut children = Vec::new();
        match &self.get(id).state {
            NodeState::Object(o) => children.extend(o.children.values().copied()),
            NodeState::Array(a) => {
                children.push(a.prototype);
                children.extend(a.items.iter().copied());
            }
            NodeState::OneOf(o) => children.extend(o.prototypes.iter().copied()),
            _ => {}
        }
        for child in children {
            self.release(child);
        }
        self.free.push(id.0);
    }

    /// Build the tree for `schema` holding `value`.
    ///
    /// The node structure is created first from the schema alone, then the
    /// value is assigned in init mode: nothing is marked dirty, read-only
    /// nodes accept it, and invalid enum members are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidValue`] when a required leaf receives a
    /// value it cannot convert.
    pub fn build(
        &mut self,
        schema: &Arc<Schema>,
        value: Option<&Value>,
        parent: Option<NodeId>,
        name: &str,
        forward: Option<NodeId>,
    ) -> Result<NodeId> {
        let id = self.build_structure(schema, parent, name, forward, false)?;
        if let Some(value) = value {
            self.set(id, Some(value.clone()), true, true)?;
        }
        Ok(id)
    }

    fn build_structure(
        &mut self,
        schema: &Arc<Schema>,
        parent: Option<NodeId>,
        name: &str,
        forward: Option<NodeId>,
        template: bool,
    ) -> Result<NodeId> {
        let placeholder = match &schema.kind {
            SchemaKind::Object(_) => NodeState::Object(ObjectState::default()),
            SchemaKind::OneOf { .. } => NodeState::OneOf(OneOfState::default()),
            SchemaKind::Array { .. } => NodeState::Array(ArrayState {
                prototype: NodeId(usize::MAX),
                items: Vec::new(),
            }),
            SchemaKind::String => NodeState::String(self.leaf_state(schema)),
            SchemaKind::Boolean => NodeState::Boolean(self.leaf_state(schema)),
            SchemaKind::Number => NodeState::Number(self.leaf_state(schema)),
            SchemaKind::Integer => NodeState::Integer(self.leaf_state(schema)),
            SchemaKind::Enum { .. } => NodeState::Enum(self.leaf_state(schema)),
        };
        let id = self.alloc(Node {
            name: name.to_string(),
            schema: schema.clone(),
            parent,
            forward,
            defined: false,
            cleared: false,
            dirty: false,
            template,
            state: placeholder,
        });
        trace!("built {} node {:?} at {:?}", schema.node_type(), name, id);

        match &schema.kind {
            SchemaKind::Object(object) => {
                for (key, child_schema) in &object.properties {
                    let child_forward = forward.and_then(|f| self.child(f, key));
                    let child =
                        self.build_structure(child_schema, Some(id), key, child_forward, template)?;
                    if let NodeState::Object(o) = &mut self.get_mut(id).state {
                        o.children.insert(key.clone(), child);
                    }
                }
            }
            SchemaKind::Array { items } => {
                let prototype = self.build_structure(items, Some(id), "", None, true)?;
                if let NodeState::Array(a) = &mut self.get_mut(id).state {
                    a.prototype = prototype;
                }
            }
            SchemaKind::OneOf { variants } => {
                for (i, variant) in variants.iter().enumerate() {
                    let variant_forward = forward.and_then(|f| match &self.get(f).state {
                        NodeState::OneOf(o) => o.prototypes.get(i).copied(),
                        _ => None,
                    });
                    let prototype =
                        self.build_structure(variant, Some(id), name, variant_forward, template)?;
                    if let NodeState::OneOf(o) = &mut self.get_mut(id).state {
                        o.prototypes.push(prototype);
                    }
                }
            }
            _ => {}
        }
        Ok(id)
    }

    fn leaf_state(&self, schema: &Schema) -> LeafState {
        LeafState {
            value: None,
            default: schema
                .default
                .as_ref()
                .and_then(|d| node::convert(schema, d)),
        }
    }

    /// Assign a value to a node.
    ///
    /// `None` stands for an undefined value. With `init` the write does not
    /// mark anything dirty and tolerates missing values; with `force` the
    /// read-only check is skipped. The whole value is validated before the
    /// tree is touched, so a failed call leaves the node as it was.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::SettingReadOnlyProperty`] for read-only nodes without `force`.
    /// - [`SchemaError::InvalidValue`] when a required node gets no usable value.
    /// - [`SchemaError::InvalidUpdateValue`] when an enum gets a non-member outside init.
    /// - [`SchemaError::MissingImplementation`] for schema-only prototype nodes.
    pub fn set(&mut self, id: NodeId, value: Option<Value>, init: bool, force: bool) -> Result<()> {
        let node = self.get(id);
        if node.template {
            return Err(SchemaError::MissingImplementation {
                name: self.path_of(id),
                node_type: node.state.node_type().to_string(),
            });
        }
        if node.schema.read_only && !force {
            return Err(SchemaError::SettingReadOnlyProperty {
                name: self.path_of(id),
            });
        }

        validate(
            &node.schema,
            value.as_ref(),
            self.required(id),
            init,
            &self.path_of(id),
        )?;
        self.assign(id, value, init)
    }

    /// Write an already validated value.
    ///
    /// Children of a replaced object or array are written in init mode: they
    /// are part of a fresh value, only the replaced node itself is dirty.
    fn assign(&mut self, id: NodeId, value: Option<Value>, init: bool) -> Result<()> {
        let changed = match self.get(id).state.node_type() {
            NodeType::Object => self.assign_object(id, value, init)?,
            NodeType::Array => self.assign_array(id, value, init)?,
            NodeType::OneOf => self.assign_one_of(id, value)?,
            NodeType::Enum => self.assign_enum(id, value),
            _ => self.assign_leaf(id, value),
        };

        if changed && !init {
            self.mark_dirty(id);
        }
        Ok(())
    }

    fn assign_leaf(&mut self, id: NodeId, value: Option<Value>) -> bool {
        let converted = value.as_ref().and_then(|v| node::convert(&self.get(id).schema, v));
        if converted.is_none() && value.is_some() {
            debug!(
                "dropping unconvertible value {} for `{}`",
                display_value(value.as_ref()),
                self.path_of(id)
            );
        }
        let node = self.get_mut(id);
        node.defined = converted.is_some();
        if let Some(leaf) = node.state.leaf_mut() {
            leaf.value = converted;
        }
        true
    }

    fn assign_enum(&mut self, id: NodeId, value: Option<Value>) -> bool {
        if let Some(v) = &value {
            if node::convert(&self.get(id).schema, v).is_none() {
                debug!("ignoring {v} for `{}`: not an enum member", self.path_of(id));
                return false;
            }
        }
        let node = self.get_mut(id);
        node.defined = value.is_some();
        if let Some(leaf) = node.state.leaf_mut() {
            leaf.value = value;
        }
        true
    }

    fn assign_object(&mut self, id: NodeId, value: Option<Value>, init: bool) -> Result<bool> {
        let map = match value {
            Some(Value::Object(map)) => map,
            other => {
                if other.is_some() {
                    debug!("dropping non-object value for `{}`", self.path_of(id));
                }
                self.destroy(id);
                self.get_mut(id).cleared = !init;
                return Ok(true);
            }
        };

        let open = self
            .get(id)
            .schema
            .as_object()
            .is_some_and(|o| o.additional_properties);
        let children: Vec<(String, NodeId)> = match &self.get(id).state {
            NodeState::Object(o) => o.children.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            _ => Vec::new(),
        };

        for (key, child) in &children {
            self.assign(*child, map.get(key).cloned(), true)?;
        }

        let mut extras = Map::new();
        for (key, v) in map {
            if children.iter().any(|(k, _)| *k == key) {
                continue;
            }
            if open {
                extras.insert(key, v);
            } else {
                debug!("ignoring unknown key `{key}` on frozen `{}`", self.path_of(id));
            }
        }

        let node = self.get_mut(id);
        node.defined = true;
        node.cleared = false;
        if let NodeState::Object(o) = &mut node.state {
            o.extras = extras;
        }
        Ok(true)
    }

    fn assign_array(&mut self, id: NodeId, value: Option<Value>, init: bool) -> Result<bool> {
        let elements = match value {
            Some(Value::Array(elements)) => elements,
            other => {
                if other.is_some() {
                    debug!("dropping non-array value for `{}`", self.path_of(id));
                }
                self.destroy(id);
                self.get_mut(id).cleared = !init;
                return Ok(true);
            }
        };

        let schema = self.get(id).schema.clone();
        let SchemaKind::Array { items: item_schema } = &schema.kind else {
            return Ok(false);
        };
        let forward_items: Vec<NodeId> = self
            .get(id)
            .forward
            .map(|f| match &self.get(f).state {
                NodeState::Array(a) => a.items.clone(),
                _ => Vec::new(),
            })
            .unwrap_or_default();

        let mut items = Vec::with_capacity(elements.len());
        for index in 0..elements.len() {
            let built = self.build_structure(
                item_schema,
                Some(id),
                &index.to_string(),
                forward_items.get(index).copied(),
                false,
            );
            match built {
                Ok(item) => items.push(item),
                Err(e) => {
                    for item in items {
                        self.release(item);
                    }
                    return Err(e);
                }
            }
        }

        let old_items = match &mut self.get_mut(id).state {
            NodeState::Array(a) => std::mem::replace(&mut a.items, items.clone()),
            _ => Vec::new(),
        };
        for item in old_items {
            self.release(item);
        }
        for (item, element) in items.into_iter().zip(elements) {
            self.assign(item, Some(element), true)?;
        }

        let node = self.get_mut(id);
        node.defined = true;
        node.cleared = false;
        Ok(true)
    }

    fn assign_one_of(&mut self, id: NodeId, value: Option<Value>) -> Result<bool> {
        let prototypes = match &self.get(id).state {
            NodeState::OneOf(o) => o.prototypes.clone(),
            _ => return Ok(false),
        };

        let Some(value) = value else {
            let node = self.get_mut(id);
            node.defined = false;
            if let NodeState::OneOf(o) = &mut node.state {
                o.current = None;
            }
            return Ok(true);
        };

        let selected = prototypes
            .into_iter()
            .find(|p| node::is_compatible(&self.get(*p).schema, &value));
        let Some(selected) = selected else {
            debug!("no oneOf candidate accepts {value} for `{}`", self.path_of(id));
            return Ok(false);
        };

        if let NodeState::OneOf(o) = &mut self.get_mut(id).state {
            o.current = Some(selected);
        }
        self.assign(selected, Some(value), true)?;
        Ok(true)
    }

    /// Clear a node's value without validation.
    ///
    /// Forwarded and default values become visible again.
    pub fn destroy(&mut self, id: NodeId) {
        let mut items = Vec::new();
        let mut children = Vec::new();
        let node = self.get_mut(id);
        node.defined = false;
        node.cleared = false;
        match &mut node.state {
            NodeState::Object(o) => {
                o.extras.clear();
                children.extend(o.children.values().copied());
            }
            NodeState::Array(a) => items = std::mem::take(&mut a.items),
            NodeState::OneOf(o) => {
                o.current = None;
                children.extend(o.prototypes.iter().copied());
            }
            state => {
                if let Some(leaf) = state.leaf_mut() {
                    leaf.value = None;
                }
            }
        }
        for child in children {
            self.destroy(child);
        }
        for item in items {
            self.release(item);
        }
    }

    /// Mark a node dirty and defined, and every ancestor too.
    ///
    /// Ancestors stop being cleared: they hold the written descendant.
    fn mark_dirty(&mut self, id: NodeId) {
        let node = self.get_mut(id);
        node.dirty = true;
        node.defined = true;
        let mut current = node.parent;
        while let Some(p) = current {
            let parent = self.get_mut(p);
            parent.dirty = true;
            parent.defined = true;
            parent.cleared = false;
            current = parent.parent;
        }
    }

    /// Write into the passthrough area of an open object.
    ///
    /// `fragments` is the path below `id`. The first fragment names a
    /// passthrough key; deeper fragments walk into that raw value. `None`
    /// removes the addressed entry. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownProperty`] when `id` is not an open
    /// object (a frozen object, a leaf, or a oneOf with no selected
    /// candidate), or when a value is written below a raw parent that does
    /// not exist.
    pub fn set_passthrough(
        &mut self,
        id: NodeId,
        fragments: &[String],
        value: Option<Value>,
    ) -> Result<bool> {
        let path = child_path(&self.path_of(id), &fragments.join("."));
        let owner = match &self.get(id).state {
            NodeState::OneOf(o) => match o.current {
                Some(current) => current,
                None => return Err(SchemaError::UnknownProperty { path }),
            },
            _ => id,
        };
        let open = self
            .get(owner)
            .schema
            .as_object()
            .is_some_and(|o| o.additional_properties);
        let Some((key, parents)) = fragments.split_last() else {
            return Ok(false);
        };
        if !open || self.child(owner, &fragments[0]).is_some() {
            return Err(SchemaError::UnknownProperty { path });
        }

        let writing = value.is_some();
        let NodeState::Object(object) = &mut self.get_mut(owner).state else {
            return Err(SchemaError::UnknownProperty { path });
        };
        let written = match parents.split_first() {
            None => match value {
                Some(v) => {
                    object.extras.insert(key.clone(), v);
                    true
                }
                None => object.extras.shift_remove(key).is_some(),
            },
            Some((first, rest)) => match object.extras.get_mut(first).and_then(|v| walk_mut(v, rest)) {
                Some(container) => assign(container, key, value),
                None => false,
            },
        };

        if written {
            let node = self.get_mut(owner);
            node.defined = true;
            node.cleared = false;
            self.mark_dirty(owner);
        } else if writing {
            debug!("passthrough parent of `{path}` does not exist");
            return Err(SchemaError::UnknownProperty { path });
        }
        Ok(written)
    }

    /// Declared child of an object node.
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match &self.get(id).state {
            NodeState::Object(o) => o.children.get(name).copied(),
            _ => None,
        }
    }

    /// Step from `id` along one path fragment.
    ///
    /// Objects index by name, arrays by integer, and oneOf nodes are
    /// transparent: the step is taken from the currently selected candidate.
    pub fn step(&self, id: NodeId, fragment: &str) -> Option<NodeId> {
        match &self.get(id).state {
            NodeState::Object(o) => o.children.get(fragment).copied(),
            NodeState::Array(a) => a.items.get(fragment.parse::<usize>().ok()?).copied(),
            NodeState::OneOf(o) => self.step(o.current?, fragment),
            _ => None,
        }
    }

    /// Whether the node was assigned a value of its own, even an explicit
    /// `undefined`. Defined nodes never read from forward or default values.
    pub fn defined(&self, id: NodeId) -> bool {
        let node = self.get(id);
        match &node.state {
            NodeState::OneOf(o) => node.defined || o.current.is_some_and(|c| self.defined(c)),
            _ => node.defined,
        }
    }

    /// Whether the node holds concrete data of its own, as opposed to being
    /// undefined or explicitly set to undefined.
    pub fn has_value(&self, id: NodeId) -> bool {
        let node = self.get(id);
        if node.cleared || !self.defined(id) {
            return false;
        }
        match &node.state {
            NodeState::Object(_) | NodeState::Array(_) => true,
            NodeState::OneOf(o) => o.current.is_some_and(|c| self.has_value(c)),
            state => state.leaf().is_some_and(|l| l.value.is_some()),
        }
    }

    /// Whether the parent lists this node as required.
    pub fn required(&self, id: NodeId) -> bool {
        let node = self.get(id);
        let Some(parent) = node.parent else {
            return false;
        };
        let parent_node = self.get(parent);
        match &parent_node.state {
            NodeState::Object(_) => parent_node
                .schema
                .as_object()
                .is_some_and(|o| o.is_required(&node.name)),
            NodeState::OneOf(_) => self.required(parent),
            _ => false,
        }
    }

    /// Current value, falling back to the forward node and then the schema default.
    ///
    /// Only undefined nodes fall back; a node explicitly set to undefined
    /// reads as `None`.
    pub fn value(&self, id: NodeId) -> Option<Value> {
        let node = self.get(id);
        if node.cleared {
            return None;
        }
        let fallback = || {
            node.forward
                .and_then(|f| self.value(f))
                .or_else(|| node.schema.default.clone())
        };

        match &node.state {
            NodeState::Object(o) => {
                let mut map = match (node.defined, fallback()) {
                    (false, Some(Value::Object(base))) => base,
                    _ => Map::new(),
                };
                let open = node
                    .schema
                    .as_object()
                    .is_some_and(|s| s.additional_properties);
                if !open {
                    map.retain(|k, _| o.children.contains_key(k));
                }
                for (key, child) in &o.children {
                    match self.value(*child) {
                        Some(v) => {
                            map.insert(key.clone(), v);
                        }
                        None => {
                            map.remove(key);
                        }
                    }
                }
                for (key, v) in &o.extras {
                    if !o.children.contains_key(key) {
                        map.insert(key.clone(), v.clone());
                    }
                }
                (node.defined || !map.is_empty()).then_some(Value::Object(map))
            }
            NodeState::Array(a) => {
                if node.defined {
                    Some(Value::Array(
                        a.items
                            .iter()
                            .map(|i| self.value(*i).unwrap_or(Value::Null))
                            .collect(),
                    ))
                } else {
                    fallback()
                }
            }
            NodeState::OneOf(o) => match o.current {
                Some(current) => self.value(current),
                None if node.defined => None,
                None => fallback(),
            },
            state => match state.leaf() {
                Some(leaf) if node.defined => leaf.value.clone(),
                Some(leaf) => node
                    .forward
                    .and_then(|f| self.value(f))
                    .or_else(|| leaf.default.clone()),
                None => None,
            },
        }
    }

    /// Human readable location of a node, `a.b[2].c` style.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let node = self.get(c);
            let Some(parent) = node.parent else {
                break;
            };
            match &self.get(parent).state {
                NodeState::Array(_) => parts.push(format!("[{}]", node.name)),
                NodeState::OneOf(_) => {}
                _ => parts.push(node.name.clone()),
            }
            current = Some(parent);
        }

        let mut out = String::new();
        for part in parts.iter().rev() {
            if !out.is_empty() && !part.starts_with('[') {
                out.push('.');
            }
            out.push_str(part);
        }
        out
    }
}

/// Check `value` against the assignment rules of `schema` without touching
/// any node, so that a rejected write leaves the tree unchanged.
///
/// Mirrors what assignment does: object properties inherit `init`, array
/// items are never required, and a oneOf checks the candidate that would be
/// selected.
fn validate(
    schema: &Schema,
    value: Option<&Value>,
    required: bool,
    init: bool,
    path: &str,
) -> Result<()> {
    let missing = |value: Option<&Value>| {
        if required && (value.is_some() || !init) {
            Err(SchemaError::invalid_value(path, value))
        } else {
            Ok(())
        }
    };

    match &schema.kind {
        SchemaKind::Object(object) => match value {
            Some(Value::Object(map)) => {
                for (key, child) in &object.properties {
                    validate(
                        child,
                        map.get(key),
                        object.is_required(key),
                        init,
                        &child_path(path, key),
                    )?;
                }
                Ok(())
            }
            other => missing(other),
        },
        SchemaKind::Array { items } => match value {
            Some(Value::Array(elements)) => {
                for (i, element) in elements.iter().enumerate() {
                    validate(items, Some(element), false, init, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            other => missing(other),
        },
        SchemaKind::OneOf { variants } => {
            let Some(v) = value else {
                return missing(None);
            };
            match variants.iter().find(|c| node::is_compatible(c, v)) {
                Some(selected) => validate(selected, value, required, init, path),
                None => Ok(()),
            }
        }
        SchemaKind::Enum { values } => match value {
            None => missing(None),
            Some(v) if init || values.contains(v) => Ok(()),
            Some(v) => Err(SchemaError::InvalidUpdateValue {
                name: path.to_string(),
                value: v.to_string(),
                allowed: Value::Array(values.clone()).to_string(),
            }),
        },
        _ => match value.and_then(|v| node::convert(schema, v)) {
            Some(_) => Ok(()),
            None => missing(value),
        },
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Walk a raw value along path fragments.
pub(crate) fn walk<'v>(value: &'v Value, fragments: &[String]) -> Option<&'v Value> {
    fragments.iter().try_fold(value, |current, fragment| match current {
        Value::Object(map) => map.get(fragment),
        Value::Array(items) => items.get(fragment.parse::<usize>().ok()?),
        _ => None,
    })
}

fn walk_mut<'v>(value: &'v mut Value, fragments: &[String]) -> Option<&'v mut Value> {
    fragments.iter().try_fold(value, |current, fragment| match current {
        Value::Object(map) => map.get_mut(fragment),
        Value::Array(items) => items.get_mut(fragment.parse::<usize>().ok()?),
        _ => None,
    })
}

fn assign(container: &mut Value, key: &str, value: Option<Value>) -> bool {
    match (container, value) {
        (Value::Object(map), Some(v)) => {
            map.insert(key.to_string(), v);
            true
        }
        (Value::Object(map), None) => map.shift_remove(key).is_some(),
        (Value::Array(items), Some(v)) => match key.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items[i] = v;
                true
            }
            Ok(i) if i == items.len() => {
                items.push(v);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Borrowed read view of one node.
///
/// Serializers receive `NodeRef`s and walk the tree through them.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    arena: &'a Arena,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn with(&self, id: NodeId) -> NodeRef<'a> {
        NodeRef {
            arena: self.arena,
            id,
        }
    }

    fn inner(&self) -> &'a Node {
        self.arena.get(self.id)
    }

    /// Arena index of the node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Key within the parent.
    pub fn name(&self) -> &'a str {
        &self.inner().name
    }

    /// Kind of node, mirroring the schema entry it was built from.
    pub fn node_type(&self) -> NodeType {
        self.inner().state.node_type()
    }

    /// Schema entry the node was built from.
    pub fn schema(&self) -> &'a Schema {
        &self.inner().schema
    }

    /// Resolved value, including forwarded and default values.
    pub fn value(&self) -> Option<Value> {
        self.arena.value(self.id)
    }

    /// Whether the node was assigned a value of its own.
    pub fn defined(&self) -> bool {
        self.arena.defined(self.id)
    }

    /// Whether the node holds concrete data of its own.
    ///
    /// Writers use this to skip undefined nodes and nodes explicitly set to
    /// undefined.
    pub fn has_value(&self) -> bool {
        self.arena.has_value(self.id)
    }

    /// Whether the node or a descendant was written after construction.
    pub fn dirty(&self) -> bool {
        self.inner().dirty
    }

    /// Whether the schema marks the node `readOnly`.
    pub fn read_only(&self) -> bool {
        self.inner().schema.read_only
    }

    /// Whether the parent object lists the node as required.
    pub fn required(&self) -> bool {
        self.arena.required(self.id)
    }

    /// Schema `description`, if any.
    pub fn description(&self) -> Option<&'a str> {
        self.inner().schema.description.as_deref()
    }

    /// Whether this is an object that accepts no keys beyond its declared properties.
    pub fn frozen(&self) -> bool {
        self.inner()
            .schema
            .as_object()
            .is_some_and(|o| !o.additional_properties)
    }

    /// Location of the node, `a.b[2].c` style.
    pub fn path(&self) -> String {
        self.arena.path_of(self.id)
    }

    /// Containing node, `None` at the root.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.inner().parent.map(|p| self.with(p))
    }

    /// The equivalent node of the next fallback tree.
    pub fn forward(&self) -> Option<NodeRef<'a>> {
        self.inner().forward.map(|f| self.with(f))
    }

    /// Declared children of an object, in schema order.
    pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let this = self;
        let children = match &self.inner().state {
            NodeState::Object(o) => Some(o.children.values()),
            _ => None,
        };
        children.into_iter().flatten().map(move |id| this.with(*id))
    }

    /// Declared child of an object by name.
    pub fn child(&self, name: &str) -> Option<NodeRef<'a>> {
        self.arena.child(self.id, name).map(|c| self.with(c))
    }

    /// Live items of an array, or the candidate prototypes of a oneOf.
    pub fn items(self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let this = self;
        let items: &'a [NodeId] = match &self.inner().state {
            NodeState::Array(a) => &a.items,
            NodeState::OneOf(o) => &o.prototypes,
            _ => &[],
        };
        items.iter().map(move |id| this.with(*id))
    }

    /// Schema-only node describing the elements of an array.
    pub fn item_prototype(&self) -> Option<NodeRef<'a>> {
        match &self.inner().state {
            NodeState::Array(a) => Some(self.with(a.prototype)),
            _ => None,
        }
    }

    /// Currently selected candidate of a oneOf.
    pub fn current(&self) -> Option<NodeRef<'a>> {
        match &self.inner().state {
            NodeState::OneOf(o) => o.current.map(|c| self.with(c)),
            _ => None,
        }
    }

    /// Allowed values of an enum node.
    pub fn enum_values(&self) -> &'a [Value] {
        match &self.inner().schema.kind {
            SchemaKind::Enum { values } => values,
            _ => &[],
        }
    }

    /// Passthrough keys of an open object.
    pub fn extras(&self) -> Option<&'a Map<String, Value>> {
        match &self.inner().state {
            NodeState::Object(o) => Some(&o.extras),
            _ => None,
        }
    }

    /// Hand this node to the matching serializer callback.
    pub fn serialize<S: Serializer + ?Sized>(&self, serializer: &mut S) -> Result<()> {
        match self.node_type() {
            NodeType::Object => serializer.object(*self),
            NodeType::Array => serializer.array(*self),
            NodeType::String => serializer.output_string(*self),
            NodeType::Number | NodeType::Integer => serializer.output_number(*self),
            NodeType::Boolean => serializer.output_boolean(*self),
            NodeType::Enum => serializer.output_enum(*self),
            NodeType::OneOf => serializer.output_one_of(*self),
        }
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.path())
            .field("type", &self.node_type())
            .field("value", &self.value())
            .finish()
    }
}
