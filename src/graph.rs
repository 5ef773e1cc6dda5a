//! Loaded object graphs.
//!
//! Repositories hand back their results as an [`ObjectGraph`]: an arena of
//! entity nodes addressed by [`NodeId`]. A node that is reachable from several
//! places (a page referenced by its lines, a book shared by two list rows) is
//! stored once and referenced by id, so cycles need no special handling.
//!
//! Every relation slot carries a `populated` flag. The population adjuster
//! sets it, [`ObjectGraph::render`] reads it.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::schema::Schema;

/// Index of a node inside its [`ObjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What a relation slot currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationValue {
    /// Loaded to-many collection
    Collection(Vec<NodeId>),
    /// To-one reference, `None` when the foreign key is null
    Reference(Option<NodeId>),
    /// Embedded object, `None` when absent
    Embedded(Option<NodeId>),
    /// Declared but never loaded
    Unloaded,
}

impl RelationValue {
    /// Nodes directly held by this slot
    #[must_use]
    pub fn targets(&self) -> Vec<NodeId> {
        match self {
            Self::Collection(items) => items.clone(),
            Self::Reference(Some(id)) | Self::Embedded(Some(id)) => vec![*id],
            Self::Reference(None) | Self::Embedded(None) | Self::Unloaded => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSlot {
    pub value: RelationValue,
    pub populated: bool,
}

impl RelationSlot {
    #[must_use]
    pub fn new(value: RelationValue) -> Self {
        let populated = !matches!(value, RelationValue::Unloaded);
        Self { value, populated }
    }
}

/// One loaded entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub entity: String,
    pub fields: Map<String, Value>,
    pub relations: BTreeMap<String, RelationSlot>,
}

impl Node {
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationSlot> {
        self.relations.get(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGraph {
    nodes: Vec<Node>,
    /// `(entity, key)` of nodes added through [`ObjectGraph::add_keyed`]
    keys: HashMap<(String, String), NodeId>,
}

impl ObjectGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node with scalar fields and no relation slots.
    pub fn add(&mut self, entity: impl Into<String>, fields: Map<String, Value>) -> NodeId {
        self.nodes.push(Node {
            entity: entity.into(),
            fields,
            relations: BTreeMap::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Add a node from a JSON object; anything else becomes a node without
    /// scalar fields.
    pub fn add_value(&mut self, entity: impl Into<String>, value: Value) -> NodeId {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.add(entity, fields)
    }

    /// Add a node unless one of the same entity with the same `key_field`
    /// value already exists, in which case that node is returned.
    pub fn add_keyed(&mut self, entity: &str, key_field: &str, value: Value) -> NodeId {
        let key = value.get(key_field).filter(|key| !key.is_null()).map(ToString::to_string);
        let Some(key) = key else {
            return self.add_value(entity, value);
        };
        if let Some(id) = self.keys.get(&(entity.to_string(), key.clone())) {
            return *id;
        }
        let id = self.add_value(entity, value);
        self.keys.insert((entity.to_string(), key), id);
        id
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Set a relation slot on `owner`. The slot starts populated when it
    /// holds loaded data.
    pub fn set_relation(&mut self, owner: NodeId, name: impl Into<String>, value: RelationValue) {
        if let Some(node) = self.nodes.get_mut(owner.0) {
            node.relations.insert(name.into(), RelationSlot::new(value));
        }
    }

    /// Push an item onto a collection slot, creating the slot if needed.
    pub fn push_to_collection(&mut self, owner: NodeId, name: &str, item: NodeId) {
        let Some(node) = self.nodes.get_mut(owner.0) else {
            return;
        };
        let slot = node
            .relations
            .entry(name.to_string())
            .or_insert_with(|| RelationSlot::new(RelationValue::Collection(Vec::new())));
        match &mut slot.value {
            RelationValue::Collection(items) => items.push(item),
            other => *other = RelationValue::Collection(vec![item]),
        }
    }

    #[must_use]
    pub fn is_populated(&self, owner: NodeId, name: &str) -> Option<bool> {
        self.node(owner)?.relation(name).map(|slot| slot.populated)
    }

    pub(crate) fn set_populated(&mut self, owner: NodeId, name: &str, populated: bool) {
        if let Some(slot) = self
            .nodes
            .get_mut(owner.0)
            .and_then(|node| node.relations.get_mut(name))
        {
            slot.populated = populated;
        }
    }

    /// Serialize `root` with its populated relations.
    ///
    /// - populated collection: array of objects
    /// - populated reference or embedded object: nested object
    /// - unpopulated reference: the target's primary key
    /// - unpopulated collection or embedded object, unloaded slot: omitted
    ///
    /// A node that is already being rendered higher up the same branch is
    /// emitted as its primary key, so cyclic populations terminate.
    #[must_use]
    pub fn render(&self, schema: &Schema, root: NodeId) -> Value {
        let mut ancestors = Vec::new();
        self.render_node(schema, root, &mut ancestors)
    }

    /// Render several roots in order.
    #[must_use]
    pub fn render_all(&self, schema: &Schema, roots: &[NodeId]) -> Vec<Value> {
        roots.iter().map(|root| self.render(schema, *root)).collect()
    }

    fn primary_key_of(&self, schema: &Schema, id: NodeId) -> Value {
        self.node(id)
            .and_then(|node| {
                let key = schema
                    .entity(&node.entity)
                    .map_or("id", |entity| entity.primary_key.as_str());
                node.fields.get(key).cloned()
            })
            .unwrap_or(Value::Null)
    }

    fn render_node(&self, schema: &Schema, id: NodeId, ancestors: &mut Vec<NodeId>) -> Value {
        let Some(node) = self.node(id) else {
            return Value::Null;
        };
        if ancestors.contains(&id) {
            return self.primary_key_of(schema, id);
        }

        ancestors.push(id);
        let mut out = node.fields.clone();
        for (name, slot) in &node.relations {
            let rendered = match (&slot.value, slot.populated) {
                (RelationValue::Collection(items), true) => Some(Value::Array(
                    items
                        .iter()
                        .map(|item| self.render_node(schema, *item, ancestors))
                        .collect(),
                )),
                (RelationValue::Reference(Some(target)) | RelationValue::Embedded(Some(target)), true) => {
                    Some(self.render_node(schema, *target, ancestors))
                }
                (RelationValue::Reference(Some(target)), false) => {
                    Some(self.primary_key_of(schema, *target))
                }
                (RelationValue::Reference(None) | RelationValue::Embedded(None), true)
                | (RelationValue::Reference(None), false) => Some(Value::Null),
                _ => None,
            };
            if let Some(value) = rendered {
                out.insert(name.clone(), value);
            }
        }
        ancestors.pop();

        Value::Object(out)
    }
}
