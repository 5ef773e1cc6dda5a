//! Relation population adjustment.
//!
//! After a repository has loaded an [`ObjectGraph`], every relation slot that
//! was loaded is flagged populated. This module narrows that down to the
//! relations the caller asked to expand, so the renderer emits exactly those.
//!
//! For every node the walk looks at the relations declared on its entity, in
//! schema order, and builds the dotted path that reached the slot
//! (`pages.lines.page`). The slot is populated when any expand path equals
//! that path or continues it past a `.` boundary, which keeps the ancestors
//! of a deep request (`pages`, `pages.lines`) populated too.
//!
//! Decisions go into a side table keyed by `(node, relation)` and are
//! OR-combined over every way the walk reaches a slot. Only once the whole
//! graph has been walked are the flags written back. A node shared between
//! a requested and an unrequested branch therefore ends up populated
//! regardless of which branch the walk took first, and running the
//! adjustment again produces the same flags.

use std::collections::{HashMap, HashSet};

use crate::filtering::path;
use crate::graph::{NodeId, ObjectGraph};
use crate::schema::Schema;

/// Population decision for every relation slot reached by a walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationPlan {
    decisions: HashMap<(NodeId, String), bool>,
}

impl PopulationPlan {
    /// The decision for one slot, `None` if the walk never reached it.
    #[must_use]
    pub fn is_populated(&self, node: NodeId, relation: &str) -> Option<bool> {
        self.decisions.get(&(node, relation.to_string())).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Number of slots that end up populated
    #[must_use]
    pub fn populated_count(&self) -> usize {
        self.decisions.values().filter(|populated| **populated).count()
    }

    /// Write every decision onto the graph's slots.
    pub fn apply(&self, graph: &mut ObjectGraph) {
        for ((node, relation), populated) in &self.decisions {
            graph.set_populated(*node, relation, *populated);
        }
    }
}

struct Walker<'a> {
    schema: &'a Schema,
    graph: &'a ObjectGraph,
    expand: Vec<&'a str>,
    decisions: HashMap<(NodeId, String), bool>,
    visited: HashSet<(NodeId, String)>,
    swept: HashSet<NodeId>,
}

impl<'a> Walker<'a> {
    fn decide(&mut self, node: NodeId, relation: &str, populated: bool) {
        *self
            .decisions
            .entry((node, relation.to_string()))
            .or_insert(false) |= populated;
    }

    /// Walk the relations of `node_id`, reached through `prefix`.
    fn visit(&mut self, node_id: NodeId, prefix: &str) {
        if !self.visited.insert((node_id, prefix.to_string())) {
            return;
        }
        let (schema, graph) = (self.schema, self.graph);
        let Some(node) = graph.node(node_id) else {
            return;
        };
        let Some(entity) = schema.entity(&node.entity) else {
            tracing::warn!(entity = %node.entity, "entity missing from schema, relations left untouched");
            return;
        };

        for relation in &entity.relations {
            let Some(slot) = node.relation(&relation.name) else {
                continue;
            };
            let full_path = path::join(prefix, &relation.name);
            let populate = self
                .expand
                .iter()
                .any(|requested| path::covers(requested, &full_path));

            for target in slot.value.targets() {
                if populate {
                    self.visit(target, &full_path);
                } else {
                    self.sweep(target);
                }
            }
            // Recorded after the children so a shared child keeps whatever
            // its other paths decided.
            self.decide(node_id, &relation.name, populate);
        }
    }

    /// Mark everything below an unrequested relation unpopulated, once per
    /// node. OR-combination means this never undoes a populate decision.
    fn sweep(&mut self, node_id: NodeId) {
        if !self.swept.insert(node_id) {
            return;
        }
        let (schema, graph) = (self.schema, self.graph);
        let Some(node) = graph.node(node_id) else {
            return;
        };
        let Some(entity) = schema.entity(&node.entity) else {
            return;
        };

        for relation in &entity.relations {
            let Some(slot) = node.relation(&relation.name) else {
                continue;
            };
            for target in slot.value.targets() {
                self.sweep(target);
            }
            self.decide(node_id, &relation.name, false);
        }
    }
}

/// Compute population decisions for the graph below `roots` without
/// touching the graph.
#[must_use]
pub fn plan_population<S: AsRef<str>>(
    schema: &Schema,
    graph: &ObjectGraph,
    roots: &[NodeId],
    expand: &[S],
) -> PopulationPlan {
    let mut walker = Walker {
        schema,
        graph,
        expand: expand.iter().map(AsRef::as_ref).collect(),
        decisions: HashMap::new(),
        visited: HashSet::new(),
        swept: HashSet::new(),
    };
    for root in roots {
        walker.visit(*root, "");
    }

    let plan = PopulationPlan {
        decisions: walker.decisions,
    };
    tracing::debug!(
        slots = plan.len(),
        populated = plan.populated_count(),
        expand = expand.len(),
        "planned relation population"
    );
    plan
}

/// Plan and apply population for `roots`, returning the plan.
pub fn adjust_population<S: AsRef<str>>(
    schema: &Schema,
    graph: &mut ObjectGraph,
    roots: &[NodeId],
    expand: &[S],
) -> PopulationPlan {
    let plan = plan_population(schema, graph, roots, expand);
    plan.apply(graph);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RelationValue;
    use crate::schema::EntityDef;
    use serde_json::{Map, json};

    fn schema() -> Schema {
        Schema::builder()
            .entity(
                EntityDef::new("book")
                    .field("title")
                    .collection("pages", "page")
                    .collection("page", "page"),
            )
            .entity(EntityDef::new("page").field("number").reference("book", "book"))
            .build()
    }

    #[test]
    fn test_unknown_entity_is_skipped() {
        let mut graph = ObjectGraph::new();
        let ghost = graph.add("ghost", Map::new());
        let page = graph.add("page", Map::new());
        graph.set_relation(ghost, "pages", RelationValue::Collection(vec![page]));

        let plan = adjust_population(&schema(), &mut graph, &[ghost], &["pages"]);
        assert!(plan.is_empty());
        assert_eq!(graph.is_populated(ghost, "pages"), Some(true));
    }

    #[test]
    fn test_undeclared_slot_is_never_visited() {
        let mut graph = ObjectGraph::new();
        let book = graph.add("book", Map::new());
        let page = graph.add("page", Map::new());
        graph.set_relation(book, "extras", RelationValue::Collection(vec![page]));

        let plan = adjust_population(&schema(), &mut graph, &[book], &[] as &[&str]);
        assert_eq!(plan.is_populated(book, "extras"), None);
        assert_eq!(graph.is_populated(book, "extras"), Some(true));
    }

    #[test]
    fn test_segment_prefix_does_not_leak_into_sibling() {
        let mut graph = ObjectGraph::new();
        let book = graph.add("book", Map::new());
        let first = graph.add("page", Map::new());
        let second = graph.add("page", Map::new());
        graph.set_relation(book, "pages", RelationValue::Collection(vec![first]));
        graph.set_relation(book, "page", RelationValue::Collection(vec![second]));

        adjust_population(&schema(), &mut graph, &[book], &["page"]);
        assert_eq!(graph.is_populated(book, "page"), Some(true));
        assert_eq!(graph.is_populated(book, "pages"), Some(false));
    }

    #[test]
    fn test_plan_does_not_touch_graph() {
        let mut graph = ObjectGraph::new();
        let book = graph.add("book", Map::new());
        let page = graph.add("page", Map::new());
        graph.set_relation(book, "pages", RelationValue::Collection(vec![page]));
        graph.set_relation(page, "book", RelationValue::Reference(Some(book)));

        let plan = plan_population(&schema(), &graph, &[book], &["pages"]);
        assert_eq!(plan.is_populated(book, "pages"), Some(true));
        assert_eq!(plan.is_populated(page, "book"), Some(false));
        assert_eq!(plan.populated_count(), 1);
        // Flags untouched until applied
        assert_eq!(graph.is_populated(page, "book"), Some(true));

        plan.apply(&mut graph);
        assert_eq!(graph.is_populated(page, "book"), Some(false));
        assert_eq!(
            graph.render(&schema(), book),
            json!({"pages": [{"book": null}]})
        );
    }
}
