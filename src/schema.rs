//! Entity metadata.
//!
//! The schema is an explicit description of each entity: its primary key,
//! its scalar fields and its relation fields with their kind and target. It
//! is built in code or deserialized from JSON and passed to the parser
//! configuration, the population adjuster and the renderer.
//!
//! ```rust
//! use crudforge::schema::{EntityDef, Schema};
//!
//! let schema = Schema::builder()
//!     .entity(
//!         EntityDef::new("book")
//!             .field("id")
//!             .field("title")
//!             .collection("pages", "page"),
//!     )
//!     .entity(
//!         EntityDef::new("page")
//!             .field("id")
//!             .field("number")
//!             .reference("book", "book"),
//!     )
//!     .build();
//!
//! assert!(schema.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::QueryError;
use crate::filtering::path;

/// How a relation is held on a loaded entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// To-many collection
    Collection,
    /// Lazy to-one reference
    Reference,
    /// Eagerly embedded single object
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub kind: RelationKind,
    /// Name of the target entity
    pub target: String,
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Declared fields of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl EntityDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    #[must_use]
    pub fn collection(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relation(name, RelationKind::Collection, target)
    }

    #[must_use]
    pub fn reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relation(name, RelationKind::Reference, target)
    }

    #[must_use]
    pub fn embedded(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relation(name, RelationKind::Embedded, target)
    }

    #[must_use]
    pub fn relation(
        mut self,
        name: impl Into<String>,
        kind: RelationKind,
        target: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            kind,
            target: target.into(),
        });
        self
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    #[must_use]
    pub fn relation_def(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// What a dotted path ends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTarget {
    Scalar,
    Relation(RelationKind),
}

/// Entity name to definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    entities: BTreeMap<String, EntityDef>,
}

impl Schema {
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Every relation must point at a declared entity.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedPath` naming the first dangling relation, entities
    /// taken in name order.
    pub fn validate(&self) -> Result<(), QueryError> {
        for entity in self.entities.values() {
            for relation in &entity.relations {
                if !self.entities.contains_key(&relation.target) {
                    return Err(QueryError::unresolved(&entity.name, &relation.name));
                }
            }
        }
        Ok(())
    }

    /// Walk `path` from `root`, one relation per segment but the last.
    ///
    /// # Errors
    ///
    /// `UnresolvedPath` if the root is unknown, a segment is empty, an
    /// intermediate segment is not a relation, or the last segment is
    /// neither a field nor a relation.
    pub fn resolve(&self, root: &str, field_path: &str) -> Result<PathTarget, QueryError> {
        let unresolved = || QueryError::unresolved(root, field_path);
        let segments = path::segments(field_path).ok_or_else(unresolved)?;
        let mut entity = self.entity(root).ok_or_else(unresolved)?;

        let (last, hops) = segments.split_last().ok_or_else(unresolved)?;
        for hop in hops {
            let relation = entity.relation_def(hop).ok_or_else(unresolved)?;
            entity = self.entity(&relation.target).ok_or_else(unresolved)?;
        }

        if let Some(relation) = entity.relation_def(last) {
            Ok(PathTarget::Relation(relation.kind))
        } else if entity.has_field(last) || entity.primary_key == *last {
            Ok(PathTarget::Scalar)
        } else {
            Err(unresolved())
        }
    }

    /// Whether walking `field_path` from `root` passes through a collection
    /// before its last segment. Unresolvable hops count as not crossing.
    #[must_use]
    pub fn crosses_collection(&self, root: &str, field_path: &str) -> bool {
        let Some(segments) = path::segments(field_path) else {
            return false;
        };
        let mut entity = self.entity(root);
        for hop in &segments[..segments.len() - 1] {
            let Some(relation) = entity.and_then(|entity| entity.relation_def(hop)) else {
                return false;
            };
            if relation.kind == RelationKind::Collection {
                return true;
            }
            entity = self.entity(&relation.target);
        }
        false
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: BTreeMap<String, EntityDef>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    #[must_use]
    pub fn build(self) -> Schema {
        Schema {
            entities: self.entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Schema {
        Schema::builder()
            .entity(
                EntityDef::new("book")
                    .field("title")
                    .collection("pages", "page")
                    .embedded("summary", "summary"),
            )
            .entity(
                EntityDef::new("page")
                    .field("number")
                    .collection("lines", "line")
                    .reference("book", "book"),
            )
            .entity(EntityDef::new("line").field("text").reference("page", "page"))
            .entity(EntityDef::new("summary").field("text"))
            .build()
    }

    #[test]
    fn test_resolve_scalars_and_relations() {
        let schema = library();
        assert_eq!(schema.resolve("book", "title"), Ok(PathTarget::Scalar));
        assert_eq!(schema.resolve("book", "id"), Ok(PathTarget::Scalar));
        assert_eq!(schema.resolve("book", "summary.text"), Ok(PathTarget::Scalar));
        assert_eq!(
            schema.resolve("book", "pages.lines.page"),
            Ok(PathTarget::Relation(RelationKind::Reference))
        );
        assert_eq!(
            schema.resolve("book", "pages"),
            Ok(PathTarget::Relation(RelationKind::Collection))
        );
    }

    #[test]
    fn test_resolve_failures() {
        let schema = library();
        for bad in ["nope", "title.length", "pages.nope", "pages..lines", "", "page"] {
            assert_eq!(
                schema.resolve("book", bad),
                Err(QueryError::unresolved("book", bad)),
                "path {bad:?} should not resolve"
            );
        }
        assert!(schema.resolve("missing", "id").is_err());
    }

    #[test]
    fn test_validate_reports_dangling_target() {
        assert!(library().validate().is_ok());

        let broken = Schema::builder()
            .entity(EntityDef::new("book").collection("pages", "page"))
            .build();
        assert_eq!(broken.validate(), Err(QueryError::unresolved("book", "pages")));
    }

    #[test]
    fn test_validate_reports_dangling_relations_in_name_order() {
        let broken = Schema::builder()
            .entity(EntityDef::new("shelf").collection("books", "book"))
            .entity(EntityDef::new("page").reference("chapter", "chapter"))
            .entity(EntityDef::new("author").collection("awards", "award"))
            .build();
        for _ in 0..10 {
            assert_eq!(broken.validate(), Err(QueryError::unresolved("author", "awards")));
        }
    }

    #[test]
    fn test_crosses_collection() {
        let schema = library();
        assert!(schema.crosses_collection("book", "pages.number"));
        assert!(schema.crosses_collection("book", "pages.book.title"));
        assert!(!schema.crosses_collection("book", "summary.text"));
        assert!(!schema.crosses_collection("book", "title"));
        assert!(!schema.crosses_collection("page", "book.title"));
        assert!(!schema.crosses_collection("book", "nope.title"));
    }

    #[test]
    fn test_deserialize_from_json() {
        let schema: Schema = serde_json::from_value(serde_json::json!({
            "book": {
                "name": "book",
                "fields": ["title"],
                "relations": [{"name": "pages", "kind": "collection", "target": "page"}]
            },
            "page": {"name": "page", "primary_key": "uuid", "fields": ["number"]}
        }))
        .unwrap();

        assert_eq!(schema.entity("book").unwrap().primary_key, "id");
        assert_eq!(schema.entity("page").unwrap().primary_key, "uuid");
        assert_eq!(schema.resolve("book", "pages.uuid"), Ok(PathTarget::Scalar));
    }
}
