//! Eager relation loading for [`SeaOrmRepository`](super::SeaOrmRepository).
//!
//! Each relation is loaded for a whole batch of parents with one query through
//! Sea-ORM's [`LoaderTrait`], then its own nested relations are loaded for the
//! batch of children. Only relations on a requested `expand` path are loaded.
//!
//! ```rust,ignore
//! let repository = SeaOrmRepository::<book::Entity>::new(db, book_def, book::columns())?.load(
//!     RelationLoader::<book::Entity, page::Entity>::new("pages", RelationKind::Collection, page_def)
//!         .with(RelationLoader::<page::Entity, line::Entity>::new("lines", RelationKind::Collection, line_def)),
//! );
//! ```

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, LoaderTrait, Related};
use serde::Serialize;
use std::collections::HashSet;
use std::marker::PhantomData;

use crate::errors::ApiError;
use crate::filtering::path;
use crate::graph::{NodeId, ObjectGraph, RelationValue};
use crate::schema::{EntityDef, RelationKind};

/// Loads one relation of a batch of `P` rows into the graph.
#[async_trait]
pub trait LoadRelation<P: EntityTrait>: Send + Sync {
    /// Relation field name on the parent entity
    fn name(&self) -> &str;

    /// Fill the relation slot of every parent. `expand` holds the requested
    /// paths below this relation, relative to the loaded children.
    ///
    /// # Errors
    ///
    /// Database failures and rows that do not serialize.
    async fn load(
        &self,
        db: &DatabaseConnection,
        graph: &mut ObjectGraph,
        parents: &[(NodeId, P::Model)],
        expand: &[String],
    ) -> Result<(), ApiError>;
}

/// Loads relation `name` from `P` to `T`, then the relations nested under it.
pub struct RelationLoader<P, T: EntityTrait> {
    name: String,
    kind: RelationKind,
    target: EntityDef,
    nested: Vec<Box<dyn LoadRelation<T>>>,
    parent: PhantomData<fn() -> P>,
}

impl<P, T: EntityTrait> RelationLoader<P, T> {
    /// `target` describes `T` the way the schema does. Collections are loaded
    /// with `load_many`, references and embedded objects with `load_one`.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RelationKind, target: EntityDef) -> Self {
        Self {
            name: name.into(),
            kind,
            target,
            nested: Vec::new(),
            parent: PhantomData,
        }
    }

    /// Register a relation of `T` to load below this one.
    #[must_use]
    pub fn with<L: LoadRelation<T> + 'static>(mut self, nested: L) -> Self {
        self.nested.push(Box::new(nested));
        self
    }
}

#[async_trait]
impl<P, T> LoadRelation<P> for RelationLoader<P, T>
where
    P: EntityTrait + Related<T>,
    P::Model: Sync,
    T: EntityTrait,
    T::Model: Serialize + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(
        &self,
        db: &DatabaseConnection,
        graph: &mut ObjectGraph,
        parents: &[(NodeId, P::Model)],
        expand: &[String],
    ) -> Result<(), ApiError> {
        let models: Vec<P::Model> = parents.iter().map(|(_, model)| model.clone()).collect();
        let mut loaded: Vec<(NodeId, T::Model)> = Vec::new();

        match self.kind {
            RelationKind::Collection => {
                let children = models.load_many(T::find(), db).await.map_err(ApiError::database)?;
                for ((owner, _), rows) in parents.iter().zip(children) {
                    let mut items = Vec::with_capacity(rows.len());
                    for row in rows {
                        let id = add_model(graph, &self.target, &row)?;
                        items.push(id);
                        loaded.push((id, row));
                    }
                    graph.set_relation(*owner, &self.name, RelationValue::Collection(items));
                }
            }
            RelationKind::Reference | RelationKind::Embedded => {
                let children = models.load_one(T::find(), db).await.map_err(ApiError::database)?;
                for ((owner, _), row) in parents.iter().zip(children) {
                    let target = match row {
                        Some(row) => {
                            let id = add_model(graph, &self.target, &row)?;
                            loaded.push((id, row));
                            Some(id)
                        }
                        None => None,
                    };
                    let value = if self.kind == RelationKind::Reference {
                        RelationValue::Reference(target)
                    } else {
                        RelationValue::Embedded(target)
                    };
                    graph.set_relation(*owner, &self.name, value);
                }
            }
        }

        tracing::debug!(relation = %self.name, rows = loaded.len(), "loaded relation");

        // A node shared by several parents is loaded further only once
        let mut seen = HashSet::new();
        loaded.retain(|(id, _)| seen.insert(*id));
        load_relations(db, graph, &loaded, &self.nested, expand).await
    }
}

/// Serialize a row into a node of `entity`, reusing the node when a row with
/// the same primary key was added before. Declared relations start unloaded.
pub(crate) fn add_model<M: Serialize>(
    graph: &mut ObjectGraph,
    entity: &EntityDef,
    model: &M,
) -> Result<NodeId, ApiError> {
    let value = serde_json::to_value(model)
        .map_err(|err| ApiError::internal("Failed to serialize record", Some(err.to_string())))?;
    let id = graph.add_keyed(&entity.name, &entity.primary_key, value);

    for relation in &entity.relations {
        let declared = graph
            .node(id)
            .is_some_and(|node| node.relation(&relation.name).is_some());
        if !declared {
            graph.set_relation(id, &relation.name, RelationValue::Unloaded);
        }
    }
    Ok(id)
}

/// Run every loader whose relation lies on one of the `expand` paths.
pub(crate) async fn load_relations<P>(
    db: &DatabaseConnection,
    graph: &mut ObjectGraph,
    parents: &[(NodeId, P::Model)],
    loaders: &[Box<dyn LoadRelation<P>>],
    expand: &[String],
) -> Result<(), ApiError>
where
    P: EntityTrait,
    P::Model: Sync,
{
    if parents.is_empty() {
        return Ok(());
    }
    for loader in loaders {
        let name = loader.name();
        if !expand.iter().any(|requested| path::covers(requested, name)) {
            continue;
        }
        let nested: Vec<String> = expand
            .iter()
            .filter_map(|requested| requested.strip_prefix(name)?.strip_prefix('.'))
            .map(ToString::to_string)
            .collect();
        loader.load(db, graph, parents, &nested).await?;
    }
    Ok(())
}
