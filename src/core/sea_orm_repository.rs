use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QuerySelect,
    RelationDef, RelationTrait, RelationType, Select,
    sea_query::{Alias, IntoIden, TableRef},
};
use serde::Serialize;
use std::collections::BTreeSet;

use super::relation_loader::{LoadRelation, add_model, load_relations};
use super::traits::{FindOptions, FoundGraph, Repository};
use crate::errors::{ApiError, QueryError};
use crate::filtering::conditions::{JoinedTable, apply_order, build_condition, build_order, column_value};
use crate::filtering::path;
use crate::graph::{NodeId, ObjectGraph};
use crate::schema::EntityDef;

type JoinFactory = Box<dyn Fn() -> RelationDef + Send + Sync>;

/// [`Repository`] over a single Sea-ORM entity.
///
/// Root rows are serialized into graph nodes. Relations registered with
/// [`Self::load`] are loaded when a requested `expand` path reaches them;
/// every other declared relation is left unloaded.
///
/// Filters and ordering on dotted paths need the relation registered with
/// [`Self::join`] under the path's prefix, for example
/// `join("pages", book::Relation::Pages, &page::columns())` for
/// `pages.number`. Nested aliases (`pages.lines`) join from their parent
/// alias, which must be registered too.
pub struct SeaOrmRepository<E: EntityTrait> {
    db: DatabaseConnection,
    entity: EntityDef,
    columns: Vec<(&'static str, E::Column)>,
    primary_key: E::Column,
    joined: Vec<JoinedTable>,
    relations: Vec<JoinFactory>,
    loaders: Vec<Box<dyn LoadRelation<E>>>,
}

impl<E> SeaOrmRepository<E>
where
    E: EntityTrait,
    E::Model: Serialize + Send + Sync,
{
    /// `columns` maps query paths to the entity's columns and must contain
    /// the primary key named by `entity`.
    ///
    /// # Errors
    ///
    /// `UnresolvedPath` when the primary key is not among `columns`.
    pub fn new(
        db: DatabaseConnection,
        entity: EntityDef,
        columns: Vec<(&'static str, E::Column)>,
    ) -> Result<Self, QueryError> {
        let primary_key = columns
            .iter()
            .find(|(name, _)| *name == entity.primary_key)
            .map(|(_, column)| *column)
            .ok_or_else(|| QueryError::unresolved(&entity.name, &entity.primary_key))?;

        Ok(Self {
            db,
            entity,
            columns,
            primary_key,
            joined: Vec::new(),
            relations: Vec::new(),
            loaders: Vec::new(),
        })
    }

    /// Make `alias.<column>` paths available by joining `relation` as `alias`.
    /// `columns` names the joined entity's queryable columns.
    #[must_use]
    pub fn join<Rel, C>(mut self, alias: impl Into<String>, relation: Rel, columns: &[(&str, C)]) -> Self
    where
        Rel: RelationTrait + Send + Sync + 'static,
        C: ColumnTrait,
    {
        self.joined.push(JoinedTable::new(alias, columns));
        self.relations.push(Box::new(move || relation.def()));
        self
    }

    /// Load a relation of `E` when it is expanded.
    #[must_use]
    pub fn load<L: LoadRelation<E> + 'static>(mut self, loader: L) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    fn relation(&self, alias: &str) -> Option<RelationDef> {
        self.joined
            .iter()
            .zip(&self.relations)
            .find(|(table, _)| table.alias == alias)
            .map(|(_, relation)| relation())
    }

    /// Whether `alias` or one of its parent aliases joins a to-many relation.
    fn to_many(&self, alias: &str) -> bool {
        self.joined.iter().zip(&self.relations).any(|(table, relation)| {
            path::covers(alias, &table.alias) && matches!(relation().rel_type, RelationType::HasMany)
        })
    }

    /// Filtered and ordered select, before paging.
    ///
    /// Joining a to-many relation makes the select `DISTINCT`, and joined
    /// order columns are then selected too so every backend accepts the
    /// ordering.
    ///
    /// # Errors
    ///
    /// `UnresolvedPath` for paths outside the registered columns and joins,
    /// `UnorderablePath` for ordering through a to-many join, `InvalidValue`
    /// for operands that do not fit their column.
    pub fn query(&self, options: &FindOptions) -> Result<Select<E>, QueryError> {
        let condition = build_condition(&options.filter, &self.columns, &self.joined)?;
        let order_paths: Vec<String> = options.order.flatten().into_iter().map(|(path, _)| path).collect();
        let through_many = order_paths.iter().find(|order_path| {
            order_path
                .rsplit_once('.')
                .is_some_and(|(alias, _)| self.to_many(alias))
        });
        if let Some(order_path) = through_many {
            return Err(QueryError::UnorderablePath {
                path: order_path.clone(),
            });
        }
        let ordering = build_order(&options.order, &self.columns, &self.joined)?;

        // Every alias a path needs, parents included, parents first
        let mut aliases = BTreeSet::new();
        let paths = options
            .filter
            .leaves()
            .into_iter()
            .map(|(path, _)| path)
            .chain(order_paths.iter().cloned());
        for path in paths {
            let mut prefix = path.as_str();
            while let Some((alias, _)) = prefix.rsplit_once('.') {
                aliases.insert(alias.to_string());
                prefix = alias;
            }
        }

        let mut select = E::find();
        for alias in &aliases {
            let mut relation = self
                .relation(alias)
                .ok_or_else(|| QueryError::unresolved(&self.entity.name, alias))?;
            if let Some((parent, _)) = alias.rsplit_once('.') {
                relation.from_tbl = TableRef::Table(Alias::new(parent).into_iden());
            }
            select = select.join_as(JoinType::InnerJoin, relation, Alias::new(alias));
        }

        let distinct = aliases.iter().any(|alias| self.to_many(alias));
        if distinct {
            select = select.distinct();
            for (index, ((expr, _), order_path)) in ordering.iter().zip(&order_paths).enumerate() {
                if order_path.contains('.') {
                    select = select.expr_as(expr.clone(), format!("order_{index}"));
                }
            }
        }

        Ok(apply_order(select.filter(condition), ordering))
    }

    async fn graph_for(
        &self,
        models: Vec<E::Model>,
        options: &FindOptions,
    ) -> Result<(ObjectGraph, Vec<NodeId>), ApiError> {
        let mut graph = ObjectGraph::new();
        let mut parents = Vec::with_capacity(models.len());
        for model in models {
            let id = add_model(&mut graph, &self.entity, &model)?;
            parents.push((id, model));
        }
        load_relations(&self.db, &mut graph, &parents, &self.loaders, &options.expand).await?;

        let roots = parents.into_iter().map(|(id, _)| id).collect();
        Ok((graph, roots))
    }
}

#[async_trait]
impl<E> Repository for SeaOrmRepository<E>
where
    E: EntityTrait,
    E::Model: Serialize + Send + Sync,
{
    type User = ();

    async fn find_and_count(&self, options: &FindOptions, _user: Option<&()>) -> Result<FoundGraph, ApiError> {
        let select = self.query(options)?;
        let total = select.clone().count(&self.db).await.map_err(ApiError::database)?;

        let mut query = select.offset(options.offset);
        if let Some(limit) = options.limit {
            query = query.limit(limit);
        }
        let models = query.all(&self.db).await.map_err(ApiError::database)?;

        tracing::debug!(entity = %self.entity.name, rows = models.len(), total, "loaded rows");

        let (graph, roots) = self.graph_for(models, options).await?;
        Ok(FoundGraph { graph, roots, total })
    }

    async fn find_one(
        &self,
        id: &str,
        options: &FindOptions,
        _user: Option<&()>,
    ) -> Result<Option<FoundGraph>, ApiError> {
        // An id that cannot be a key of this table matches nothing
        let Ok(key) = column_value(self.primary_key, &self.entity.primary_key, id) else {
            return Ok(None);
        };

        let model = self
            .query(options)?
            .filter(self.primary_key.eq(key))
            .one(&self.db)
            .await
            .map_err(ApiError::database)?;
        let Some(model) = model else {
            return Ok(None);
        };

        let (graph, roots) = self.graph_for(vec![model], options).await?;
        Ok(Some(FoundGraph {
            graph,
            roots,
            total: 1,
        }))
    }
}
