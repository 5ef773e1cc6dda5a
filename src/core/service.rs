use serde_json::Value;

use super::traits::{FindOptions, FoundGraph, Repository};
use crate::config::ResourceConfig;
use crate::errors::ApiError;
use crate::filtering::{parse_filter, parse_order};
use crate::models::{ListResponse, QueryParams, ValidatedQuery};
use crate::population::adjust_population;
use crate::schema::Schema;

/// One CRUD resource: a repository plus the configuration that decides what
/// clients may ask of it.
///
/// Every read runs the same pipeline:
///
/// 1. validate the query against the [`ResourceConfig`]
/// 2. parse `filter` and `order` into typed trees
/// 3. load roots and relations through the [`Repository`]
/// 4. narrow relation population to the requested `expand` paths
/// 5. render the roots
pub struct ResourceService<R: Repository> {
    schema: Schema,
    config: ResourceConfig,
    repository: R,
}

impl<R: Repository> ResourceService<R> {
    /// Check the schema and configuration once, up front.
    ///
    /// # Errors
    ///
    /// A 500 error when a relation targets an unknown entity or a configured
    /// path does not resolve.
    pub fn new(schema: Schema, config: ResourceConfig, repository: R) -> Result<Self, ApiError> {
        schema
            .validate()
            .and_then(|()| config.check(&schema))
            .map_err(|err| {
                ApiError::internal(
                    format!("Resource '{}' is misconfigured", config.name_plural),
                    Some(err.to_string()),
                )
            })?;

        Ok(Self {
            schema,
            config,
            repository,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    fn find_options(query: &ValidatedQuery, limit: Option<u64>) -> Result<FindOptions, ApiError> {
        Ok(FindOptions {
            filter: parse_filter(&query.filter)?,
            order: parse_order(&query.order)?,
            limit,
            offset: query.offset,
            expand: query.expand.clone(),
        })
    }

    /// List one page of the resource.
    ///
    /// # Errors
    ///
    /// 422 for queries outside the configuration, 400 for malformed tokens,
    /// whatever the repository reports otherwise.
    pub async fn list(&self, params: &QueryParams, user: Option<&R::User>) -> Result<ListResponse, ApiError> {
        let query = params.validate(&self.config)?;
        let options = Self::find_options(&query, Some(query.limit))?;

        let FoundGraph {
            mut graph,
            roots,
            total,
        } = self.repository.find_and_count(&options, user).await?;
        adjust_population(&self.schema, &mut graph, &roots, &query.expand);

        tracing::debug!(
            resource = %self.config.name_plural,
            returned = roots.len(),
            total,
            "listed resource"
        );

        Ok(ListResponse {
            total,
            offset: query.offset,
            limit: query.limit,
            results: graph.render_all(&self.schema, &roots),
        })
    }

    /// Fetch one record by primary key. `limit`, `offset` and `order` are
    /// validated but have no effect.
    ///
    /// # Errors
    ///
    /// 404 when the record does not exist, otherwise as [`Self::list`].
    pub async fn retrieve(&self, id: &str, params: &QueryParams, user: Option<&R::User>) -> Result<Value, ApiError> {
        let query = params.validate(&self.config)?;
        let options = Self::find_options(&query, None)?;

        let not_found = || ApiError::not_found(&self.config.name_plural, Some(id.to_string()));
        let FoundGraph { mut graph, roots, .. } = self
            .repository
            .find_one(id, &options, user)
            .await?
            .ok_or_else(not_found)?;
        let root = *roots.first().ok_or_else(not_found)?;

        adjust_population(&self.schema, &mut graph, &[root], &query.expand);
        Ok(graph.render(&self.schema, root))
    }
}
