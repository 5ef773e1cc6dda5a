use async_trait::async_trait;

use crate::errors::ApiError;
use crate::filtering::{ConditionTree, OrderMap};
use crate::graph::{NodeId, ObjectGraph};

/// What a repository is asked to load.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Constraints, ANDed
    pub filter: ConditionTree,
    /// Ordering in precedence order
    pub order: OrderMap,
    /// `None` for single-record lookups
    pub limit: Option<u64>,
    pub offset: u64,
    /// Relation paths the caller will expand. Repositories may use this to
    /// decide what to load; anything loaded beyond it is hidden again by the
    /// population adjuster.
    pub expand: Vec<String>,
}

/// Result of a repository lookup.
#[derive(Debug, Clone, Default)]
pub struct FoundGraph {
    pub graph: ObjectGraph,
    /// Root nodes in result order
    pub roots: Vec<NodeId>,
    /// Rows matching the filter, ignoring limit and offset
    pub total: u64,
}

/// Loads root entities and their relations into an [`ObjectGraph`].
///
/// The current user is opaque here and passed through untouched, so
/// implementations can scope what each caller may see.
#[async_trait]
pub trait Repository: Send + Sync {
    type User: Clone + Send + Sync + 'static;

    /// Load one page of roots plus the total match count.
    ///
    /// # Errors
    ///
    /// Any storage or query-building failure.
    async fn find_and_count(
        &self,
        options: &FindOptions,
        user: Option<&Self::User>,
    ) -> Result<FoundGraph, ApiError>;

    /// Load a single root by primary key, `None` when it does not exist or
    /// does not pass `options.filter`.
    ///
    /// # Errors
    ///
    /// Any storage or query-building failure.
    async fn find_one(
        &self,
        id: &str,
        options: &FindOptions,
        user: Option<&Self::User>,
    ) -> Result<Option<FoundGraph>, ApiError>;
}
