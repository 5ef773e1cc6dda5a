//! Resource configuration.
//!
//! A [`ResourceConfig`] says which paths a resource lets clients filter,
//! order and expand on, and how results are paged. It is plain data: build
//! it in code or deserialize it from JSON.
//!
//! ```rust
//! use crudforge::config::ResourceConfig;
//!
//! let config: ResourceConfig = serde_json::from_value(serde_json::json!({
//!     "entity": "book",
//!     "name_plural": "books",
//!     "limit": {"max": 50},
//!     "order": {"allowed": ["id", "title"], "default": "id:asc"},
//!     "filter": {"allowed": ["title", "pages.number"]},
//!     "expand": {"allowed": ["pages", "pages.lines"]}
//! }))
//! .unwrap();
//!
//! assert_eq!(config.limit.default, 20);
//! assert_eq!(config.order.default, vec!["id:asc"]);
//! ```

use serde::{Deserialize, Serialize};
use serde_with::{OneOrMany, serde_as};

use crate::errors::QueryError;
use crate::filtering::sort::parse_order_token;
use crate::schema::{PathTarget, Schema};

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

const fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

const fn max_limit() -> u64 {
    MAX_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    #[serde(default = "default_limit")]
    pub default: u64,
    #[serde(default = "max_limit")]
    pub max: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_LIMIT,
            max: MAX_LIMIT,
        }
    }
}

impl LimitConfig {
    /// Default limit kept within `1..=max`
    #[must_use]
    pub fn effective_default(&self) -> u64 {
        self.default.clamp(1, self.max.max(1))
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Scalar paths clients may order by
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Order tokens used when the request has none
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub default: Vec<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Scalar paths clients may filter on
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub allowed: Vec<String>,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandConfig {
    /// Relation paths clients may expand
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Relation paths expanded when the request has none
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub default: Vec<String>,
}

/// Configuration of one CRUD resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Root entity name in the [`Schema`]
    pub entity: String,
    /// Used in `Content-Range` headers and not-found messages
    pub name_plural: String,
    #[serde(default)]
    pub limit: LimitConfig,
    #[serde(default)]
    pub order: OrderConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub expand: ExpandConfig,
}

impl ResourceConfig {
    #[must_use]
    pub fn new(entity: impl Into<String>, name_plural: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            name_plural: name_plural.into(),
            limit: LimitConfig::default(),
            order: OrderConfig::default(),
            filter: FilterConfig::default(),
            expand: ExpandConfig::default(),
        }
    }

    #[must_use]
    pub fn order_by(mut self, allowed: &[&str]) -> Self {
        self.order.allowed = allowed.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn default_order(mut self, tokens: &[&str]) -> Self {
        self.order.default = tokens.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn filter_on(mut self, allowed: &[&str]) -> Self {
        self.filter.allowed = allowed.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn expandable(mut self, allowed: &[&str]) -> Self {
        self.expand.allowed = allowed.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn default_expand(mut self, paths: &[&str]) -> Self {
        self.expand.default = paths.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn limits(mut self, default: u64, max: u64) -> Self {
        self.limit = LimitConfig { default, max };
        self
    }

    /// Check every configured path against the schema.
    ///
    /// Order and filter paths must end on a scalar, expand paths on a
    /// relation, and defaults must be allowed. Order paths may not pass
    /// through a collection. Paths that would not resolve are rejected here
    /// so the parser never sees them.
    ///
    /// # Errors
    ///
    /// `UnresolvedPath` for the first offending path, `UnorderablePath` for
    /// an order path through a collection, or `InvalidOrderSyntax` for a
    /// malformed default order token.
    pub fn check(&self, schema: &Schema) -> Result<(), QueryError> {
        let scalar = |path: &String| -> Result<(), QueryError> {
            match schema.resolve(&self.entity, path)? {
                PathTarget::Scalar => Ok(()),
                PathTarget::Relation(_) => Err(QueryError::unresolved(&self.entity, path)),
            }
        };
        let relation = |path: &String| -> Result<(), QueryError> {
            match schema.resolve(&self.entity, path)? {
                PathTarget::Relation(_) => Ok(()),
                PathTarget::Scalar => Err(QueryError::unresolved(&self.entity, path)),
            }
        };

        self.order.allowed.iter().try_for_each(scalar)?;
        if let Some(path) = self
            .order
            .allowed
            .iter()
            .find(|path| schema.crosses_collection(&self.entity, path))
        {
            return Err(QueryError::UnorderablePath { path: path.clone() });
        }
        self.filter.allowed.iter().try_for_each(scalar)?;
        self.expand.allowed.iter().try_for_each(relation)?;

        for token in &self.order.default {
            let (field, _) = parse_order_token(token)?;
            if !self.order.allowed.iter().any(|allowed| allowed == field) {
                return Err(QueryError::unresolved(&self.entity, field));
            }
        }
        for path in &self.expand.default {
            if !self.expand.allowed.contains(path) {
                return Err(QueryError::unresolved(&self.entity, path));
            }
        }
        Ok(())
    }
}
