use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::ResourceConfig;
use crate::errors::ApiError;
use crate::validation::{ValidationErrors, validate_query};

/// Query parameters for listing and retrieving resources.
///
/// # Filtering
/// Each `filter` value is one token `path|operator:value`. Repeat the key for
/// several tokens; they are combined with AND:
/// ```text
/// ?filter=title|icontains:dune&filter=pages.number|gte:10
/// ```
/// `in`/`nin` take a comma separated list, a literal comma is written `\,`.
/// `isnull`/`notnull` ignore their value.
///
/// # Sorting
/// Each `order` value is `path:asc` or `path:desc`. The first one is the
/// primary sort key. Repeat the key or separate tokens with commas.
///
/// # Expansion
/// Each `expand` value is a relation path such as `pages.lines`. Repeat the
/// key or separate paths with commas. An empty `expand=` disables the
/// configured default expansion.
///
/// # Pagination
/// `limit` and `offset`; the limit defaults to and is capped by the
/// resource configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct QueryParams {
    /// Maximum number of results
    #[param(example = 20)]
    pub limit: Option<u64>,
    /// Number of results to skip
    #[param(example = 0)]
    pub offset: Option<u64>,
    /// Order tokens, for example `title:asc`
    pub order: Option<Vec<String>>,
    /// Filter tokens, for example `title|icontains:dune`
    pub filter: Option<Vec<String>>,
    /// Relation paths to expand, for example `pages.lines`
    pub expand: Option<Vec<String>>,
}

fn parse_number(key: &str, value: &str) -> Result<u64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("'{key}' must be a non-negative integer")))
}

fn push_split(target: &mut Option<Vec<String>>, value: &str) {
    let list = target.get_or_insert_with(Vec::new);
    list.extend(
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ToString::to_string),
    );
}

impl QueryParams {
    /// Parse a raw urlencoded query string. Repeated keys accumulate and
    /// unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns a 400 error if `limit` or `offset` is not an unsigned integer.
    pub fn from_query_str(raw: &str) -> Result<Self, ApiError> {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "limit" => params.limit = Some(parse_number("limit", &value)?),
                "offset" => params.offset = Some(parse_number("offset", &value)?),
                "order" => push_split(&mut params.order, &value),
                "expand" => push_split(&mut params.expand, &value),
                // Filter values may legitimately contain commas
                "filter" => params
                    .filter
                    .get_or_insert_with(Vec::new)
                    .push(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }

    /// Check the parameters against a resource configuration and fill in
    /// defaults.
    ///
    /// # Errors
    ///
    /// Every problem found is collected into the returned [`ValidationErrors`].
    pub fn validate(&self, config: &ResourceConfig) -> Result<ValidatedQuery, ValidationErrors> {
        validate_query(self, config)
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_query_str(parts.uri.query().unwrap_or_default())
    }
}

/// Query parameters after validation, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    pub limit: u64,
    pub offset: u64,
    pub order: Vec<String>,
    pub filter: Vec<String>,
    pub expand: Vec<String>,
}

/// Body of a list response.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ListResponse {
    /// Number of matching rows, ignoring limit and offset
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<serde_json::Value>,
}
