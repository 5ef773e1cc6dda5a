//! Validation Support
//!
//! Query parameters are checked against a resource's [`ResourceConfig`]
//! before any parsing result reaches the repository. Every problem is
//! collected so a client sees all of them at once.
//!
//! ```rust,ignore
//! let validated = params.validate(&config)?; // ValidationErrors -> 422
//! let tree = parse_filter(&validated.filter)?;
//! ```

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::config::ResourceConfig;
use crate::filtering::filter::FilterToken;
use crate::filtering::sort::parse_order_token;
use crate::models::{QueryParams, ValidatedQuery};

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The parameter that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Convert to Result
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was added.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn is_allowed(allowed: &[String], path: &str) -> bool {
    allowed.iter().any(|candidate| candidate == path)
}

fn validate_limit(params: &QueryParams, config: &ResourceConfig, errors: &mut ValidationErrors) -> u64 {
    let max = config.limit.max;
    match params.limit {
        None => config.limit.effective_default(),
        Some(0) => {
            errors.add(ValidationError::new("limit", "Must be at least 1"));
            0
        }
        Some(limit) if limit > max => {
            errors.add(ValidationError::new("limit", format!("Must be at most {max}")));
            max
        }
        Some(limit) => limit,
    }
}

fn validate_order(params: &QueryParams, config: &ResourceConfig, errors: &mut ValidationErrors) -> Vec<String> {
    let Some(tokens) = params.order.as_ref().filter(|tokens| !tokens.is_empty()) else {
        return config.order.default.clone();
    };

    let mut seen = HashSet::new();
    for token in tokens {
        match parse_order_token(token) {
            Err(err) => errors.add(ValidationError::new("order", err.to_string())),
            Ok((path, _)) if !is_allowed(&config.order.allowed, path) => {
                errors.add(ValidationError::new(
                    "order",
                    format!("Ordering by '{path}' is not allowed"),
                ));
            }
            Ok((path, _)) => {
                if !seen.insert(path) {
                    errors.add(ValidationError::new(
                        "order",
                        format!("Duplicate order path '{path}'"),
                    ));
                }
            }
        }
    }
    tokens.clone()
}

fn validate_filter(params: &QueryParams, config: &ResourceConfig, errors: &mut ValidationErrors) -> Vec<String> {
    let tokens = params.filter.clone().unwrap_or_default();
    for token in &tokens {
        match FilterToken::parse(token) {
            Err(err) => errors.add(ValidationError::new("filter", err.to_string())),
            Ok(parsed) if !is_allowed(&config.filter.allowed, &parsed.path) => {
                errors.add(ValidationError::new(
                    "filter",
                    format!("Filtering on '{}' is not allowed", parsed.path),
                ));
            }
            Ok(_) => {}
        }
    }
    tokens
}

fn validate_expand(params: &QueryParams, config: &ResourceConfig, errors: &mut ValidationErrors) -> Vec<String> {
    let Some(paths) = params.expand.as_ref() else {
        return config.expand.default.clone();
    };

    let mut expand: Vec<String> = Vec::new();
    for path in paths {
        if !is_allowed(&config.expand.allowed, path) {
            errors.add(ValidationError::new(
                "expand",
                format!("Expanding '{path}' is not allowed"),
            ));
        } else if !expand.contains(path) {
            expand.push(path.clone());
        }
    }
    expand
}

/// Check `params` against `config`, applying defaults.
///
/// # Errors
///
/// Returns every violation found: malformed tokens, paths outside the
/// allow-lists, duplicate order paths and out-of-range limits.
pub fn validate_query(
    params: &QueryParams,
    config: &ResourceConfig,
) -> Result<ValidatedQuery, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let query = ValidatedQuery {
        limit: validate_limit(params, config, &mut errors),
        offset: params.offset.unwrap_or(0),
        order: validate_order(params, config, &mut errors),
        filter: validate_filter(params, config, &mut errors),
        expand: validate_expand(params, config, &mut errors),
    };

    errors.result().map(|()| query)
}
