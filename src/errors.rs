//! # Error Handling
//!
//! Two layers of errors live here:
//!
//! - [`QueryError`] is raised by the query parser, the schema resolver and the
//!   Sea-ORM bridge. It describes what was wrong with a token or path.
//! - [`ApiError`] is what handlers and the service pipeline return. It maps to
//!   an HTTP status, sends a sanitized message and logs internal details with
//!   `tracing`.
//!
//! ```rust,ignore
//! use crudforge::ApiError;
//!
//! async fn handler() -> Result<Json<Value>, ApiError> {
//!     let tree = parse_filter(&tokens)?; // QueryError -> 400
//!     let rows = Entity::find().all(db).await.map_err(ApiError::database)?;
//!     Ok(Json(render(rows)))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

use crate::validation::ValidationErrors;

/// Errors produced while parsing or resolving query tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A filter token does not match `path|operator:value`
    InvalidFilterSyntax { token: String },
    /// An order token does not match `path:asc|desc`
    InvalidOrderSyntax { token: String },
    /// An operator outside the supported set reached the parser
    UnknownOperator { operator: String },
    /// A path does not follow any declared field chain from the root entity
    UnresolvedPath { entity: String, path: String },
    /// An operand could not be converted to the column's type
    InvalidValue { path: String, value: String },
    /// An order path crosses a to-many relation, so a root has no single
    /// value to sort by
    UnorderablePath { path: String },
}

impl QueryError {
    pub(crate) fn invalid_filter(token: impl Into<String>) -> Self {
        Self::InvalidFilterSyntax {
            token: token.into(),
        }
    }

    pub(crate) fn invalid_order(token: impl Into<String>) -> Self {
        Self::InvalidOrderSyntax {
            token: token.into(),
        }
    }

    pub(crate) fn unresolved(entity: impl Into<String>, path: impl Into<String>) -> Self {
        Self::UnresolvedPath {
            entity: entity.into(),
            path: path.into(),
        }
    }

    /// Whether the caller sent something malformed, as opposed to a broken
    /// contract between configuration and parser.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilterSyntax { .. }
                | Self::InvalidOrderSyntax { .. }
                | Self::InvalidValue { .. }
        )
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilterSyntax { token } => {
                write!(f, "invalid filter '{token}', expected 'path|operator:value'")
            }
            Self::InvalidOrderSyntax { token } => {
                write!(f, "invalid order '{token}', expected 'path:asc' or 'path:desc'")
            }
            Self::UnknownOperator { operator } => write!(f, "unknown filter operator '{operator}'"),
            Self::UnresolvedPath { entity, path } => {
                write!(f, "path '{path}' does not resolve on entity '{entity}'")
            }
            Self::InvalidValue { path, value } => {
                write!(f, "value '{value}' is not valid for '{path}'")
            }
            Self::UnorderablePath { path } => {
                write!(f, "cannot order by '{path}', it crosses a to-many relation")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found - Resource doesn't exist
    NotFound {
        /// Resource type (e.g., "book")
        resource: String,
        /// Optional ID that wasn't found
        id: Option<String>,
    },

    /// 400 Bad Request - Invalid input from user
    BadRequest {
        /// User-facing error message
        message: String,
    },

    /// 422 Unprocessable Entity - Query parameters failed validation
    ValidationFailed {
        /// User-facing validation errors
        errors: Vec<String>,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },

    /// Custom error with specific status code
    Custom {
        status: StatusCode,
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    /// Create a 404 Not Found error
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a 422 error from a list of messages
    #[must_use]
    pub fn validation_failed(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Create a 500 error from a database error. Details are logged only.
    #[must_use]
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Create a 500 Internal Server Error with optional details
    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Create a custom error with specific status code
    pub fn custom(status: StatusCode, message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Custom {
            status,
            message: message.into(),
            internal,
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Custom { status, .. } => *status,
        }
    }

    /// User-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::ValidationFailed { errors } => {
                if errors.len() == 1 {
                    errors[0].clone()
                } else {
                    format!("Validation failed: {}", errors.join(", "))
                }
            }
            Self::BadRequest { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. }
            | Self::Custom { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            Self::Custom {
                internal: Some(details),
                status,
                ..
            } => {
                tracing::error!(status = %status, details = %details, "Custom error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error body sent to clients
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::ValidationFailed { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.clone()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

/// Malformed tokens become 400; a path or operator that slipped past
/// configuration is an internal contract violation and becomes 500.
impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal("Query could not be built", Some(err.to_string()))
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed {
            errors: errors.errors().iter().map(ToString::to_string).collect(),
        }
    }
}

/// `DbErr::RecordNotFound` becomes 404, everything else 500.
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => {
                let resource = msg.split_whitespace().next().unwrap_or("Resource");
                Self::NotFound {
                    resource: resource.to_string(),
                    id: None,
                }
            }
            _ => Self::database(err),
        }
    }
}
