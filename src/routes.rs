use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
};
use serde_json::Value;
use std::sync::Arc;

use crate::core::{Repository, ResourceService};
use crate::errors::ApiError;
use crate::filtering::calculate_content_range;
use crate::models::{ListResponse, QueryParams};

/// Read-only routes for one resource, to be nested under its path:
///
/// - `GET /` lists one page and sets `Content-Range`
/// - `GET /{id}` returns a single record
///
/// The current user is read from an optional `Extension<R::User>`, typically
/// inserted by an authentication layer.
///
/// ```rust,ignore
/// let books = Arc::new(ResourceService::new(schema, config, repository)?);
/// let app = Router::new().nest("/books", crud_router(books));
/// ```
pub fn crud_router<R>(service: Arc<ResourceService<R>>) -> Router
where
    R: Repository + 'static,
{
    Router::new()
        .route("/", get(get_all_handler::<R>))
        .route("/{id}", get(get_one_handler::<R>))
        .with_state(service)
}

async fn get_all_handler<R>(
    State(service): State<Arc<ResourceService<R>>>,
    user: Option<Extension<R::User>>,
    params: QueryParams,
) -> Result<(HeaderMap, Json<ListResponse>), ApiError>
where
    R: Repository + 'static,
{
    let user = user.map(|Extension(user)| user);
    let list = service.list(&params, user.as_ref()).await?;
    let headers = calculate_content_range(list.offset, list.limit, list.total, &service.config().name_plural);
    Ok((headers, Json(list)))
}

async fn get_one_handler<R>(
    State(service): State<Arc<ResourceService<R>>>,
    Path(id): Path<String>,
    user: Option<Extension<R::User>>,
    params: QueryParams,
) -> Result<Json<Value>, ApiError>
where
    R: Repository + 'static,
{
    let user = user.map(|Extension(user)| user);
    let item = service.retrieve(&id, &params, user.as_ref()).await?;
    Ok(Json(item))
}
