//! # crudforge
//!
//! Query-parameter parsing and relation population for read-only CRUD
//! endpoints built on Axum and Sea-ORM.
//!
//! A request like
//!
//! ```text
//! GET /books?filter=pages.number|gte:10&order=title:asc&expand=pages.lines
//! ```
//!
//! is validated against a [`ResourceConfig`], parsed into a typed
//! [`ConditionTree`](filtering::ConditionTree) and
//! [`OrderMap`](filtering::OrderMap), loaded through a [`Repository`] into an
//! [`ObjectGraph`](graph::ObjectGraph), narrowed to the requested relations
//! by [`adjust_population`] and rendered as JSON.
//!
//! ```rust,ignore
//! use crudforge::{RelationKind, RelationLoader, ResourceConfig, ResourceService, SeaOrmRepository, crud_router};
//!
//! let repository = SeaOrmRepository::<book::Entity>::new(db, book_def, book::columns())?
//!     .join("pages", book::Relation::Pages, &page::columns())
//!     .load(RelationLoader::<book::Entity, page::Entity>::new("pages", RelationKind::Collection, page_def));
//! let config = ResourceConfig::new("book", "books")
//!     .order_by(&["id", "title"])
//!     .filter_on(&["title", "pages.number"])
//!     .expandable(&["pages"]);
//! let service = Arc::new(ResourceService::new(schema, config, repository)?);
//! let app = Router::new().nest("/books", crud_router(service));
//! ```

pub mod config;
pub mod core;
pub mod errors;
pub mod filtering;
pub mod graph;
pub mod models;
pub mod population;
pub mod routes;
pub mod schema;
pub mod validation;

pub use config::ResourceConfig;
pub use self::core::{
    FindOptions, FoundGraph, LoadRelation, RelationLoader, Repository, ResourceService, SeaOrmRepository,
};
pub use errors::{ApiError, QueryError};
pub use filtering::{parse_filter, parse_order};
pub use models::{ListResponse, QueryParams};
pub use population::{PopulationPlan, adjust_population, plan_population};
pub use routes::crud_router;
pub use schema::{EntityDef, RelationKind, Schema};
pub use serde_with;
