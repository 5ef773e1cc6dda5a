#![allow(dead_code)]

use async_trait::async_trait;
use crudforge::filtering::{ConditionOp, Operand, SortDirection};
use crudforge::graph::{NodeId, ObjectGraph, RelationValue};
use crudforge::{
    ApiError, EntityDef, FindOptions, FoundGraph, Repository, ResourceConfig, ResourceService, Schema,
};
use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::Mutex;

pub mod book_entity;
pub mod line_entity;
pub mod page_entity;

/// Log to the test writer; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .compact()
        .try_init();
}

// ============================================================================
// Library schema: book -> pages -> lines -> page, book -> summary
// ============================================================================

pub fn library_schema() -> Schema {
    Schema::builder()
        .entity(
            EntityDef::new("book")
                .field("title")
                .field("rating")
                .collection("pages", "page")
                .embedded("summary", "summary"),
        )
        .entity(
            EntityDef::new("page")
                .field("number")
                .reference("book", "book")
                .collection("lines", "line"),
        )
        .entity(EntityDef::new("line").field("text").reference("page", "page"))
        .entity(EntityDef::new("summary").field("text"))
        .build()
}

pub fn library_config() -> ResourceConfig {
    ResourceConfig::new("book", "books")
        .order_by(&["id", "title", "rating"])
        .default_order(&["id:asc"])
        .filter_on(&["id", "title", "rating", "pages.number"])
        .expandable(&["pages", "pages.lines", "pages.lines.page", "pages.book", "summary"])
        .limits(10, 50)
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Handles into a fully loaded library graph.
pub struct Library {
    pub graph: ObjectGraph,
    pub books: Vec<NodeId>,
    pub pages: Vec<NodeId>,
    pub lines: Vec<NodeId>,
}

/// Two books, every relation loaded, including the back-references that make
/// the graph cyclic:
///
/// - book 1 "Dune": pages 10 (lines 100, 101) and 11 (line 110), a summary
/// - book 2 "Emma": page 20 without lines, no summary
pub fn library() -> Library {
    let mut graph = ObjectGraph::new();
    let dune = graph.add("book", fields(json!({"id": 1, "title": "Dune", "rating": 4.5})));
    let emma = graph.add("book", fields(json!({"id": 2, "title": "Emma", "rating": 3.5})));

    let summary = graph.add("summary", fields(json!({"id": 1000, "text": "Spice"})));
    graph.set_relation(dune, "summary", RelationValue::Embedded(Some(summary)));
    graph.set_relation(emma, "summary", RelationValue::Embedded(None));

    let mut pages = Vec::new();
    let mut lines = Vec::new();
    for (book, page_id, number, line_ids) in [
        (dune, 10, 1, vec![100, 101]),
        (dune, 11, 2, vec![110]),
        (emma, 20, 1, vec![]),
    ] {
        let page = graph.add("page", fields(json!({"id": page_id, "number": number})));
        graph.push_to_collection(book, "pages", page);
        graph.set_relation(page, "book", RelationValue::Reference(Some(book)));
        graph.set_relation(page, "lines", RelationValue::Collection(Vec::new()));
        for line_id in line_ids {
            let line = graph.add("line", fields(json!({"id": line_id, "text": format!("line {line_id}")})));
            graph.push_to_collection(page, "lines", line);
            graph.set_relation(line, "page", RelationValue::Reference(Some(page)));
            lines.push(line);
        }
        pages.push(page);
    }

    Library {
        graph,
        books: vec![dune, emma],
        pages,
        lines,
    }
}

// ============================================================================
// In-memory repository
// ============================================================================

/// Serves the [`library`] graph, applying top-level filters, ordering and
/// paging. Remembers the last user it was called with.
#[derive(Default)]
pub struct MemoryRepository {
    pub last_user: Mutex<Option<String>>,
}

fn compare(left: &Value, right: &str) -> Option<Ordering> {
    match left {
        Value::Number(number) => number.as_f64()?.partial_cmp(&right.parse::<f64>().ok()?),
        Value::String(text) => Some(text.as_str().cmp(right)),
        _ => None,
    }
}

fn satisfies(fields: &Map<String, Value>, path: &str, op: ConditionOp, operand: &Operand) -> Result<bool, ApiError> {
    let value = fields.get(path).unwrap_or(&Value::Null);
    let result = match (op, operand) {
        (ConditionOp::Eq, Operand::Null) => value.is_null(),
        (ConditionOp::Ne, Operand::Null) => !value.is_null(),
        (ConditionOp::Eq, Operand::Scalar(raw)) => compare(value, raw) == Some(Ordering::Equal),
        (ConditionOp::Ne, Operand::Scalar(raw)) => compare(value, raw) != Some(Ordering::Equal),
        (ConditionOp::Gt, Operand::Scalar(raw)) => compare(value, raw) == Some(Ordering::Greater),
        (ConditionOp::Gte, Operand::Scalar(raw)) => {
            matches!(compare(value, raw), Some(Ordering::Greater | Ordering::Equal))
        }
        (ConditionOp::Lt, Operand::Scalar(raw)) => compare(value, raw) == Some(Ordering::Less),
        (ConditionOp::Lte, Operand::Scalar(raw)) => {
            matches!(compare(value, raw), Some(Ordering::Less | Ordering::Equal))
        }
        (ConditionOp::In, Operand::List(items)) => items
            .iter()
            .any(|item| compare(value, item) == Some(Ordering::Equal)),
        _ => {
            return Err(ApiError::internal(
                "Unsupported filter",
                Some(format!("{path} {}", op.as_str())),
            ));
        }
    };
    Ok(result)
}

fn cmp_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

impl MemoryRepository {
    fn select(&self, graph: &ObjectGraph, books: &[NodeId], options: &FindOptions) -> Result<Vec<NodeId>, ApiError> {
        let leaves = options.filter.leaves();
        let mut selected = Vec::new();
        for book in books {
            let fields = &graph.node(*book).expect("book node").fields;
            let mut keep = true;
            for (path, constraints) in &leaves {
                for constraint in *constraints {
                    keep &= satisfies(fields, path, constraint.op, &constraint.operand)?;
                }
            }
            if keep {
                selected.push(*book);
            }
        }

        let order = options.order.flatten();
        selected.sort_by(|a, b| {
            let (a, b) = (&graph.node(*a).unwrap().fields, &graph.node(*b).unwrap().fields);
            order
                .iter()
                .map(|(path, direction)| {
                    let ordering = cmp_values(a.get(path), b.get(path));
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(selected)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    type User = String;

    async fn find_and_count(&self, options: &FindOptions, user: Option<&String>) -> Result<FoundGraph, ApiError> {
        *self.last_user.lock().unwrap() = user.cloned();
        let Library { graph, books, .. } = library();

        let selected = self.select(&graph, &books, options)?;
        let total = selected.len() as u64;
        let offset = usize::try_from(options.offset).unwrap();
        let limit = options.limit.map_or(usize::MAX, |limit| usize::try_from(limit).unwrap());
        let roots = selected.into_iter().skip(offset).take(limit).collect();

        Ok(FoundGraph { graph, roots, total })
    }

    async fn find_one(
        &self,
        id: &str,
        options: &FindOptions,
        user: Option<&String>,
    ) -> Result<Option<FoundGraph>, ApiError> {
        *self.last_user.lock().unwrap() = user.cloned();
        let Library { graph, books, .. } = library();

        let selected = self.select(&graph, &books, options)?;
        let root = selected
            .into_iter()
            .find(|book| graph.node(*book).unwrap().fields.get("id").map(ToString::to_string).as_deref() == Some(id));

        Ok(root.map(|root| FoundGraph {
            graph,
            roots: vec![root],
            total: 1,
        }))
    }
}

pub fn library_service() -> ResourceService<MemoryRepository> {
    init_tracing();
    ResourceService::new(library_schema(), library_config(), MemoryRepository::default())
        .expect("library configuration is valid")
}

// ============================================================================
// Sea-ORM on in-memory SQLite
// ============================================================================

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateLibraryTables)]
    }
}

pub struct CreateLibraryTables;

#[async_trait::async_trait]
impl MigrationName for CreateLibraryTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_library_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateLibraryTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Books::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Books::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Books::Title).string().not_null())
                    .col(ColumnDef::new(Books::Rating).double().not_null())
                    .col(ColumnDef::new(Books::Published).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Pages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Pages::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Pages::BookId).integer().not_null())
                    .col(ColumnDef::new(Pages::Number).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Lines::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Lines::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Lines::PageId).integer().not_null())
                    .col(ColumnDef::new(Lines::Text).string().not_null())
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Lines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Books::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Books {
    Table,
    Id,
    Title,
    Rating,
    Published,
}

#[derive(DeriveIden)]
enum Pages {
    Table,
    Id,
    BookId,
    Number,
}

#[derive(DeriveIden)]
enum Lines {
    Table,
    Id,
    PageId,
    Text,
}
