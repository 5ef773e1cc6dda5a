//! # Query Parameter Parsing
//!
//! Turns the `filter` and `order` query parameters into typed trees and
//! hands them to Sea-ORM.
//!
//! ## Main Components
//!
//! - **[`parse_filter`]**: `path|operator:value` tokens to a [`ConditionTree`]
//! - **[`parse_order`]**: `path:asc|desc` tokens to an [`OrderMap`]
//! - **[`build_condition`] / [`build_order`]**: trees to Sea-ORM expressions
//! - **[`calculate_content_range`]**: `Content-Range` header for list pages
//!
//! ## Query Parameter Examples
//!
//! ```rust,ignore
//! // Numeric comparison on a nested path
//! GET /books?filter=pages.number|gte:10
//!
//! // Several constraints on one path, ANDed
//! GET /books?filter=id|gt:1&filter=id|lt:3
//!
//! // List operands, a literal comma escaped as \,
//! GET /books?filter=title|in:Dune,Emma\, Vol. 2
//!
//! // Null checks ignore their value
//! GET /books?filter=subtitle|isnull:
//!
//! // Ordering, first token is the primary key
//! GET /books?order=rating:desc,title:asc
//! ```
//!
//! Parsing does not check paths against a schema; that happens once, when a
//! resource's configuration is checked.

pub mod conditions;
pub mod filter;
pub mod pagination;
pub mod path;
pub mod sort;

pub use conditions::{JoinedTable, apply_order, build_condition, build_order};
pub use filter::{
    ConditionNode, ConditionOp, ConditionTree, Constraint, FilterOperator, FilterToken, Operand,
    parse_filter,
};
pub use pagination::calculate_content_range;
pub use sort::{OrderMap, OrderNode, SortDirection, parse_order};
