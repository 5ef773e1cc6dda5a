//! Sea-ORM bridge: typed condition trees and order maps to SQL expressions.
//!
//! Top-level paths must name one of the given columns. Dotted paths address a
//! joined table whose alias is the relation path (`pages.number` reads column
//! `number` of the table joined as `pages`, `pages.lines.text` reads `text` of
//! the table joined as `pages.lines`) and must be described by a
//! [`JoinedTable`]. Operands are coerced using the column type either way.

use sea_orm::{
    ColumnTrait, ColumnType, Condition, EntityName, EntityTrait, Order, QueryOrder, Select, Value,
    sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr},
};
use uuid::Uuid;

use super::filter::{ConditionOp, ConditionTree, Constraint, Operand};
use super::sort::OrderMap;
use crate::errors::QueryError;

/// Query paths and column types of a table joined under a relation alias.
#[derive(Debug, Clone)]
pub struct JoinedTable {
    pub alias: String,
    columns: Vec<(String, ColumnType)>,
}

impl JoinedTable {
    /// `columns` maps the last segment of `alias.<column>` paths to the
    /// joined entity's columns.
    #[must_use]
    pub fn new<C: ColumnTrait>(alias: impl Into<String>, columns: &[(&str, C)]) -> Self {
        Self {
            alias: alias.into(),
            columns: columns
                .iter()
                .map(|(name, column)| ((*name).to_string(), column.def().get_column_type().clone()))
                .collect(),
        }
    }

    fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, column_type)| column_type)
    }
}

enum Target<C> {
    Column(C),
    Joined {
        alias: String,
        column: String,
        column_type: ColumnType,
    },
}

impl<C: ColumnTrait + Copy> Target<C> {
    fn resolve(path: &str, columns: &[(&str, C)], joined: &[JoinedTable]) -> Result<Self, QueryError> {
        let unresolved = || QueryError::unresolved(C::EntityName::default().table_name(), path);

        if let Some((alias, column)) = path.rsplit_once('.') {
            let column_type = joined
                .iter()
                .find(|table| table.alias == alias)
                .and_then(|table| table.column_type(column))
                .ok_or_else(unresolved)?;
            return Ok(Self::Joined {
                alias: alias.to_string(),
                column: column.to_string(),
                column_type: column_type.clone(),
            });
        }
        columns
            .iter()
            .find(|(name, _)| *name == path)
            .map(|(_, column)| Self::Column(*column))
            .ok_or_else(unresolved)
    }

    fn expr(&self) -> Expr {
        match self {
            Self::Column(column) => Expr::col((column.entity_name(), *column)),
            Self::Joined { alias, column, .. } => Expr::col((Alias::new(alias), Alias::new(column))),
        }
    }

    fn coerce(&self, path: &str, raw: &str) -> Result<Value, QueryError> {
        match self {
            Self::Column(column) => column_value(*column, path, raw),
            Self::Joined { column_type, .. } => typed_value(column_type, path, raw),
        }
    }
}

/// Convert a raw string to a value of `column`'s type.
///
/// # Errors
///
/// `InvalidValue` when `raw` does not parse as the column type.
pub fn column_value<C: ColumnTrait>(column: C, path: &str, raw: &str) -> Result<Value, QueryError> {
    typed_value(column.def().get_column_type(), path, raw)
}

fn typed_value(column_type: &ColumnType, path: &str, raw: &str) -> Result<Value, QueryError> {
    let invalid = || QueryError::InvalidValue {
        path: path.to_string(),
        value: raw.to_string(),
    };

    let value = match column_type {
        ColumnType::TinyInteger | ColumnType::SmallInteger | ColumnType::Integer | ColumnType::BigInteger => {
            Value::from(raw.trim().parse::<i64>().map_err(|_| invalid())?)
        }
        ColumnType::TinyUnsigned | ColumnType::SmallUnsigned | ColumnType::Unsigned | ColumnType::BigUnsigned => {
            Value::from(raw.trim().parse::<u64>().map_err(|_| invalid())?)
        }
        ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) => {
            Value::from(raw.trim().parse::<f64>().map_err(|_| invalid())?)
        }
        ColumnType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Value::from(true),
            "false" | "0" => Value::from(false),
            _ => return Err(invalid()),
        },
        ColumnType::Uuid => Value::from(Uuid::parse_str(raw.trim()).map_err(|_| invalid())?),
        _ => Value::from(raw.to_string()),
    };
    Ok(value)
}

/// Escape LIKE wildcards so user input only ever matches literally.
fn like_pattern(value: &str, op: ConditionOp) -> LikeExpr {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    if op.is_case_insensitive() {
        escaped = escaped.to_uppercase();
    }
    let pattern = match op {
        ConditionOp::Contains | ConditionOp::IContains => format!("%{escaped}%"),
        ConditionOp::StartsWith | ConditionOp::IStartsWith => format!("{escaped}%"),
        _ => format!("%{escaped}"),
    };
    LikeExpr::new(pattern).escape('\\')
}

fn constraint_expr<C: ColumnTrait + Copy>(
    path: &str,
    target: &Target<C>,
    constraint: &Constraint,
) -> Result<SimpleExpr, QueryError> {
    let lhs = target.expr();
    let invalid = |value: &str| QueryError::InvalidValue {
        path: path.to_string(),
        value: value.to_string(),
    };

    let listed = |operand: &Operand| -> Result<Vec<Value>, QueryError> {
        match operand {
            Operand::List(items) => items.iter().map(|item| target.coerce(path, item)).collect(),
            Operand::Scalar(item) => Ok(vec![target.coerce(path, item)?]),
            Operand::Null => Ok(Vec::new()),
        }
    };

    let expr = match (constraint.op, &constraint.operand) {
        (ConditionOp::Eq, Operand::Null) => lhs.is_null(),
        (ConditionOp::Ne, Operand::Null) => lhs.is_not_null(),
        (_, Operand::Null) => return Err(invalid("null")),

        (ConditionOp::In, operand) => lhs.is_in(listed(operand)?),
        (ConditionOp::Nin, operand) => lhs.is_not_in(listed(operand)?),

        (ConditionOp::Eq, Operand::Scalar(value)) => lhs.eq(target.coerce(path, value)?),
        (ConditionOp::Ne, Operand::Scalar(value)) => lhs.ne(target.coerce(path, value)?),
        (ConditionOp::Gt, Operand::Scalar(value)) => lhs.gt(target.coerce(path, value)?),
        (ConditionOp::Gte, Operand::Scalar(value)) => lhs.gte(target.coerce(path, value)?),
        (ConditionOp::Lt, Operand::Scalar(value)) => lhs.lt(target.coerce(path, value)?),
        (ConditionOp::Lte, Operand::Scalar(value)) => lhs.lte(target.coerce(path, value)?),
        (op @ (ConditionOp::Contains | ConditionOp::StartsWith | ConditionOp::EndsWith), Operand::Scalar(value)) => {
            lhs.like(like_pattern(value, op))
        }
        (
            op @ (ConditionOp::IContains | ConditionOp::IStartsWith | ConditionOp::IEndsWith),
            Operand::Scalar(value),
        ) => Expr::expr(Func::upper(lhs)).like(like_pattern(value, op)),

        (_, Operand::List(items)) => return Err(invalid(&items.join(","))),
    };
    Ok(expr)
}

/// Build a Sea-ORM [`Condition`] ANDing every constraint in `tree`.
///
/// # Errors
///
/// `UnresolvedPath` for a top-level path that is not in `columns` or a
/// dotted path no [`JoinedTable`] describes, `InvalidValue` for operands
/// that do not fit the column type.
pub fn build_condition<C>(
    tree: &ConditionTree,
    columns: &[(&str, C)],
    joined: &[JoinedTable],
) -> Result<Condition, QueryError>
where
    C: ColumnTrait + Copy,
{
    let mut condition = Condition::all();
    for (path, constraints) in tree.leaves() {
        let target = Target::resolve(&path, columns, joined)?;
        for constraint in constraints {
            condition = condition.add(constraint_expr(&path, &target, constraint)?);
        }
    }
    Ok(condition)
}

/// Build `ORDER BY` expressions in precedence order.
///
/// # Errors
///
/// `UnresolvedPath` as for [`build_condition`].
pub fn build_order<C>(
    order: &OrderMap,
    columns: &[(&str, C)],
    joined: &[JoinedTable],
) -> Result<Vec<(SimpleExpr, Order)>, QueryError>
where
    C: ColumnTrait + Copy,
{
    order
        .flatten()
        .into_iter()
        .map(|(path, direction)| {
            let target = Target::resolve(&path, columns, joined)?;
            Ok((SimpleExpr::from(target.expr()), Order::from(direction)))
        })
        .collect()
}

/// Apply ordering expressions to a select.
#[must_use]
pub fn apply_order<E: EntityTrait>(select: Select<E>, ordering: Vec<(SimpleExpr, Order)>) -> Select<E> {
    ordering
        .into_iter()
        .fold(select, |select, (expr, order)| select.order_by(expr, order))
}
