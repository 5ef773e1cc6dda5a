//! Filter token parsing.
//!
//! A filter token reads `path|operator:value`, for example `title|icontains:rust`
//! or `pages.number|in:1,2,3`. Tokens are parsed into a typed [`FilterToken`]
//! first, then merged into one [`ConditionTree`] where every leaf holds the
//! constraints for a single path. Distinct tokens are ANDed by the executor.

use regex::Regex;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::path;
use crate::errors::QueryError;

/// `path|operator:value`, splitting on the last `|` that is followed by an
/// operator and a `:`. The value may itself contain `:` or `|`.
static FILTER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*)\|([^:|]+):(.*)$").expect("filter token pattern is valid")
});

/// Operators accepted in filter tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Contains,
    EndsWith,
    Eq,
    Gt,
    Gte,
    IContains,
    IEndsWith,
    In,
    IsNull,
    IStartsWith,
    Lt,
    Lte,
    Ne,
    Nin,
    NotNull,
    StartsWith,
}

impl FilterOperator {
    pub const ALL: [Self; 16] = [
        Self::Contains,
        Self::EndsWith,
        Self::Eq,
        Self::Gt,
        Self::Gte,
        Self::IContains,
        Self::IEndsWith,
        Self::In,
        Self::IsNull,
        Self::IStartsWith,
        Self::Lt,
        Self::Lte,
        Self::Ne,
        Self::Nin,
        Self::NotNull,
        Self::StartsWith,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::EndsWith => "endswith",
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::IContains => "icontains",
            Self::IEndsWith => "iendswith",
            Self::In => "in",
            Self::IsNull => "isnull",
            Self::IStartsWith => "istartswith",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Ne => "ne",
            Self::Nin => "nin",
            Self::NotNull => "notnull",
            Self::StartsWith => "startswith",
        }
    }

    /// Operators whose value is a comma separated list
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }
}

impl FromStr for FilterOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| QueryError::UnknownOperator {
                operator: s.to_string(),
            })
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison primitive handed to the query executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
}

impl ConditionOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "startswith",
            Self::IStartsWith => "istartswith",
            Self::EndsWith => "endswith",
            Self::IEndsWith => "iendswith",
        }
    }

    /// Case-insensitive pattern match
    #[must_use]
    pub const fn is_case_insensitive(self) -> bool {
        matches!(self, Self::IContains | Self::IStartsWith | Self::IEndsWith)
    }
}

/// Right-hand side of a [`Constraint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Null,
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub op: ConditionOp,
    pub operand: Operand,
}

/// One parsed filter token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterToken {
    pub path: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl FilterToken {
    /// # Errors
    ///
    /// `InvalidFilterSyntax` when the token does not match the grammar or the
    /// path has an empty segment, `UnknownOperator` for an unsupported
    /// operator.
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        let captures = FILTER_TOKEN
            .captures(token)
            .ok_or_else(|| QueryError::invalid_filter(token))?;
        let field = &captures[1];
        if path::segments(field).is_none() {
            return Err(QueryError::invalid_filter(token));
        }
        let operator = captures[2].parse::<FilterOperator>()?;
        Ok(Self {
            path: field.to_string(),
            operator,
            value: captures[3].to_string(),
        })
    }

    /// The constraint this token contributes to its path's leaf.
    #[must_use]
    pub fn constraint(&self) -> Constraint {
        let scalar = || Operand::Scalar(self.value.clone());
        let list = || Operand::List(path::split_unescaped_commas(&self.value));
        let (op, operand) = match self.operator {
            FilterOperator::IsNull => (ConditionOp::Eq, Operand::Null),
            FilterOperator::NotNull => (ConditionOp::Ne, Operand::Null),
            FilterOperator::In => (ConditionOp::In, list()),
            FilterOperator::Nin => (ConditionOp::Nin, list()),
            FilterOperator::Eq => (ConditionOp::Eq, scalar()),
            FilterOperator::Ne => (ConditionOp::Ne, scalar()),
            FilterOperator::Gt => (ConditionOp::Gt, scalar()),
            FilterOperator::Gte => (ConditionOp::Gte, scalar()),
            FilterOperator::Lt => (ConditionOp::Lt, scalar()),
            FilterOperator::Lte => (ConditionOp::Lte, scalar()),
            FilterOperator::Contains => (ConditionOp::Contains, scalar()),
            FilterOperator::IContains => (ConditionOp::IContains, scalar()),
            FilterOperator::StartsWith => (ConditionOp::StartsWith, scalar()),
            FilterOperator::IStartsWith => (ConditionOp::IStartsWith, scalar()),
            FilterOperator::EndsWith => (ConditionOp::EndsWith, scalar()),
            FilterOperator::IEndsWith => (ConditionOp::IEndsWith, scalar()),
        };
        Constraint { op, operand }
    }
}

/// Constraints on one path segment plus the conditions nested below it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConditionNode {
    constraints: Vec<Constraint>,
    children: ConditionTree,
}

impl ConditionNode {
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[must_use]
    pub fn children(&self) -> &ConditionTree {
        &self.children
    }

    #[must_use]
    pub fn constraint(&self, op: ConditionOp) -> Option<&Operand> {
        self.constraints
            .iter()
            .find(|c| c.op == op)
            .map(|c| &c.operand)
    }

    /// Add a constraint; a second one with the same op replaces the first.
    fn push(&mut self, constraint: Constraint) {
        if let Some(existing) = self.constraints.iter_mut().find(|c| c.op == constraint.op) {
            *existing = constraint;
        } else {
            self.constraints.push(constraint);
        }
    }
}

impl Serialize for ConditionNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map =
            serializer.serialize_map(Some(self.constraints.len() + self.children.entries.len()))?;
        for constraint in &self.constraints {
            map.serialize_entry(constraint.op.as_str(), &constraint.operand)?;
        }
        for (key, node) in &self.children.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

/// Merged, insertion-ordered condition tree built from every filter token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConditionTree {
    entries: Vec<(String, ConditionNode)>,
}

impl ConditionTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConditionNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, node)| node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConditionNode)> {
        self.entries.iter().map(|(k, node)| (k.as_str(), node))
    }

    /// Every path that carries constraints, with those constraints.
    #[must_use]
    pub fn leaves(&self) -> Vec<(String, &[Constraint])> {
        let mut out = Vec::new();
        self.leaves_into("", &mut out);
        out
    }

    fn leaves_into<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a [Constraint])>) {
        for (key, node) in &self.entries {
            let full = path::join(prefix, key);
            if !node.constraints.is_empty() {
                out.push((full.clone(), node.constraints.as_slice()));
            }
            node.children.leaves_into(&full, out);
        }
    }

    fn insert(&mut self, segments: &[&str], constraint: Constraint) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        let index = if let Some(index) = self.entries.iter().position(|(k, _)| k == first) {
            index
        } else {
            self.entries
                .push(((*first).to_string(), ConditionNode::default()));
            self.entries.len() - 1
        };
        let node = &mut self.entries[index].1;
        if rest.is_empty() {
            node.push(constraint);
        } else {
            node.children.insert(rest, constraint);
        }
    }
}

impl Serialize for ConditionTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

/// Parse filter tokens into one merged [`ConditionTree`].
///
/// # Errors
///
/// Fails on the first malformed token. Partial trees are never returned,
/// since dropping one ANDed condition would widen the result set.
pub fn parse_filter<T: AsRef<str>>(tokens: &[T]) -> Result<ConditionTree, QueryError> {
    let mut tree = ConditionTree::new();
    for token in tokens {
        let parsed = FilterToken::parse(token.as_ref())?;
        let segments: Vec<&str> = parsed.path.split('.').collect();
        tree.insert(&segments, parsed.constraint());
    }
    tracing::debug!(paths = tree.len(), tokens = tokens.len(), "parsed filter");
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========================================================================
    // Token grammar
    // ========================================================================

    #[test]
    fn test_parse_token() {
        let token = FilterToken::parse("summary.text|icontains:rust").unwrap();
        assert_eq!(token.path, "summary.text");
        assert_eq!(token.operator, FilterOperator::IContains);
        assert_eq!(token.value, "rust");
    }

    #[test]
    fn test_value_may_contain_colons_and_pipes() {
        let token = FilterToken::parse("created|gt:2024-01-01T10:00:00").unwrap();
        assert_eq!(token.path, "created");
        assert_eq!(token.value, "2024-01-01T10:00:00");

        let token = FilterToken::parse("title|eq:a|b").unwrap();
        assert_eq!(token.path, "title");
        assert_eq!(token.operator, FilterOperator::Eq);
        assert_eq!(token.value, "a|b");
    }

    #[test]
    fn test_value_keeps_everything_after_the_first_colon() {
        let token = FilterToken::parse("name|eq:a:b").unwrap();
        assert_eq!(token.path, "name");
        assert_eq!(token.operator, FilterOperator::Eq);
        assert_eq!(token.value, "a:b");

        let tree = parse_filter(&["name|eq:a:b"]).unwrap();
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({"name": {"eq": "a:b"}}));
    }

    #[test]
    fn test_empty_value_is_allowed() {
        let token = FilterToken::parse("name|eq:").unwrap();
        assert_eq!(token.value, "");
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["name", "name|eq", "|eq:1", "a..b|eq:1", "name|:1"] {
            assert_eq!(
                FilterToken::parse(token),
                Err(QueryError::invalid_filter(token)),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(
            FilterToken::parse("name|regex:^a"),
            Err(QueryError::UnknownOperator {
                operator: "regex".to_string()
            })
        );
    }

    #[test]
    fn test_operator_names_round_trip() {
        for op in FilterOperator::ALL {
            assert_eq!(op.as_str().parse::<FilterOperator>(), Ok(op));
        }
    }

    // ========================================================================
    // Tree building
    // ========================================================================

    #[test]
    fn test_constraints_accumulate_on_shared_path() {
        let tree = parse_filter(&["id|gt:1", "id|lt:3"]).unwrap();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({"id": {"gt": "1", "lt": "3"}})
        );
    }

    #[test]
    fn test_same_operator_overwrites() {
        let tree = parse_filter(&["id|gt:1", "id|gt:5"]).unwrap();
        let node = tree.get("id").unwrap();
        assert_eq!(node.constraints().len(), 1);
        assert_eq!(node.constraint(ConditionOp::Gt), Some(&Operand::Scalar("5".into())));
    }

    #[test]
    fn test_in_list_splitting_and_escaping() {
        let tree = parse_filter(&["name|in:parent2,parent3"]).unwrap();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({"name": {"in": ["parent2", "parent3"]}})
        );

        let tree = parse_filter(&[r"name|nin:a\,b,c"]).unwrap();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({"name": {"nin": ["a,b", "c"]}})
        );
    }

    #[test]
    fn test_isnull_and_notnull_ignore_value() {
        let tree = parse_filter(&["name|isnull:"]).unwrap();
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({"name": {"eq": null}}));

        let tree = parse_filter(&["name|notnull:whatever"]).unwrap();
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({"name": {"ne": null}}));
    }

    #[test]
    fn test_nested_paths_merge() {
        let tree = parse_filter(&[
            "pages.number|gte:2",
            "pages.lines.text|startswith:Once",
            "title|ne:Draft",
        ])
        .unwrap();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({
                "pages": {
                    "number": {"gte": "2"},
                    "lines": {"text": {"startswith": "Once"}}
                },
                "title": {"ne": "Draft"}
            })
        );

        let leaves: Vec<String> = tree.leaves().into_iter().map(|(p, _)| p).collect();
        assert_eq!(leaves, vec!["pages.number", "pages.lines.text", "title"]);
    }

    #[test]
    fn test_constraints_and_children_share_a_node() {
        let tree = parse_filter(&["summary|notnull:", "summary.text|contains:x"]).unwrap();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({"summary": {"ne": null, "text": {"contains": "x"}}})
        );
    }

    #[test]
    fn test_one_bad_token_fails_the_whole_parse() {
        let result = parse_filter(&["id|gt:1", "broken", "id|lt:3"]);
        assert_eq!(result, Err(QueryError::invalid_filter("broken")));
    }
}
