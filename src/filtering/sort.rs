use serde::{Serialize, Serializer, ser::SerializeMap};

use super::path;
use crate::errors::QueryError;

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc`/`desc` in any letter case
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl From<SortDirection> for sea_orm::Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Self::Asc,
            SortDirection::Desc => Self::Desc,
        }
    }
}

/// One level of an [`OrderMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OrderNode {
    Direction(SortDirection),
    Nested(OrderMap),
}

/// Nested, insertion-ordered sort specification.
///
/// `["pages.number:asc", "title:desc"]` becomes
/// `{pages: {number: asc}, title: desc}`, and the key order is the sort
/// precedence: the first token parsed is the primary sort key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderMap {
    entries: Vec<(String, OrderNode)>,
}

impl OrderMap {
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
    pub fn get(&self, key: &str) -> Option<&OrderNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, node)| node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OrderNode)> {
        self.entries.iter().map(|(k, node)| (k.as_str(), node))
    }

    /// Leaf paths with their direction, in precedence order.
    #[must_use]
    pub fn flatten(&self) -> Vec<(String, SortDirection)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, SortDirection)>) {
        for (key, node) in &self.entries {
            let full = path::join(prefix, key);
            match node {
                OrderNode::Direction(direction) => out.push((full, *direction)),
                OrderNode::Nested(map) => map.flatten_into(&full, out),
            }
        }
    }

    fn entry(&mut self, key: &str) -> &mut OrderNode {
        let index = if let Some(index) = self.entries.iter().position(|(k, _)| k == key) {
            index
        } else {
            self.entries
                .push((key.to_string(), OrderNode::Nested(Self::new())));
            self.entries.len() - 1
        };
        &mut self.entries[index].1
    }

    /// Write a direction at `segments`; whatever was at that exact spot is
    /// replaced, siblings are kept.
    fn insert(&mut self, segments: &[&str], direction: SortDirection) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        let node = self.entry(first);
        if rest.is_empty() {
            *node = OrderNode::Direction(direction);
            return;
        }
        if !matches!(node, OrderNode::Nested(_)) {
            *node = OrderNode::Nested(Self::new());
        }
        if let OrderNode::Nested(map) = node {
            map.insert(rest, direction);
        }
    }
}

impl Serialize for OrderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

/// Split an order token into its path and direction.
///
/// # Errors
///
/// `InvalidOrderSyntax` unless the token is exactly `path:asc` or
/// `path:desc` with a well-formed dotted path.
pub fn parse_order_token(token: &str) -> Result<(&str, SortDirection), QueryError> {
    let (field, direction) = token
        .split_once(':')
        .ok_or_else(|| QueryError::invalid_order(token))?;
    if direction.contains(':') || path::segments(field).is_none() {
        return Err(QueryError::invalid_order(token));
    }
    let direction = SortDirection::parse(direction).ok_or_else(|| QueryError::invalid_order(token))?;
    Ok((field, direction))
}

/// Parse order tokens into a nested [`OrderMap`].
///
/// # Errors
///
/// Fails on the first malformed token; nothing is partially applied.
pub fn parse_order<T: AsRef<str>>(tokens: &[T]) -> Result<OrderMap, QueryError> {
    let mut order = OrderMap::new();
    for token in tokens {
        let (field, direction) = parse_order_token(token.as_ref())?;
        let segments = path::segments(field).ok_or_else(|| QueryError::invalid_order(token.as_ref()))?;
        order.insert(&segments, direction);
    }
    tracing::debug!(keys = order.len(), tokens = tokens.len(), "parsed order");
    Ok(order)
}
