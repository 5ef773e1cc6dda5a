//! Dotted path helpers shared by the filter, order and population code.

/// Split a dotted path into its segments.
///
/// Returns `None` when the path is empty or has an empty segment
/// (`"a..b"`, `".a"`, `"a."`).
#[must_use]
pub fn segments(path: &str) -> Option<Vec<&str>> {
    if path.is_empty() {
        return None;
    }
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    Some(parts)
}

/// Append one segment to a path prefix.
#[must_use]
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Whether `requested` is `path` itself or continues it past a `.` boundary.
///
/// `covers("pages.lines", "pages")` is true, `covers("pagesX", "pages")` and
/// `covers("pages", "page")` are not.
#[must_use]
pub fn covers(requested: &str, path: &str) -> bool {
    match requested.strip_prefix(path) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// Split a list value on commas that are not escaped as `\,`, unescaping the
/// escaped ones.
#[must_use]
pub fn split_unescaped_commas(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}
