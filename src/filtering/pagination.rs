use axum::http::{
    HeaderValue,
    header::{CONTENT_RANGE, HeaderMap},
};

/// Keep only printable ASCII so the name is always a valid header value
fn sanitize_resource_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

/// Build the `Content-Range` header for one page of a list.
///
/// # Arguments
///
/// * `offset` - Index of the first item in the page.
/// * `limit` - Page size that was applied.
/// * `total_count` - Number of items matching the query.
/// * `resource_name` - Plural resource name, sanitized before use.
///
/// The header reads `{name} {offset}-{last}/{total}` where `last` is the
/// index of the last item in the page, never below `offset`.
#[must_use]
pub fn calculate_content_range(offset: u64, limit: u64, total_count: u64, resource_name: &str) -> HeaderMap {
    let last = offset
        .saturating_add(limit)
        .min(total_count)
        .saturating_sub(1)
        .max(offset);
    let safe_name = sanitize_resource_name(resource_name);

    let value = HeaderValue::from_str(&format!("{safe_name} {offset}-{last}/{total_count}"))
        .unwrap_or_else(|_| HeaderValue::from_static("items 0-0/0"));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_RANGE, value);
    headers
}
