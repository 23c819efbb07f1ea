/// Characters of query text shown in the table's preview column
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Truncate query text for the table view. The ellipsis marker is appended
/// only when characters were actually dropped; text at or under the limit
/// passes through unchanged.
pub fn query_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{}...", truncated)
    }
}
