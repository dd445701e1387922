//! Text normalization helpers shared by the page and PDF extractors

/// Collapses every run of whitespace into a single space and trims both ends
///
/// Normalization is idempotent: normalizing already normalized text returns
/// it unchanged.
///
/// # Examples
///
/// ```
/// use site_harvest::text::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  Hello \n\t  World  "), "Hello World");
/// ```
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates text to at most `limit` characters (not bytes)
///
/// A trailing space left behind by the cut is dropped so that the result
/// stays normalized.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => text[..byte_index].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Normalizes whitespace and applies a character cap in one step
pub fn normalize_and_cap(text: &str, limit: usize) -> String {
    truncate_chars(&normalize_whitespace(text), limit)
}

/// Number of characters in `text`, as reported in record length fields
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
