use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Returned when a name contains no ASCII letters or digits at all.
pub const EMPTY_SLUG_PLACEHOLDER: &str = "untitled";

/// Derives a URL-safe slug from a display name.
///
/// Lowercases, strips diacritics, collapses every run of characters outside
/// `[a-z0-9]` into a single hyphen and trims hyphens from both ends.
pub fn generate_slug(name: &str) -> String {
    let folded = name
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_separator = false;

    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        EMPTY_SLUG_PLACEHOLDER.to_string()
    } else {
        slug
    }
}
