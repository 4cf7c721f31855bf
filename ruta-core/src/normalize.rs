//! Key normalization rules shared by the index builders and the
//! integrity checker. Both sides must use the same rule for a given index.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a display name: trimmed, accents stripped, case-folded.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a zone label (lower-cased, surrounding whitespace removed).
pub fn normalize_zone(zone: &str) -> String {
    zone.trim().to_lowercase()
}

/// Product "type": the first whitespace-delimited token of the name, lower-cased.
pub fn product_type(name: &str) -> Option<String> {
    name.split_whitespace().next().map(str::to_lowercase)
}
