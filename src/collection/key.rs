//! Namespaced entity keys
//!
//! `<collection name>:<decimal id>`, e.g. `Book:42`.

/// Separator between collection name and id
pub const KEY_SEPARATOR: char = ':';

/// Prefix shared by every key of a collection, separator included
pub fn collection_prefix(name: &str) -> Vec<u8> {
    format!("{}{}", name, KEY_SEPARATOR).into_bytes()
}

/// Storage key of entity `id` in collection `name`
pub fn entity_key(name: &str, id: u64) -> Vec<u8> {
    format!("{}{}{}", name, KEY_SEPARATOR, id).into_bytes()
}

/// Numeric id following `prefix`, if the suffix is a decimal number
pub fn parse_id(key: &[u8], prefix: &[u8]) -> Option<u64> {
    let suffix = key.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(suffix).ok()?.parse().ok()
}
