//! Truthy-string parsing shared by every consumer of option values.

/// Parse a boolean option value.
///
/// Accepts `1`, `yes`, `true`, `on` and `0`, `no`, `false`, `off` in any
/// casing, with surrounding whitespace ignored. Anything else is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Render a boolean the way option values are written back out.
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
