//! Path-safe name sanitization
//!
//! Resource names and session labels come from the host and end up as
//! directory names, so they are reduced to something every filesystem accepts.

/// Characters that are never allowed in a path component
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Substring removed case-insensitively (keeps URL schemes out of paths)
const DISALLOWED_WORD: &str = "http";

/// Device names Windows reserves regardless of extension
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Used when nothing survives sanitization
const PLACEHOLDER: &str = "_unnamed";

/// Turn an arbitrary name into a safe single path component
///
/// # Example
/// ```
/// use splice_hook::cache::sanitize_name;
///
/// assert_eq!(sanitize_name("CON"), "_CON");
/// assert_eq!(sanitize_name("http://evil\\name"), "evilname");
/// ```
pub fn sanitize_name(name: &str) -> String {
    let mut result: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();

    // Removing one occurrence can join the remainder into a new one
    while let Some(position) = result.to_ascii_lowercase().find(DISALLOWED_WORD) {
        result.replace_range(position..position + DISALLOWED_WORD.len(), "");
    }

    let trimmed_len = result.trim_end_matches(['.', ' ']).len();
    result.truncate(trimmed_len);

    if result.is_empty() {
        return PLACEHOLDER.to_string();
    }

    if is_reserved(&result) {
        result.insert(0, '_');
    }

    result
}

/// Check the part before the first dot against the reserved device names
fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_device_names() {
        assert_eq!(sanitize_name("CON"), "_CON");
        assert_eq!(sanitize_name("nul"), "_nul");
        assert_eq!(sanitize_name("com7.lua"), "_com7.lua");
        // Only exact device names are reserved
        assert_eq!(sanitize_name("CONSOLE"), "CONSOLE");
        assert_eq!(sanitize_name("COM10"), "COM10");
    }

    #[test]
    fn test_url_is_flattened() {
        assert_eq!(sanitize_name("http://evil\\name"), "evilname");
        assert_eq!(sanitize_name("HTTPS://127.0.0.1:30120"), "S127.0.0.130120");
    }

    #[test]
    fn test_disallowed_word_removed_repeatedly() {
        // Removing the inner "http" forms another one
        assert_eq!(sanitize_name("hthttptp-x"), "-x");
        assert_eq!(sanitize_name("HtTp"), PLACEHOLDER);
    }

    #[test]
    fn test_illegal_and_control_characters() {
        assert_eq!(sanitize_name("a*b?c\"d<e>f|g"), "abcdefg");
        assert_eq!(sanitize_name("tab\there\n"), "tabhere");
    }

    #[test]
    fn test_trailing_dots_and_spaces() {
        assert_eq!(sanitize_name("chat. . "), "chat");
        assert_eq!(sanitize_name("..."), PLACEHOLDER);
    }

    #[test]
    fn test_empty_falls_back_to_placeholder() {
        assert_eq!(sanitize_name(""), PLACEHOLDER);
        assert_eq!(sanitize_name("://"), PLACEHOLDER);
    }

    #[test]
    fn test_ordinary_names_untouched() {
        assert_eq!(sanitize_name("spawn_manager-2"), "spawn_manager-2");
        assert_eq!(sanitize_name("résumé"), "résumé");
    }
}
