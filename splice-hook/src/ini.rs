//! INI document parsing
//!
//! A small reader/writer for the `[section]` / `key=value` dialect the
//! pipeline is configured with. Lines starting with `;` or `#` are comments,
//! surrounding whitespace is trimmed, and malformed lines are logged and
//! skipped rather than failing the whole document.

use crate::types::{Result, SpliceError};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// One `[section]` of key/value pairs
pub type Section = BTreeMap<String, String>;

/// Parsed INI document
///
/// Keys that appear before any section header are stored under the empty
/// section name `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: BTreeMap<String, Section>,
}

impl IniDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text; never fails, malformed lines are skipped with a warning
    pub fn parse(content: &str) -> Self {
        let mut document = Self::new();
        let mut section = String::new();

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                match header.strip_suffix(']') {
                    Some(name) => {
                        section = name.trim().to_string();
                        document.sections.entry(section.clone()).or_default();
                    }
                    None => {
                        log::warn!("Ignoring malformed section header on line {}: {:?}", line_no + 1, raw);
                    }
                }
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    document.set(&section, key.trim(), value.trim());
                }
                _ => {
                    log::warn!("Ignoring malformed line {}: {:?}", line_no + 1, raw);
                }
            }
        }

        document
    }

    /// Read and parse an INI file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SpliceError::storage(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Raw value lookup
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// String value, or `default` if the key is missing
    pub fn get(&self, section: &str, key: &str, default: &str) -> String {
        self.value(section, key).unwrap_or(default).to_string()
    }

    /// Boolean value (`true/false`, `yes/no`, `on/off`, `1/0`)
    ///
    /// Unrecognized values log a warning and fall back to `default`.
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        let Some(raw) = self.value(section, key) else {
            return default;
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => {
                log::warn!("[{}] {}: expected a boolean, got {:?}; using {}", section, key, raw, default);
                default
            }
        }
    }

    /// Integer value; unparsable values log a warning and fall back to `default`
    pub fn get_i64(&self, section: &str, key: &str, default: i64) -> i64 {
        let Some(raw) = self.value(section, key) else {
            return default;
        };
        raw.parse().unwrap_or_else(|_| {
            log::warn!("[{}] {}: expected an integer, got {:?}; using {}", section, key, raw, default);
            default
        })
    }

    /// Comma separated list with empty items removed
    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.value(section, key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Insert or overwrite a value
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// True if the section header was present
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Iterate over a section's entries
    pub fn section(&self, section: &str) -> Option<&Section> {
        self.sections.get(section)
    }

    /// Serialize back to INI text, sections in name order
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, entries) in &self.sections {
            if !name.is_empty() {
                let _ = writeln!(out, "[{}]", name);
            }
            for (key, value) in entries {
                let _ = writeln!(out, "{}={}", key, value);
            }
            out.push('\n');
        }
        out
    }

    /// Write the rendered document to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()).map_err(|e| SpliceError::storage(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
; leading comment
top = level

[cache]
enabled = false
path =  C:\Plugins\Cache\
# hash comment

[script]
index=3
target = chat
broken line
=no key
[unterminated
blacklist = a, b ,, c
"#;

    #[test]
    fn test_parse_sections_and_values() {
        let doc = IniDocument::parse(SAMPLE);

        assert_eq!(doc.get("", "top", "x"), "level");
        assert!(!doc.get_bool("cache", "enabled", true));
        assert_eq!(doc.get("cache", "path", ""), r"C:\Plugins\Cache\");
        assert_eq!(doc.get_i64("script", "index", 0), 3);
        assert_eq!(doc.get("script", "target", ""), "chat");
        assert!(doc.has_section("cache"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let doc = IniDocument::parse(SAMPLE);

        // The unterminated header does not open a new section
        assert_eq!(doc.get_list("script", "blacklist"), vec!["a", "b", "c"]);
        assert!(!doc.has_section("unterminated"));
        assert_eq!(doc.section("script").unwrap().len(), 3);
    }

    #[test]
    fn test_defaults_for_missing_and_invalid() {
        let doc = IniDocument::parse("[s]\nflag = maybe\nnum = ten\n");

        assert_eq!(doc.get("s", "missing", "fallback"), "fallback");
        assert!(doc.get_bool("s", "flag", true));
        assert_eq!(doc.get_i64("s", "num", 7), 7);
        assert!(doc.get_list("s", "missing").is_empty());
    }

    #[test]
    fn test_render_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("splice.ini");

        let mut doc = IniDocument::new();
        doc.set("script", "index", "2");
        doc.set("cache", "enabled", "yes");
        doc.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[cache]\nenabled=yes\n"));

        let reloaded = IniDocument::load(&path).unwrap();
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn test_load_missing_file() {
        let result = IniDocument::load(Path::new("/definitely/not/here.ini"));
        assert!(matches!(result, Err(SpliceError::Storage { .. })));
    }
}
