//! INI-style configuration parser
//!
//! Same syntax as systemd unit files: `[Section]` headers, `Key=Value`
//! lines, `#` and `;` comments, case-insensitive keys that may repeat.

use std::collections::HashMap;
use std::path::Path;

/// A section contains key-value pairs, where each key can have multiple values
/// The u32 is the order the value appeared (for stable ordering)
pub type ParsedSection = HashMap<String, Vec<(u32, String)>>;

/// A parsed file is a map of section names to their contents
pub type ParsedFile = HashMap<String, ParsedSection>;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Section '{0}' appears more than once")]
    DuplicateSection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Parse error: {0}")]
    Generic(String),
}

/// Parse a configuration file from a string.
///
/// Keys before the first section header are ignored. A line inside a section
/// that is neither a comment nor `Key=Value` is an error.
pub fn parse_file(content: &str) -> Result<ParsedFile, ParseError> {
    let mut sections = ParsedFile::new();
    let mut current: Option<(String, ParsedSection)> = None;
    let mut order = 0u32;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(ParseError::Generic(format!(
                    "line {}: unterminated section header",
                    index + 1
                )));
            }
            if let Some((name, section)) = current.take() {
                insert_section(&mut sections, name, section)?;
            }
            current = Some((line.to_string(), ParsedSection::new()));
            continue;
        }

        let Some((_, section)) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            return Err(ParseError::Generic(format!(
                "line {}: expected Key=Value",
                index + 1
            )));
        };

        let key = key.trim().to_uppercase();
        let values = split_values(&key, value.trim());
        let entry = section.entry(key).or_default();
        for v in values {
            entry.push((order, v));
            order += 1;
        }
    }

    if let Some((name, section)) = current {
        insert_section(&mut sections, name, section)?;
    }
    Ok(sections)
}

fn insert_section(
    sections: &mut ParsedFile,
    name: String,
    section: ParsedSection,
) -> Result<(), ParseError> {
    if sections.contains_key(&name) {
        return Err(ParseError::DuplicateSection(name));
    }
    sections.insert(name, section);
    Ok(())
}

/// Keys that accept space-separated multiple values
const SPACE_SEPARATED_KEYS: &[&str] = &["NAMESERVERS"];

fn split_values(key: &str, value: &str) -> Vec<String> {
    let values = if SPACE_SEPARATED_KEYS.contains(&key) {
        // Quoted entries stay whole
        shlex::split(value)
            .unwrap_or_else(|| value.split_whitespace().map(str::to_string).collect())
    } else {
        vec![value.to_string()]
    };
    values.into_iter().filter(|v| !v.is_empty()).collect()
}

/// Read and parse a configuration file from disk
pub async fn parse_config_file(path: &Path) -> Result<ParsedFile, ParseError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_file(&content)
}

/// Last value of a key; later lines override earlier ones
pub fn last_value<'a>(section: &'a ParsedSection, key: &str) -> Option<&'a str> {
    section
        .get(key)
        .and_then(|vals| vals.iter().max_by_key(|(order, _)| *order))
        .map(|(_, v)| v.as_str())
}

/// All values of a key, in file order
pub fn all_values(section: &ParsedSection, key: &str) -> Vec<String> {
    let mut vals = section.get(key).cloned().unwrap_or_default();
    vals.sort_by_key(|(order, _)| *order);
    vals.into_iter().map(|(_, v)| v).collect()
}
