//! A deliberately tiny YAML-subset reader for `# METADATA` blocks (§6).
//!
//! Only what the annotation grammar actually uses: `key: value` pairs,
//! 2-space-indented nested maps, and `- ` sequence items (themselves either
//! scalars or single-line inline maps). Not a general YAML parser — anything
//! outside this shape is a malformed annotation.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum YamlValue {
    Scalar(String),
    List(Vec<YamlValue>),
    Map(BTreeMap<String, YamlValue>),
}

impl YamlValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            YamlValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[YamlValue]> {
        match self {
            YamlValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, YamlValue>> {
        match self {
            YamlValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum YamlLiteError {
    #[error("malformed metadata line: {0:?}")]
    Malformed(String),
    #[error("inconsistent indentation at line: {0:?}")]
    BadIndent(String),
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Parses a sequence of already-unindented comment-body lines (the `#` and
/// one following space already stripped by the caller) as a YAML-lite map.
pub fn parse_lines(lines: &[&str]) -> Result<BTreeMap<String, YamlValue>, YamlLiteError> {
    let (map, consumed) = parse_map(lines, 0)?;
    debug_assert!(consumed <= lines.len());
    Ok(map)
}

fn parse_map(
    lines: &[&str],
    base_indent: usize,
) -> Result<(BTreeMap<String, YamlValue>, usize), YamlLiteError> {
    let mut map = BTreeMap::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        let indent = indent_of(line);
        if indent < base_indent {
            break;
        }
        if indent > base_indent {
            return Err(YamlLiteError::BadIndent(line.to_string()));
        }
        let trimmed = &line[indent..];
        if trimmed.starts_with("- ") {
            break;
        }
        let (key, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| YamlLiteError::Malformed(line.to_string()))?;
        let key = key.trim().to_string();
        let rest = rest.trim();
        i += 1;
        if rest.is_empty() {
            if i < lines.len() && !lines[i].trim().is_empty() && indent_of(lines[i]) > indent {
                let child_indent = indent_of(lines[i]);
                if lines[i][child_indent..].starts_with("- ") {
                    let (list, consumed) = parse_list(&lines[i..], child_indent)?;
                    map.insert(key, YamlValue::List(list));
                    i += consumed;
                } else {
                    let (nested, consumed) = parse_map(&lines[i..], child_indent)?;
                    map.insert(key, YamlValue::Map(nested));
                    i += consumed;
                }
            } else {
                map.insert(key, YamlValue::Scalar(String::new()));
            }
        } else {
            map.insert(key, YamlValue::Scalar(rest.to_string()));
        }
    }
    Ok((map, i))
}

fn parse_list(
    lines: &[&str],
    indent: usize,
) -> Result<(Vec<YamlValue>, usize), YamlLiteError> {
    let mut items = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        let li = indent_of(line);
        if li < indent {
            break;
        }
        if li > indent {
            return Err(YamlLiteError::BadIndent(line.to_string()));
        }
        let trimmed = &line[li..];
        let item_text = trimmed
            .strip_prefix("- ")
            .ok_or_else(|| YamlLiteError::Malformed(line.to_string()))?;
        i += 1;
        if let Some((k, v)) = item_text.split_once(':') {
            let mut m = BTreeMap::new();
            m.insert(k.trim().to_string(), YamlValue::Scalar(v.trim().to_string()));
            items.push(YamlValue::Map(m));
        } else {
            items.push(YamlValue::Scalar(item_text.trim().to_string()));
        }
    }
    Ok((items, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_scalars() {
        let lines = ["title: Example", "scope: rule"];
        let map = parse_lines(&lines).unwrap();
        assert_eq!(map["title"].as_scalar(), Some("Example"));
        assert_eq!(map["scope"].as_scalar(), Some("rule"));
    }

    #[test]
    fn parses_sequence_of_scalars() {
        let lines = ["organizations:", "- Example Corp", "- Other Org"];
        let map = parse_lines(&lines).unwrap();
        let list = map["organizations"].as_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].as_scalar(), Some("Example Corp"));
    }

    #[test]
    fn parses_sequence_of_inline_maps() {
        let lines = ["schemas:", "- input.x: schema.input"];
        let map = parse_lines(&lines).unwrap();
        let list = map["schemas"].as_list().unwrap();
        let entry = list[0].as_map().unwrap();
        assert_eq!(entry["input.x"].as_scalar(), Some("schema.input"));
    }

    #[test]
    fn parses_nested_map() {
        let lines = ["custom:", "  level: high", "  retries: 3"];
        let map = parse_lines(&lines).unwrap();
        let nested = map["custom"].as_map().unwrap();
        assert_eq!(nested["level"].as_scalar(), Some("high"));
    }

    #[test]
    fn rejects_inconsistent_indentation() {
        let lines = ["custom:", "  level: high", "   retries: 3"];
        assert!(parse_lines(&lines).is_err());
    }
}
