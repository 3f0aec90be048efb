//! Index-time mappers: normalize a resolved value before trie traversal
//! (§4.4 "a whitelisted set of call-based predicates may be indexed via
//! mappers", GLOSSARY "Mapper").
//!
//! Only `glob.match(pattern, delimiters, x)` is supported, matching the
//! whitelist named in the spec.

use aho_corasick::AhoCorasick;

/// Splits `pattern` on the literal `delimiters` into trie segments at
/// build time, and splits a resolved candidate value the same way at query
/// time so the two can be compared segment-by-segment.
#[derive(Debug, Clone)]
pub struct GlobMapper {
    pattern_segments: Vec<String>,
    delimiters: Vec<String>,
}

impl GlobMapper {
    pub fn new(pattern: &str, delimiters: Vec<String>) -> Self {
        let pattern_segments = split_by_delims(pattern, &delimiters);
        GlobMapper {
            pattern_segments,
            delimiters,
        }
    }

    pub fn pattern_segments(&self) -> &[String] {
        &self.pattern_segments
    }

    /// True if `candidate`, split the same way, matches this mapper's
    /// pattern segments (`*` matches any single segment).
    pub fn matches(&self, candidate: &str) -> bool {
        let segments = split_by_delims(candidate, &self.delimiters);
        if segments.len() != self.pattern_segments.len() {
            return false;
        }
        segments
            .iter()
            .zip(self.pattern_segments.iter())
            .all(|(s, p)| p == "*" || s == p)
    }
}

/// Splits `s` on any occurrence of any string in `delims`, dropping the
/// delimiters themselves. Falls back to returning `[s]` whole when `delims`
/// is empty.
pub fn split_by_delims(s: &str, delims: &[String]) -> Vec<String> {
    if delims.is_empty() || s.is_empty() {
        return vec![s.to_string()];
    }
    let ac = match AhoCorasick::new(delims) {
        Ok(ac) => ac,
        Err(_) => return vec![s.to_string()],
    };
    let mut segments = Vec::new();
    let mut last = 0;
    for m in ac.find_iter(s) {
        segments.push(s[last..m.start()].to_string());
        last = m.end();
    }
    segments.push(s[last..].to_string());
    segments
}
