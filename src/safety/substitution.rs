// src/safety/substitution.rs - Homoglyph / leet-speak replacement before matching

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// Errors from the replacement substitutor. Both variants are converted to a
/// fail-closed verdict at the check boundary; unfiltered text never passes.
#[derive(Debug, thiserror::Error)]
pub enum SubstitutionError {
    #[error("failed to compile replacement pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("matched token '{token}' has no replacement value")]
    MissingReplacement { token: String },
}

/// Apply a replacement map to `text`: every non-overlapping, leftmost match of
/// any key (case-insensitive, escaped as a literal) is replaced by its mapped
/// value. An empty map is the identity and builds no pattern.
pub fn apply_replacements(
    text: &str,
    map: &HashMap<String, String>,
) -> Result<String, SubstitutionError> {
    if map.is_empty() {
        return Ok(text.to_string());
    }

    let pattern = compile_pattern(map)?;
    let lookup: HashMap<String, &str> = map
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.as_str()))
        .collect();
    substitute_with(text, &pattern, &lookup)
}

/// Build one case-insensitive alternation over all keys, longest keys first so
/// the longest obfuscated token wins at a given position.
fn compile_pattern(map: &HashMap<String, String>) -> Result<Regex, SubstitutionError> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()?;
    Ok(pattern)
}

/// Replace every match of `pattern` via lowercased lookup. A token the pattern
/// matched but the map does not know is an internal error, not a pass.
fn substitute_with(
    text: &str,
    pattern: &Regex,
    lookup: &HashMap<String, &str>,
) -> Result<String, SubstitutionError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in pattern.find_iter(text) {
        let token = m.as_str().to_lowercase();
        let replacement = lookup
            .get(&token)
            .ok_or(SubstitutionError::MissingReplacement { token })?;
        out.push_str(&text[last..m.start()]);
        out.push_str(replacement);
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}
