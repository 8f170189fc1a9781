// src/safety/normalize.rs - Canonical text variants used by the safety checker

use std::collections::HashMap;
use std::sync::OnceLock;

/// Remove control characters (code point <= 31 or 127). Space survives.
pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let cp = c as u32;
            cp > 31 && cp != 127
        })
        .collect()
}

/// Remove control characters, then all spaces. Defeats "s t r e t c h e d"
/// evasion where spaces are inserted between letters.
pub fn strip_control_and_spaces(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let cp = c as u32;
            cp > 31 && cp != 127 && c != ' '
        })
        .collect()
}

/// Collapse any run of two or more identical consecutive characters to one
/// instance, case-sensitive, in a single left-to-right pass. Idempotent.
pub fn collapse_repeats(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if prev != Some(c) {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

// Row-for-row mapping between the Latin QWERTY and Cyrillic ЙЦУКЕН layouts,
// 33 symbols per side. Catches text typed with the wrong layout active.
const LAYOUT_PAIRS: [(char, char); 33] = [
    ('q', 'й'),
    ('w', 'ц'),
    ('e', 'у'),
    ('r', 'к'),
    ('t', 'е'),
    ('y', 'н'),
    ('u', 'г'),
    ('i', 'ш'),
    ('o', 'щ'),
    ('p', 'з'),
    ('[', 'х'),
    (']', 'ъ'),
    ('a', 'ф'),
    ('s', 'ы'),
    ('d', 'в'),
    ('f', 'а'),
    ('g', 'п'),
    ('h', 'р'),
    ('j', 'о'),
    ('k', 'л'),
    ('l', 'д'),
    (';', 'ж'),
    ('\'', 'э'),
    ('z', 'я'),
    ('x', 'ч'),
    ('c', 'с'),
    ('v', 'м'),
    ('b', 'и'),
    ('n', 'т'),
    ('m', 'ь'),
    (',', 'б'),
    ('.', 'ю'),
    ('`', 'ё'),
];

fn layout_table() -> &'static HashMap<char, char> {
    static TABLE: OnceLock<HashMap<char, char>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::with_capacity(LAYOUT_PAIRS.len() * 2);
        for (latin, cyrillic) in LAYOUT_PAIRS {
            map.insert(latin, cyrillic);
            map.insert(cyrillic, latin);
        }
        map
    })
}

/// Bidirectional QWERTY <-> ЙЦУКЕН character substitution. Case-preserving;
/// characters absent from the mapping pass through unchanged.
pub fn transliterate_layout(s: &str) -> String {
    let table = layout_table();
    s.chars()
        .map(|c| {
            if let Some(&mapped) = table.get(&c) {
                return mapped;
            }
            if c.is_uppercase() {
                let lower = c.to_lowercase().next().unwrap_or(c);
                if let Some(&mapped) = table.get(&lower) {
                    return mapped.to_uppercase().next().unwrap_or(mapped);
                }
            }
            c
        })
        .collect()
}
