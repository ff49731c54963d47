//! The pattern language shared by policies and grants.
//!
//! A bare `*` pattern is the catch-all: it matches every name, including
//! ones that contain `/`. Anywhere else, `*` matches one path segment (any
//! run of characters not containing `/`); `**` matches any characters,
//! including `/`. Every other character is literal. Patterns anchor the
//! full string — there is no partial match.
//!
//! Deliberately small: no character classes, no anchors beyond "the whole
//! string", no escaping, and not meant to grow.

/// Returns true iff `pattern` matches `name` under the rules above.
pub fn matches(name: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    matches_bytes(name.as_bytes(), pattern.as_bytes())
}

fn matches_bytes(name: &[u8], pattern: &[u8]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some(b'*') if pattern.get(1) == Some(&b'*') => {
            let rest = &pattern[2..];
            // `**` may match zero or more bytes, including `/`.
            for split in 0..=name.len() {
                if matches_bytes(&name[split..], rest) {
                    return true;
                }
            }
            false
        }
        Some(b'*') => {
            let rest = &pattern[1..];
            // `*` may match zero or more bytes, but never crosses `/`.
            for split in 0..=name.len() {
                if name[..split].contains(&b'/') {
                    break;
                }
                if matches_bytes(&name[split..], rest) {
                    return true;
                }
            }
            false
        }
        Some(&c) => match name.first() {
            Some(&n) if n == c => matches_bytes(&name[1..], &pattern[1..]),
            _ => false,
        },
    }
}
