//! Property Paths
//!
//! Clients address the value graph with property paths such as
//! `a.b[2].c` or `items["first name"]`. This module turns those *source*
//! strings into *canonical* token sequences and interns both forms into
//! small dense identifiers.
//!
//! # Canonical Form
//!
//! Bracket notation is rewritten to dotted tokens, so `a[0].b`, `a.0.b`
//! and `a["0"].b` all share one canonical identifier. Negative indices are
//! kept verbatim; they are resolved against the live value when read.
//!
//! The reserved [`GLOBAL_SELECTOR`] is never split: it is always a path of
//! length one addressing the entire root value. A path with no tokens at
//! all is read as the global selector.

mod repository;

pub use repository::{PathIds, PathRepository};

/// Reserved path addressing the entire root value.
pub const GLOBAL_SELECTOR: &str = "@@GLOBAL";

/// Split a source path into canonical tokens.
pub fn tokenize(source: &str) -> Vec<String> {
    let source = source.trim();
    if source == GLOBAL_SELECTOR {
        return vec![GLOBAL_SELECTOR.to_owned()];
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = source.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current, &mut tokens),
            '[' => {
                flush(&mut current, &mut tokens);
                let mut inner = String::new();
                let mut quote: Option<char> = None;
                let mut quoted = false;
                for c in chars.by_ref() {
                    match quote {
                        Some(q) if c == q => quote = None,
                        Some(_) => inner.push(c),
                        None if c == ']' => break,
                        None if (c == '"' || c == '\'') && inner.is_empty() && !quoted => {
                            quote = Some(c);
                            quoted = true;
                        }
                        None => inner.push(c),
                    }
                }
                if quoted {
                    tokens.push(inner);
                } else {
                    let trimmed = inner.trim();
                    if !trimmed.is_empty() {
                        tokens.push(trimmed.to_owned());
                    }
                }
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    if tokens.is_empty() {
        tokens.push(GLOBAL_SELECTOR.to_owned());
    }
    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    let token = current.trim();
    if !token.is_empty() {
        tokens.push(token.to_owned());
    }
    current.clear();
}

/// Render canonical tokens as a dotted path.
pub fn canonical<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(token.as_ref());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_become_dotted_tokens() {
        assert_eq!(tokenize("a.b[2].c"), vec!["a", "b", "2", "c"]);
        assert_eq!(tokenize("[0].name"), vec!["0", "name"]);
        assert_eq!(tokenize("list[-1]"), vec!["list", "-1"]);
    }

    #[test]
    fn quoted_brackets_keep_their_content() {
        assert_eq!(tokenize(r#"a["x.y"]"#), vec!["a", "x.y"]);
        assert_eq!(tokenize("a['first name'].b"), vec!["a", "first name", "b"]);
    }

    #[test]
    fn global_selector_is_atomic() {
        assert_eq!(tokenize(GLOBAL_SELECTOR), vec![GLOBAL_SELECTOR]);
        assert_eq!(tokenize("  @@GLOBAL "), vec![GLOBAL_SELECTOR]);
    }

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(tokenize("a..b."), vec!["a", "b"]);
        assert_eq!(tokenize(""), vec![GLOBAL_SELECTOR]);
    }

    #[test]
    fn canonical_joins_with_dots() {
        assert_eq!(canonical(&tokenize("a[1]['b']")), "a.1.b");
    }
}
