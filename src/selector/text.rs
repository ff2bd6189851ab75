//! Text-matcher grammar shared by the `text`/`text:light` engines and by
//! `expect`'s `ExpectedTextMatcher`.

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum TextMatcher {
    /// `/pattern/flags`
    Regex(Regex),
    /// Quoted body: exact string equality.
    Strict(String),
    /// Bare body: case-insensitive, whitespace-normalized substring.
    Lax(String),
}

impl PartialEq for TextMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TextMatcher::Regex(a), TextMatcher::Regex(b)) => a.as_str() == b.as_str(),
            (TextMatcher::Strict(a), TextMatcher::Strict(b)) => a == b,
            (TextMatcher::Lax(a), TextMatcher::Lax(b)) => a == b,
            _ => false,
        }
    }
}

pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a selector-engine text body (as opposed to a bare expected-value
/// string passed directly to `expect`, see [`TextMatcher::compile_expected`]).
pub fn compile_body(body: &str) -> Result<TextMatcher> {
    if body.len() >= 2 && body.starts_with('/') {
        if let Some(end) = body.rfind('/') {
            if end > 0 {
                let pattern = &body[1..end];
                let flags = &body[end + 1..];
                return compile_regex(pattern, flags).map(TextMatcher::Regex);
            }
        }
    }
    if body.len() >= 2 {
        let bytes = body.as_bytes();
        let quote = bytes[0];
        if (quote == b'\'' || quote == b'"') && bytes[bytes.len() - 1] == quote {
            return Ok(TextMatcher::Strict(body[1..body.len() - 1].to_string()));
        }
    }
    Ok(TextMatcher::Lax(body.to_string()))
}

fn compile_regex(pattern: &str, flags: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for f in flags.chars() {
        match f {
            'i' => {
                builder.case_insensitive(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            'u' => {} // unicode is already on by default in `regex`
            other => {
                return Err(Error::MalformedSelector {
                    selector: format!("/{pattern}/{flags}"),
                    reason: format!("unsupported regex flag '{other}'"),
                })
            }
        }
    }
    builder.build().map_err(|e| Error::MalformedSelector { selector: format!("/{pattern}/{flags}"), reason: e.to_string() })
}

impl TextMatcher {
    pub fn matches(&self, haystack: &str) -> bool {
        match self {
            TextMatcher::Regex(re) => re.is_match(haystack),
            TextMatcher::Strict(expected) => haystack == expected,
            TextMatcher::Lax(expected) => {
                normalize_whitespace(haystack).to_lowercase().contains(&normalize_whitespace(expected).to_lowercase())
            }
        }
    }

    pub fn kind(&self) -> MatchKind {
        match self {
            TextMatcher::Strict(_) => MatchKind::Strict,
            _ => MatchKind::Lax,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Strict,
    Lax,
}

/// Result of testing a single element's own text (not its descendants) and
/// its full (self + descendants) text against a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTextMatch {
    None,
    SelfOnly,
    SelfAndChildren,
}

/// Expected-value matcher used by `expect`'s string receivers. Distinct from
/// [`TextMatcher`] only in that it may optionally normalize whitespace on
/// both sides for substring/exact modes (regex never normalizes).
#[derive(Debug, Clone)]
pub struct ExpectedTextMatcher {
    pub matcher: TextMatcher,
    pub normalize_whitespace: bool,
}

impl ExpectedTextMatcher {
    pub fn matches(&self, actual: &str) -> bool {
        match &self.matcher {
            TextMatcher::Regex(re) => re.is_match(actual),
            TextMatcher::Strict(expected) => {
                if self.normalize_whitespace {
                    normalize_whitespace(actual) == normalize_whitespace(expected)
                } else {
                    actual == expected
                }
            }
            TextMatcher::Lax(expected) => {
                let (a, e) = if self.normalize_whitespace {
                    (normalize_whitespace(actual), normalize_whitespace(expected))
                } else {
                    (actual.to_string(), expected.to_string())
                };
                a.contains(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lax_is_case_insensitive_substring() {
        let m = compile_body("hello").unwrap();
        assert!(m.matches("  HELLO world  "));
        assert!(!m.matches("goodbye"));
    }

    #[test]
    fn strict_requires_exact_match() {
        let m = compile_body("'Hello'").unwrap();
        assert!(m.matches("Hello"));
        assert!(!m.matches("hello"));
        assert!(!m.matches("Hello world"));
    }

    #[test]
    fn regex_body_with_flags() {
        let m = compile_body("/^h.llo$/i").unwrap();
        assert!(m.matches("HELLO"));
        assert!(!m.matches("hxllox"));
    }

    #[test]
    fn expected_text_matcher_normalizes_whitespace() {
        let m = ExpectedTextMatcher { matcher: TextMatcher::Strict("a b".to_string()), normalize_whitespace: true };
        assert!(m.matches("a    b"));
    }
}
