//! Term classification
//!
//! A blacklist entry carries its matching mode in its own syntax:
//!
//! - `'Value'` - exact, case-sensitive equality
//! - `~value` - loose, case-insensitive substring
//! - `/pattern/flags` - regular expression
//! - anything else - plain
//!
//! ```
//! use uw_core::term::{classify, TermKind};
//!
//! assert_eq!(classify("'Chess'").kind(), TermKind::Exact);
//! assert_eq!(classify("~poker").kind(), TermKind::Loose);
//! assert_eq!(classify("/^rust/i").kind(), TermKind::RegExp);
//! assert_eq!(classify("chess").kind(), TermKind::Plain);
//! ```

use std::fmt;

use regex::{Regex, RegexBuilder};

const EXACT_DELIMITER: char = '\'';
const LOOSE_MARKER: char = '~';
const REGEXP_DELIMITER: char = '/';

/// Flags in the order a JS `RegExp` prints them.
const CANONICAL_FLAGS: &str = "dgimsuvy";

/// Error for entries that look like a pattern literal but do not compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TermError {
    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Unsupported regular expression flag '{0}'")]
    UnsupportedFlag(char),
    #[error("Not a regular expression literal: {0}")]
    NotAPattern(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    Exact,
    Loose,
    RegExp,
    Plain,
}

/// A classified raw entry borrowing from the stored string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term<'a> {
    /// Inner value without the quotes
    Exact(&'a str),
    /// Value after the marker, not yet lowercased
    Loose(&'a str),
    /// Full `/pattern/flags` literal
    RegExp(&'a str),
    Plain(&'a str),
}

impl Term<'_> {
    pub fn kind(&self) -> TermKind {
        match self {
            Self::Exact(_) => TermKind::Exact,
            Self::Loose(_) => TermKind::Loose,
            Self::RegExp(_) => TermKind::RegExp,
            Self::Plain(_) => TermKind::Plain,
        }
    }
}

/// Classify a raw entry into exactly one form.
pub fn classify(raw: &str) -> Term<'_> {
    if is_exact_term(raw) {
        Term::Exact(&raw[1..raw.len() - 1])
    } else if let Some(rest) = raw.strip_prefix(LOOSE_MARKER) {
        Term::Loose(rest)
    } else if is_regexp_term(raw) {
        Term::RegExp(raw)
    } else {
        Term::Plain(raw)
    }
}

pub fn is_exact_term(raw: &str) -> bool {
    raw.len() >= 2 && raw.starts_with(EXACT_DELIMITER) && raw.ends_with(EXACT_DELIMITER)
}

pub fn is_loose_term(raw: &str) -> bool {
    raw.starts_with(LOOSE_MARKER)
}

pub fn is_regexp_term(raw: &str) -> bool {
    split_literal(raw).is_some()
}

/// Lowercase used for every case-insensitive comparison.
#[inline]
pub fn normalize_case(value: &str) -> String {
    value.to_lowercase()
}

/// Split `/pattern/flags` into its parts. The pattern must be non-empty and
/// the flags must be letters.
fn split_literal(raw: &str) -> Option<(&str, &str)> {
    let body = raw.strip_prefix(REGEXP_DELIMITER)?;
    let close = body.rfind(REGEXP_DELIMITER)?;
    let (pattern, flags) = (&body[..close], &body[close + 1..]);
    if pattern.is_empty() || !flags.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    Some((pattern, flags))
}

// =============================================================================
// Compiled Patterns
// =============================================================================

/// A compiled pattern term that remembers its canonical literal.
#[derive(Clone)]
pub struct TermRegex {
    regex: Regex,
    source: String,
}

impl TermRegex {
    /// Compile a `/pattern/flags` literal.
    pub fn parse(literal: &str) -> Result<Self, TermError> {
        let (pattern, flags) =
            split_literal(literal).ok_or_else(|| TermError::NotAPattern(literal.to_string()))?;

        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                // Stateful or encoding flags with no effect on a single test
                'd' | 'g' | 'u' | 'v' | 'y' => {}
                other => return Err(TermError::UnsupportedFlag(other)),
            }
        }

        let regex = builder.build().map_err(|e| TermError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            regex,
            source: format!("/{}/{}", pattern, canonical_flags(flags)),
        })
    }

    #[inline]
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Canonical `/pattern/flags` form, used for dedupe and storage.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for TermRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TermRegex").field(&self.source).finish()
    }
}

impl fmt::Display for TermRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for TermRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

fn canonical_flags(flags: &str) -> String {
    CANONICAL_FLAGS.chars().filter(|c| flags.contains(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exact() {
        assert_eq!(classify("'Chess'"), Term::Exact("Chess"));
        assert_eq!(classify("''"), Term::Exact(""));
        // A lone quote is not a delimiter pair
        assert_eq!(classify("'"), Term::Plain("'"));
    }

    #[test]
    fn test_classify_loose() {
        assert_eq!(classify("~Poker"), Term::Loose("Poker"));
        assert!(is_loose_term("~"));
    }

    #[test]
    fn test_classify_regexp() {
        assert_eq!(classify("/^a.c$/i"), Term::RegExp("/^a.c$/i"));
        assert_eq!(classify("/a/b/"), Term::RegExp("/a/b/"));
        assert_eq!(classify("//"), Term::Plain("//"));
        assert_eq!(classify("/abc"), Term::Plain("/abc"));
        assert_eq!(classify("/abc/I"), Term::Plain("/abc/I"));
    }

    #[test]
    fn test_classify_plain() {
        assert_eq!(classify("just chatting"), Term::Plain("just chatting"));
        assert_eq!(classify("it's"), Term::Plain("it's"));
    }

    #[test]
    fn test_regex_flags() {
        let re = TermRegex::parse("/^slots/i").unwrap();
        assert!(re.is_match("SLOTS and more"));
        assert!(!re.is_match("more slots"));

        let re = TermRegex::parse("/^slots/").unwrap();
        assert!(!re.is_match("SLOTS"));
    }

    #[test]
    fn test_regex_canonical_source() {
        let re = TermRegex::parse("/x/yig").unwrap();
        assert_eq!(re.as_str(), "/x/giy");
        assert_eq!(re, TermRegex::parse("/x/igy").unwrap());
    }

    #[test]
    fn test_regex_rejects_invalid() {
        assert!(matches!(
            TermRegex::parse("/([a-z]/"),
            Err(TermError::InvalidPattern { .. })
        ));
        assert!(matches!(
            TermRegex::parse("plain"),
            Err(TermError::NotAPattern(_))
        ));
        assert_eq!(
            TermRegex::parse("/a/q").unwrap_err(),
            TermError::UnsupportedFlag('q')
        );
    }
}
