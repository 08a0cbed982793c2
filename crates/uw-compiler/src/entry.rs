//! Entry normalization
//!
//! Turns what the user typed into the form stored in the blacklist.

use uw_core::term::{is_exact_term, is_regexp_term, normalize_case, TermError, TermRegex};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("The entered regular expression pattern is invalid: {0}")]
    InvalidPattern(#[from] TermError),
}

/// Normalize raw input into a blacklist entry.
///
/// Returns `Ok(None)` when nothing is left to add.
pub fn normalize_entry(raw: &str) -> Result<Option<String>, EntryError> {
    let mut entry = collapse_whitespace(raw.trim());

    // "Value" is accepted as an exact term too
    if entry.starts_with('"') {
        entry.replace_range(..1, "'");
    }
    if entry.ends_with('"') {
        let last = entry.len() - 1;
        entry.replace_range(last.., "'");
    }

    let entry = if is_exact_term(&entry) {
        entry
    } else if is_regexp_term(&entry) {
        TermRegex::parse(&entry)?.as_str().to_string()
    } else {
        normalize_case(&entry)
    };

    Ok(Some(entry).filter(|e| !e.is_empty()))
}

/// Replace every run of two or more whitespace characters by one space.
/// Single whitespace characters are kept as they are.
fn collapse_whitespace(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut run = String::new();

    for c in input.chars() {
        if c.is_whitespace() {
            run.push(c);
            continue;
        }
        flush_run(&mut result, &mut run);
        result.push(c);
    }
    flush_run(&mut result, &mut run);
    result
}

fn flush_run(result: &mut String, run: &mut String) {
    if run.chars().nth(1).is_some() {
        result.push(' ');
    } else {
        result.push_str(run);
    }
    run.clear();
}
