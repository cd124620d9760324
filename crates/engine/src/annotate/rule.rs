// Term list → compiled word-boundary matcher.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

/// Compiled matcher over a deduplicated term list.
///
/// Alternation is leftmost-first: at a given start position the earliest
/// listed term that completes a whole-word match wins.
#[derive(Debug, Clone)]
pub struct MatchRule {
    regex: Regex,
    terms: Vec<String>,
}

/// One non-overlapping match, as a byte range into the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch<'t> {
    pub start: usize,
    pub end: usize,
    pub text: &'t str,
}

/// Build a rule from raw terms.
///
/// Terms are trimmed, empties dropped, and duplicates removed case-sensitively
/// keeping the first position. Returns `None` when nothing is left or the
/// pattern does not compile.
pub fn build<S: AsRef<str>>(terms: &[S]) -> Option<MatchRule> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for term in terms {
        let term = term.as_ref().trim();
        if term.is_empty() || !seen.insert(term) {
            continue;
        }
        unique.push(term.to_string());
    }
    if unique.is_empty() {
        return None;
    }

    let alternation = unique.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    let pattern = format!(r"\b(?:{alternation})\b");
    match RegexBuilder::new(&pattern).case_insensitive(true).unicode(true).build() {
        Ok(regex) => Some(MatchRule { regex, terms: unique }),
        Err(error) => {
            tracing::debug!(error = %error, terms = unique.len(), "match rule failed to compile");
            None
        }
    }
}

impl MatchRule {
    /// All non-overlapping matches in `text`, left to right.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> impl Iterator<Item = RuleMatch<'t>> + 'r
    where
        't: 'r,
    {
        self.regex
            .find_iter(text)
            .map(|m| RuleMatch { start: m.start(), end: m.end(), text: m.as_str() })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// The deduplicated terms the rule was compiled from.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}
