use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};

const SIMPLE_PATTERN_THRESHOLD: usize = 32;

/// Strategy for pattern matching
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    /// ASCII literal, stored lower-cased. The regex covers non-ASCII text,
    /// where Unicode case folding differs from byte-wise comparison.
    Simple { needle: String, regex: Arc<Regex> },
    /// Case-insensitive regular expression
    Regex(Arc<Regex>),
}

/// Case-insensitive matcher for the search term.
///
/// The term is compiled once per run. It is treated as a regular expression:
/// metacharacters are not escaped, so `a.c` also matches `abc`.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: String,
    strategy: MatchStrategy,
}

impl PatternMatcher {
    /// Compiles `term`; fails on an empty term or an invalid regex
    pub fn new(term: &str) -> SearchResult<Self> {
        if term.is_empty() {
            return Err(SearchError::invalid_pattern("search term is empty"));
        }

        let regex = RegexBuilder::new(term)
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::invalid_pattern(e.to_string()))?;
        let regex = Arc::new(regex);

        let strategy = if Self::is_simple_pattern(term) {
            MatchStrategy::Simple {
                needle: term.to_ascii_lowercase(),
                regex,
            }
        } else {
            MatchStrategy::Regex(regex)
        };

        Ok(Self {
            pattern: term.to_string(),
            strategy,
        })
    }

    /// The term as entered
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn strategy(&self) -> &MatchStrategy {
        &self.strategy
    }

    /// Determines if a pattern can use literal matching
    fn is_simple_pattern(pattern: &str) -> bool {
        pattern.len() < SIMPLE_PATTERN_THRESHOLD
            && pattern.is_ascii()
            && !pattern.contains(|c: char| c.is_ascii_punctuation() && c != '_' && c != '-')
            && !pattern.contains(char::is_whitespace)
    }

    /// Tests whether `text` contains the term
    pub fn is_match(&self, text: &str) -> bool {
        match &self.strategy {
            MatchStrategy::Simple { needle, .. } if text.is_ascii() => {
                contains_ignore_ascii_case(text.as_bytes(), needle.as_bytes())
            }
            MatchStrategy::Simple { regex, .. } | MatchStrategy::Regex(regex) => {
                regex.is_match(text)
            }
        }
    }
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty()
        || haystack
            .windows(needle.len())
            .any(|window| window.eq_ignore_ascii_case(needle))
}
