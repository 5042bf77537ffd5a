//! Anchored wildcard matching for action, path, and user patterns.
//!
//! `*` is the only metacharacter and expands to zero or more characters.
//! Every other character (including `.`, `+`, `?`, `[`) matches itself, so
//! user-supplied patterns can never smuggle in regex syntax. Patterns are
//! anchored at both ends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

const WILDCARD: char = '*';

/// Compiled wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Glob {
    raw: String,
    // Literal runs between wildcards; a pattern without `*` has exactly one.
    parts: Vec<String>,
}

impl Glob {
    /// Compile a pattern. Empty patterns are rejected (they would only match
    /// the empty string, which is never a meaningful action or path).
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(SentinelError::InvalidPolicy("empty pattern".into()));
        }
        let parts = pattern.split(WILDCARD).map(str::to_string).collect();
        Ok(Self {
            raw: pattern.to_string(),
            parts,
        })
    }

    /// Pattern matching every string.
    pub fn any() -> Self {
        Self {
            raw: WILDCARD.to_string(),
            parts: vec![String::new(), String::new()],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern contains no wildcard.
    pub fn is_literal(&self) -> bool {
        self.parts.len() == 1
    }

    /// Full-string match.
    pub fn matches(&self, text: &str) -> bool {
        let (first, rest) = match self.parts.split_first() {
            Some(v) => v,
            None => return false,
        };
        let Some((last, middle)) = rest.split_last() else {
            return text == first;
        };

        if text.len() < first.len() + last.len() {
            return false;
        }
        if !text.starts_with(first.as_str()) || !text.ends_with(last.as_str()) {
            return false;
        }

        // Greedy leftmost placement of the inner literals is sufficient
        // because every gap between them is a wildcard.
        let mut window = &text[first.len()..text.len() - last.len()];
        for part in middle {
            if part.is_empty() {
                continue;
            }
            match window.find(part.as_str()) {
                Some(at) => window = &window[at + part.len()..],
                None => return false,
            }
        }
        true
    }
}

impl fmt::Display for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Glob {
    type Error = SentinelError;

    fn try_from(value: String) -> Result<Self> {
        Glob::new(&value)
    }
}

impl From<Glob> for String {
    fn from(value: Glob) -> Self {
        value.raw
    }
}
