//! Flow patterns: anchored regular expressions over flow tags.

use crate::Result;
use regex::Regex;
use std::sync::OnceLock;

pub use elkflow_core::flow::{LAYOUT, NEW, edge, label, node, port};

pub const ANY_SIZE: &str = ".*.size";
pub const ANY_HIDDEN: &str = ".*.hidden";
pub const COLOR_CSS: &str = ".*.cssClasses-colors";

/// A tag matcher. The pattern must match the whole tag; `negated` patterns match every tag the
/// pattern does not.
#[derive(Debug, Clone)]
pub struct FlowPattern {
    source: String,
    regex: Regex,
    negated: bool,
}

impl FlowPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&format!("^(?:{pattern})$"))?,
            negated: false,
        })
    }

    /// Matches exactly `tag`.
    pub fn literal(tag: &str) -> Self {
        Self {
            source: tag.to_string(),
            regex: Regex::new(&format!("^{}$", regex::escape(tag))).expect("valid regex"),
            negated: false,
        }
    }

    /// Matches every tag `pattern` does not.
    pub fn excluding(pattern: &str) -> Result<Self> {
        let mut this = Self::new(pattern)?;
        this.negated = true;
        Ok(this)
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.regex.is_match(tag) != self.negated
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Any change except pure color styling.
    pub fn anything_layout() -> Self {
        static PATTERN: OnceLock<FlowPattern> = OnceLock::new();
        PATTERN
            .get_or_init(|| {
                Self::excluding(&format!("{COLOR_CSS}.*")).expect("valid regex")
            })
            .clone()
    }

    pub fn any_hidden() -> Self {
        Self::new(ANY_HIDDEN).expect("valid regex")
    }

    pub fn any_size() -> Self {
        Self::new(ANY_SIZE).expect("valid regex")
    }
}

impl PartialEq for FlowPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.negated == other.negated
    }
}

impl Eq for FlowPattern {}

impl std::fmt::Display for FlowPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "!{}", self.source)
        } else {
            f.write_str(&self.source)
        }
    }
}
