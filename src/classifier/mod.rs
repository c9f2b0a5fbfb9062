//! Issue classification.
//!
//! # Data Flow
//! ```text
//! LogRecord::full_message()
//!     → lower-case once
//!     → rules.rs table, in declaration order
//!     → first rule with a keyword hit → category name
//! ```
//!
//! # Design Decisions
//! - The rule table is data; new categories are appended, never branched on
//! - First match wins, so precedence is the order of the table
//! - Keywords are normalized at construction so `classify` is allocation-light and pure

pub mod rules;

pub use rules::{default_rules, IssueRule};

use crate::config::ClassifierConfig;

/// Maps a raw log message to the first matching issue category.
#[derive(Debug, Clone)]
pub struct IssueClassifier {
    rules: Vec<IssueRule>,
}

impl IssueClassifier {
    /// Build a classifier from an ordered rule table.
    pub fn new(rules: Vec<IssueRule>) -> Self {
        Self {
            rules: rules.into_iter().map(IssueRule::normalized).collect(),
        }
    }

    /// Build the table described by the classifier config section.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut rules = if config.include_defaults {
            default_rules()
        } else {
            Vec::new()
        };
        rules.extend(config.rules.iter().cloned());
        Self::new(rules)
    }

    /// Return the category of the first rule matching `message`, if any.
    pub fn classify(&self, message: &str) -> Option<&str> {
        let lowered = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches_lowered(&lowered))
            .map(|rule| rule.category.as_str())
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[IssueRule] {
        &self.rules
    }
}

impl Default for IssueClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}
