//! Classifier rule table.

use serde::{Deserialize, Serialize};

/// One entry of the ordered rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRule {
    /// Category reported when the rule matches (e.g., "Fraud Blocked").
    pub category: String,

    /// Substrings searched for in the lower-cased message; any hit matches.
    pub keywords: Vec<String>,
}

impl IssueRule {
    pub fn new<I, S>(category: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category: category.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Lower-case keywords and drop blanks, which would otherwise match everything.
    pub(crate) fn normalized(self) -> Self {
        Self {
            category: self.category,
            keywords: self
                .keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub(crate) fn matches_lowered(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Built-in table for the payment service's failure patterns.
pub fn default_rules() -> Vec<IssueRule> {
    vec![
        // Payment validation errors
        IssueRule::new("Invalid Amount", ["error_type=invalidamount"]),
        IssueRule::new("Duplicate Transaction", ["error_type=duplicatetransaction"]),
        IssueRule::new("Fraud Blocked", ["error_type=fraudblocked"]),
        // Critical failures
        IssueRule::new("Random Failure", ["error_type=randomfail", "event=payment_failure"]),
        // Generic failures
        IssueRule::new(
            "Payment Failure",
            ["payment failed", "transaction failed", "failed payment"],
        ),
    ]
}
