//! Statement safety classification.
//!
//! Decides whether a candidate SQL string may be executed (read-only shape)
//! and whether it looks like an aggregate query. This is a prefix check, not
//! a parser: statements disguised behind comments or chained after a leading
//! `SELECT` pass it. Chained statements are refused later by the gateway via
//! [`single_statement`].

mod classifier;
mod statement;

pub use classifier::{
    has_aggregate_intent, is_safe_read_statement, question_has_aggregate_intent,
    AGGREGATE_TOKENS, QUESTION_AGGREGATE_KEYWORDS, READ_ONLY_PREFIXES,
};
pub use statement::single_statement;

use std::fmt;

/// Reason attached to every rejected statement.
pub const READ_ONLY_REASON: &str = "only read statements permitted";

/// Result of classifying one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Statement starts with `SELECT` or `WITH`.
    pub safe: bool,
    /// Statement calls an aggregate function.
    pub aggregate: bool,
}

impl Classification {
    /// Classifies a statement.
    pub fn of(sql: &str) -> Self {
        Self {
            safe: is_safe_read_statement(sql),
            aggregate: has_aggregate_intent(sql),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.safe, self.aggregate) {
            (true, true) => write!(f, "read-only (aggregate)"),
            (true, false) => write!(f, "read-only"),
            (false, _) => write!(f, "rejected"),
        }
    }
}
