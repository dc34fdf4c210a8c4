//! Prefix and token checks over raw SQL text.

/// Lower-case prefixes a statement may start with to be considered read-only.
pub const READ_ONLY_PREFIXES: [&str; 2] = ["select", "with"];

/// Lower-case function-call tokens that mark an aggregate query.
pub const AGGREGATE_TOKENS: [&str; 5] = ["count(", "sum(", "avg(", "min(", "max("];

/// Lower-case phrases in a question that suggest a single summarized answer.
pub const QUESTION_AGGREGATE_KEYWORDS: [&str; 10] = [
    "total",
    "how many",
    "number of",
    "count",
    "sum",
    "average",
    "minimum",
    "maximum",
    "highest",
    "lowest",
];

/// Returns true if `sql`, trimmed and case-folded, starts with `select` or `with`.
///
/// Empty and whitespace-only input is unsafe.
pub fn is_safe_read_statement(sql: &str) -> bool {
    let normalized = sql.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    READ_ONLY_PREFIXES
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
}

/// Returns true if `sql` contains any aggregate function-call token.
///
/// Presentation hint only; never used to allow or deny execution.
pub fn has_aggregate_intent(sql: &str) -> bool {
    let lowered = sql.to_lowercase();
    AGGREGATE_TOKENS.iter().any(|token| lowered.contains(token))
}

/// Returns true if a natural-language question reads like an aggregate request.
pub fn question_has_aggregate_intent(question: &str) -> bool {
    let lowered = question.to_lowercase();
    QUESTION_AGGREGATE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
