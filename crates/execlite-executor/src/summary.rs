//! Result processing: bound the summary handed back to the caller and derive
//! the audit record for an execution.

use execlite_sandbox::{ExecutionMetrics, ExecutionResult};
use serde_json::{json, Value};

/// Longest summary returned to the caller, in characters.
pub const DEFAULT_MAX_SUMMARY_CHARS: usize = 8_000;

const ELLIPSIS: &str = "…[summary truncated]";

/// Longest label a PII placeholder carries, e.g. `CREDIT_CARD_12345`.
const MAX_PLACEHOLDER_LABEL: usize = 32;

/// Start of a PII placeholder the cut left unclosed, such as `[EMAIL_` at the end.
fn open_placeholder(cut: &str) -> Option<usize> {
    let open = cut.rfind('[')?;
    let label = &cut[open + 1..];
    let placeholder_like = label.len() <= MAX_PLACEHOLDER_LABEL
        && label
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    placeholder_like.then_some(open)
}

/// Re-serialize JSON output compactly and cap the result at `max_chars`.
/// Non-JSON output is only capped. A cut never splits a PII placeholder,
/// so the summary can still be detokenized.
pub fn compact_output(output: &str, max_chars: usize) -> String {
    let trimmed = output.trim();
    let compact = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    };
    if compact.chars().count() <= max_chars {
        return compact;
    }
    let mut cut: String = compact.chars().take(max_chars).collect();
    if let Some(open) = open_placeholder(&cut) {
        cut.truncate(open);
    }
    cut.push_str(ELLIPSIS);
    cut
}

/// Tokens the caller did not have to read because tool output stayed in the sandbox.
pub fn tokens_saved(metrics: &ExecutionMetrics) -> usize {
    metrics
        .raw_output_tokens
        .saturating_sub(metrics.tokens_in_summary)
}

/// Audit metadata for an execution outcome. Never includes output text.
pub fn execution_metadata(request_id: &str, code_hash: &str, result: &ExecutionResult) -> Value {
    json!({
        "requestId": request_id,
        "codeHash": code_hash,
        "sandbox": result.sandbox.map(|s| s.as_str()),
        "errorKind": result.error_kind,
        "piiTokenized": result.pii_tokenized,
        "metrics": result.metrics,
        "tokensSaved": tokens_saved(&result.metrics),
    })
}
