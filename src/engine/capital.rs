//! Controlling-capital classification of a scored submission.

use crate::types::SubmissionStatus;

/// Minimum consistency (percent of eras beating the benchmark).
pub const CONSISTENCY_THRESHOLD: f64 = 75.0;

/// Did the submission earn controlling capital?
///
/// A status with any pending metric is never controlling capital. A
/// missing metric counts as failing.
pub fn is_controlling_capital(status: &SubmissionStatus) -> bool {
    if status.has_pending() {
        return false;
    }
    let consistent = status
        .get("consistency")
        .and_then(|v| v.as_f64())
        .is_some_and(|c| c >= CONSISTENCY_THRESHOLD);
    let original = status.get("originality").is_some_and(|v| v.is_truthy());
    let concordant = status.get("concordance").is_some_and(|v| v.is_truthy());

    consistent && original && concordant
}
