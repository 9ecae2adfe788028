// src/exam/scoring.rs

use serde::Serialize;

/// Aggregate result of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTotals {
    pub total_correct: i32,
    /// Percentage, rounded half away from zero.
    pub total_score: i32,
}

/// Rounded percentage of `correct` out of `total`; 0 when `total` is 0.
pub fn percentage(correct: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as i32
}

/// Counts correct answers and scores them against the attempt's question count.
///
/// Answers whose correctness is still unknown (`None`) count as not correct.
pub fn recompute<I>(correctness: I, total_questions: i32) -> ScoreTotals
where
    I: IntoIterator<Item = Option<bool>>,
{
    let total_correct = correctness
        .into_iter()
        .filter(|c| *c == Some(true))
        .count() as i32;

    ScoreTotals {
        total_correct,
        total_score: percentage(total_correct, total_questions),
    }
}
