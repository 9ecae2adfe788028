// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::exam::{answer_key::AnswerKey, bank::QuestionBank, review::ReviewEntry};
use crate::models::question::PublicQuestion;

/// Represents the 'attempts' table in the database.
/// One participant's run through the exam.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub exam_code_id: Uuid,

    /// Serialized answer key (see `exam::answer_key`). Never sent to participants.
    #[serde(skip)]
    pub question_order: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_questions: i32,
    pub total_correct: Option<i32>,
    pub total_score: Option<i32>,
    pub total_time_seconds: Option<i32>,
    pub is_completed: bool,
    pub is_timed_out: bool,
}

impl Attempt {
    /// The stored answer key, or bank order when it is missing or unreadable.
    pub fn answer_key(&self, bank: &QuestionBank) -> AnswerKey {
        AnswerKey::parse_or_bank_order(self.question_order.as_deref(), bank)
    }
}

/// Insert payload for a freshly randomized attempt.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub participant_id: Uuid,
    pub exam_code_id: Uuid,
    pub question_order: String,
    pub total_questions: i32,
}

/// Fields written once when an attempt is finished.
/// Totals are counted by the store when it completes the attempt.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub completed_at: DateTime<Utc>,
    pub is_timed_out: bool,
    pub total_time_seconds: i32,
}

/// Completed attempt joined with its participant, for admin listings and statistics.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub id: Uuid,
    pub participant_name: String,
    #[serde(skip)]
    pub first_name: String,
    #[serde(skip)]
    pub last_name: String,
    #[serde(rename = "date")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "score")]
    pub total_score: Option<i32>,
    pub total_correct: Option<i32>,
    pub total_questions: i32,
    #[serde(rename = "timeSeconds")]
    pub total_time_seconds: Option<i32>,
    pub is_timed_out: bool,
    #[serde(skip)]
    pub question_order: Option<String>,
}

fn validate_person_name(name: &str) -> Result<(), validator::ValidationError> {
    let len = name.trim().chars().count();
    if len == 0 || len > 100 {
        return Err(validator::ValidationError::new("name_length"));
    }
    Ok(())
}

/// DTO for starting an exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartExamRequest {
    #[validate(length(min = 1, max = 50))]
    pub exam_code: String,
    #[validate(custom(function = validate_person_name))]
    pub first_name: String,
    #[validate(custom(function = validate_person_name))]
    pub last_name: String,
}

/// DTO returned when an exam starts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExamResponse {
    pub attempt_id: Uuid,
    pub questions: Vec<PublicQuestion>,
    /// Seconds.
    pub time_limit: u64,
}

/// DTO for finishing an exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteExamRequest {
    pub attempt_id: Uuid,
    #[serde(default)]
    pub is_timed_out: bool,
    #[validate(range(min = 0))]
    pub total_time_seconds: i32,
}

/// Scored result with per-question review.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub attempt_id: Uuid,
    pub total_score: i32,
    pub total_correct: i32,
    pub total_questions: i32,
    pub total_time_seconds: i32,
    pub percentage: i32,
    pub answers: Vec<ReviewEntry>,
}

/// Admin view of a single attempt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetail {
    pub attempt_id: Uuid,
    pub participant_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub is_timed_out: bool,
    pub total_score: i32,
    pub total_correct: i32,
    pub total_questions: i32,
    pub total_time_seconds: i32,
    pub percentage: i32,
    pub answers: Vec<ReviewEntry>,
}
