// src/models/answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Sentinel `selected_option` for written questions.
pub const WRITTEN_SENTINEL: &str = "written";

/// Represents the 'answers' table in the database.
/// One row per (attempt, question); resubmitting overwrites.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: i64,

    /// Shuffled letter A-D, "true"/"false", or the written sentinel.
    pub selected_option: Option<String>,

    /// Written answer, or the motivation of a true/false answer.
    pub written_answer: Option<String>,

    pub is_correct: Option<bool>,
    pub time_spent_seconds: Option<i32>,
    pub answered_at: DateTime<Utc>,
}

/// Upsert payload for an answer.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub attempt_id: Uuid,
    pub question_id: i64,
    pub selected_option: String,
    pub written_answer: Option<String>,
    pub is_correct: bool,
    pub time_spent_seconds: i32,
}

/// DTO for submitting one answer.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub attempt_id: Uuid,
    #[validate(range(min = 1))]
    pub question_id: i64,
    #[validate(length(max = 10))]
    pub selected_option: String,
    pub written_answer: Option<String>,
    #[validate(range(min = 0))]
    pub time_spent: i32,
}

/// DTO for an admin overriding the automatic grade.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradeAnswerRequest {
    pub attempt_id: Uuid,
    #[validate(range(min = 1))]
    pub question_id: i64,
    pub is_correct: bool,
}

/// Totals after a manual override.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeAnswerResponse {
    pub answer_id: Uuid,
    pub is_correct: bool,
    pub total_correct: i32,
    pub total_score: i32,
}
