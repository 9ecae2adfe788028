// src/store/mod.rs

//! Persistence seam. Handlers only talk to [`ExamStore`]; `PgStore` backs it
//! with Postgres and `MemoryStore` keeps everything in process.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::exam::scoring::ScoreTotals;
use crate::models::{
    answer::{Answer, NewAnswer},
    attempt::{Attempt, AttemptSummary, Completion, NewAttempt},
    exam_code::{ExamCode, NewExamCode},
    participant::{NewParticipant, Participant},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Answer after a manual override, with the attempt's recomputed totals.
#[derive(Debug, Clone)]
pub struct Regraded {
    pub answer: Answer,
    pub totals: ScoreTotals,
}

/// A freshly completed attempt with the answers its totals were counted from.
#[derive(Debug, Clone)]
pub struct Completed {
    pub attempt: Attempt,
    pub answers: Vec<Answer>,
    pub totals: ScoreTotals,
}

/// CRUD operations the exam flows need.
///
/// Lookups return `Ok(None)` for missing rows; callers decide how that surfaces.
#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Fails with `Conflict` when the code already exists.
    async fn create_exam_code(&self, new: NewExamCode) -> Result<ExamCode, AppError>;

    /// Looks up by normalized code, active or not.
    async fn find_exam_code(&self, code: &str) -> Result<Option<ExamCode>, AppError>;

    /// Newest first.
    async fn list_exam_codes(&self) -> Result<Vec<ExamCode>, AppError>;

    async fn set_exam_code_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<ExamCode>, AppError>;

    /// Returns the participant with the same normalized name, creating it if needed.
    async fn find_or_create_participant(
        &self,
        new: NewParticipant,
    ) -> Result<Participant, AppError>;

    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError>;

    async fn find_attempt_for(
        &self,
        participant_id: Uuid,
        exam_code_id: Uuid,
    ) -> Result<Option<Attempt>, AppError>;

    /// Fails with `Conflict` when the participant already has an attempt for the code.
    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, AppError>;

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>, AppError>;

    /// Finalizes an attempt that is not completed yet, counting its answers
    /// in the same unit of work. No answer can be written between the count
    /// and the completion flag.
    ///
    /// `Ok(None)` when the attempt does not exist or was already completed;
    /// nothing is written in that case.
    async fn complete_attempt(
        &self,
        id: Uuid,
        completion: Completion,
    ) -> Result<Option<Completed>, AppError>;

    /// Deletes the attempt and its answers. `false` when it did not exist.
    async fn delete_attempt(&self, id: Uuid) -> Result<bool, AppError>;

    /// Completed attempts joined with their participant, newest first.
    async fn list_completed_attempts(&self) -> Result<Vec<AttemptSummary>, AppError>;

    /// All attempts, finished or not.
    async fn count_attempts(&self) -> Result<i64, AppError>;

    /// Inserts or overwrites the answer for (attempt, question).
    ///
    /// `Ok(None)` when the attempt is missing or already completed, including
    /// when a completion commits while the write waits.
    async fn upsert_answer(&self, new: NewAnswer) -> Result<Option<Answer>, AppError>;

    async fn answers_for_attempt(&self, attempt_id: Uuid) -> Result<Vec<Answer>, AppError>;

    /// Answers belonging to completed attempts.
    async fn answers_for_completed_attempts(&self) -> Result<Vec<Answer>, AppError>;

    /// Overrides `is_correct` of one answer and recomputes the attempt's
    /// totals in the same unit of work. `Ok(None)` when there is no such answer.
    async fn regrade_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        is_correct: bool,
    ) -> Result<Option<Regraded>, AppError>;
}
