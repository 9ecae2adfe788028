// src/store/postgres.rs

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{Completed, ExamStore, Regraded};
use crate::error::AppError;
use crate::exam::scoring::recompute;
use crate::models::{
    answer::{Answer, NewAnswer},
    attempt::{Attempt, AttemptSummary, Completion, NewAttempt},
    exam_code::{ExamCode, NewExamCode},
    participant::{NewParticipant, Participant},
};

const ATTEMPT_COLUMNS: &str = "id, participant_id, exam_code_id, question_order, started_at, \
     completed_at, total_questions, total_correct, total_score, total_time_seconds, \
     is_completed, is_timed_out";

const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, selected_option, written_answer, \
     is_correct, time_spent_seconds, answered_at";

/// Postgres-backed store.
///
/// The pool connects lazily and migrations run once, on the first query.
pub struct PgStore {
    pool: PgPool,
    migrated: OnceCell<()>,
}

impl PgStore {
    /// Builds the pool without touching the database.
    pub fn connect_lazy(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy(database_url)?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            migrated: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&PgPool, AppError> {
        self.migrated
            .get_or_try_init(|| async {
                tracing::info!("Running migrations...");
                sqlx::migrate!("./migrations").run(&self.pool).await?;
                tracing::info!("Migrations applied successfully.");
                Ok::<(), AppError>(())
            })
            .await?;

        Ok(&self.pool)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl ExamStore for PgStore {
    async fn create_exam_code(&self, new: NewExamCode) -> Result<ExamCode, AppError> {
        let pool = self.pool().await?;

        sqlx::query_as::<_, ExamCode>(
            r#"
            INSERT INTO exam_codes (id, code, name, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, code, name, is_active, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.code)
        .bind(&new.name)
        .bind(new.expires_at)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Exam code '{}' already exists", new.code))
            } else {
                tracing::error!("Failed to create exam code: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_exam_code(&self, code: &str) -> Result<Option<ExamCode>, AppError> {
        let pool = self.pool().await?;

        let code = sqlx::query_as::<_, ExamCode>(
            "SELECT id, code, name, is_active, created_at, expires_at FROM exam_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(pool)
        .await?;

        Ok(code)
    }

    async fn list_exam_codes(&self) -> Result<Vec<ExamCode>, AppError> {
        let pool = self.pool().await?;

        let codes = sqlx::query_as::<_, ExamCode>(
            r#"
            SELECT id, code, name, is_active, created_at, expires_at
            FROM exam_codes
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(codes)
    }

    async fn set_exam_code_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<ExamCode>, AppError> {
        let pool = self.pool().await?;

        let code = sqlx::query_as::<_, ExamCode>(
            r#"
            UPDATE exam_codes SET is_active = $2
            WHERE id = $1
            RETURNING id, code, name, is_active, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(pool)
        .await?;

        Ok(code)
    }

    async fn find_or_create_participant(
        &self,
        new: NewParticipant,
    ) -> Result<Participant, AppError> {
        let pool = self.pool().await?;

        // The no-op update makes RETURNING yield the existing row on conflict.
        let participant = sqlx::query_as::<_, Participant>(
            r#"
            INSERT INTO participants (id, first_name, last_name, full_name_normalized)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (full_name_normalized)
            DO UPDATE SET full_name_normalized = EXCLUDED.full_name_normalized
            RETURNING id, first_name, last_name, full_name_normalized, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.full_name_normalized)
        .fetch_one(pool)
        .await?;

        Ok(participant)
    }

    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError> {
        let pool = self.pool().await?;

        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, first_name, last_name, full_name_normalized, created_at FROM participants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(participant)
    }

    async fn find_attempt_for(
        &self,
        participant_id: Uuid,
        exam_code_id: Uuid,
    ) -> Result<Option<Attempt>, AppError> {
        let pool = self.pool().await?;

        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {} FROM attempts WHERE participant_id = $1 AND exam_code_id = $2",
            ATTEMPT_COLUMNS
        ))
        .bind(participant_id)
        .bind(exam_code_id)
        .fetch_optional(pool)
        .await?;

        Ok(attempt)
    }

    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, AppError> {
        let pool = self.pool().await?;

        sqlx::query_as::<_, Attempt>(&format!(
            r#"
            INSERT INTO attempts (id, participant_id, exam_code_id, question_order, total_questions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.participant_id)
        .bind(new.exam_code_id)
        .bind(&new.question_order)
        .bind(new.total_questions)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Participant has already taken this exam".to_string())
            } else {
                tracing::error!("Failed to create attempt: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>, AppError> {
        let pool = self.pool().await?;

        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {} FROM attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(attempt)
    }

    async fn complete_attempt(
        &self,
        id: Uuid,
        completion: Completion,
    ) -> Result<Option<Completed>, AppError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        // Check-and-set under a row lock: only the first completion sees
        // `is_completed = FALSE`, and answer writes wait on the lock.
        let Some(total_questions) = sqlx::query_scalar::<_, i32>(
            "SELECT total_questions FROM attempts WHERE id = $1 AND is_completed = FALSE FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let answers = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {} FROM answers WHERE attempt_id = $1 ORDER BY answered_at",
            ANSWER_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let totals = recompute(answers.iter().map(|a| a.is_correct), total_questions);

        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            UPDATE attempts
            SET completed_at = $2,
                is_completed = TRUE,
                is_timed_out = $3,
                total_time_seconds = $4,
                total_correct = $5,
                total_score = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .bind(completion.completed_at)
        .bind(completion.is_timed_out)
        .bind(completion.total_time_seconds)
        .bind(totals.total_correct)
        .bind(totals.total_score)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(Completed {
            attempt,
            answers,
            totals,
        }))
    }

    async fn delete_attempt(&self, id: Uuid) -> Result<bool, AppError> {
        let pool = self.pool().await?;

        let result = sqlx::query("DELETE FROM attempts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete attempt: {:?}", e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_completed_attempts(&self) -> Result<Vec<AttemptSummary>, AppError> {
        let pool = self.pool().await?;

        let summaries = sqlx::query_as::<_, AttemptSummary>(
            r#"
            SELECT
                a.id,
                p.first_name || ' ' || p.last_name AS participant_name,
                p.first_name,
                p.last_name,
                a.completed_at,
                a.total_score,
                a.total_correct,
                a.total_questions,
                a.total_time_seconds,
                a.is_timed_out,
                a.question_order
            FROM attempts a
            JOIN participants p ON p.id = a.participant_id
            WHERE a.is_completed = TRUE
            ORDER BY a.completed_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(summaries)
    }

    async fn count_attempts(&self) -> Result<i64, AppError> {
        let pool = self.pool().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    async fn upsert_answer(&self, new: NewAnswer) -> Result<Option<Answer>, AppError> {
        let pool = self.pool().await?;

        // FOR SHARE waits for an in-flight completion and then re-checks the row,
        // so the SELECT yields nothing once the attempt is completed.
        let answer = sqlx::query_as::<_, Answer>(&format!(
            r#"
            INSERT INTO answers
                (id, attempt_id, question_id, selected_option, written_answer, is_correct, time_spent_seconds)
            SELECT $1, $2, $3, $4, $5, $6, $7
            FROM attempts
            WHERE id = $2 AND is_completed = FALSE
            FOR SHARE
            ON CONFLICT (attempt_id, question_id) DO UPDATE
            SET selected_option = EXCLUDED.selected_option,
                written_answer = EXCLUDED.written_answer,
                is_correct = EXCLUDED.is_correct,
                time_spent_seconds = EXCLUDED.time_spent_seconds,
                answered_at = NOW()
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.attempt_id)
        .bind(new.question_id)
        .bind(&new.selected_option)
        .bind(&new.written_answer)
        .bind(new.is_correct)
        .bind(new.time_spent_seconds)
        .fetch_optional(pool)
        .await?;

        Ok(answer)
    }

    async fn answers_for_attempt(&self, attempt_id: Uuid) -> Result<Vec<Answer>, AppError> {
        let pool = self.pool().await?;

        let answers = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {} FROM answers WHERE attempt_id = $1 ORDER BY answered_at",
            ANSWER_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_all(pool)
        .await?;

        Ok(answers)
    }

    async fn answers_for_completed_attempts(&self) -> Result<Vec<Answer>, AppError> {
        let pool = self.pool().await?;

        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT ans.id, ans.attempt_id, ans.question_id, ans.selected_option, ans.written_answer,
                   ans.is_correct, ans.time_spent_seconds, ans.answered_at
            FROM answers ans
            JOIN attempts a ON a.id = ans.attempt_id
            WHERE a.is_completed = TRUE
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(answers)
    }

    async fn regrade_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        is_correct: bool,
    ) -> Result<Option<Regraded>, AppError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let Some(answer) = sqlx::query_as::<_, Answer>(&format!(
            r#"
            UPDATE answers SET is_correct = $3
            WHERE attempt_id = $1 AND question_id = $2
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        ))
        .bind(attempt_id)
        .bind(question_id)
        .bind(is_correct)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        // Row lock keeps concurrent overrides of the same attempt serialized.
        let total_questions: i32 =
            sqlx::query_scalar("SELECT total_questions FROM attempts WHERE id = $1 FOR UPDATE")
                .bind(attempt_id)
                .fetch_one(&mut *tx)
                .await?;

        let correctness: Vec<Option<bool>> =
            sqlx::query_scalar("SELECT is_correct FROM answers WHERE attempt_id = $1")
                .bind(attempt_id)
                .fetch_all(&mut *tx)
                .await?;

        let totals = recompute(correctness, total_questions);

        sqlx::query("UPDATE attempts SET total_correct = $2, total_score = $3 WHERE id = $1")
            .bind(attempt_id)
            .bind(totals.total_correct)
            .bind(totals.total_score)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(Regraded { answer, totals }))
    }
}
