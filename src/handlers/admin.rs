// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    exam::{bank::QuestionBank, review::build_review, scoring::percentage, stats::build_admin_stats},
    models::{
        answer::{GradeAnswerRequest, GradeAnswerResponse},
        attempt::AttemptDetail,
        exam_code::{CreateExamCodeRequest, NewExamCode, UpdateExamCodeRequest, normalize_code},
    },
    store::ExamStore,
};

/// Lists all exam codes, newest first.
/// Admin only.
pub async fn list_exam_codes(
    State(store): State<Arc<dyn ExamStore>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_exam_codes().await?))
}

/// Creates a new exam code. Codes are stored upper-cased.
/// Admin only.
pub async fn create_exam_code(
    State(store): State<Arc<dyn ExamStore>>,
    Json(payload): Json<CreateExamCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let code = store
        .create_exam_code(NewExamCode {
            code: normalize_code(&payload.code),
            name: payload.name.trim().to_string(),
            expires_at: payload.expires_at,
        })
        .await?;

    tracing::info!("Exam code {} created", code.code);

    Ok((StatusCode::CREATED, Json(code)))
}

/// Activates or deactivates an exam code.
/// Admin only.
pub async fn update_exam_code(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateExamCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let code = store
        .set_exam_code_active(id, payload.is_active)
        .await?
        .ok_or(AppError::NotFound("Exam code not found".to_string()))?;

    Ok(Json(code))
}

/// Lists completed attempts with participant names, newest first.
/// Admin only.
pub async fn list_attempts(
    State(store): State<Arc<dyn ExamStore>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_completed_attempts().await?))
}

/// Full review of one attempt, rebuilt from its stored answer key.
/// Admin only.
pub async fn get_attempt(
    State(store): State<Arc<dyn ExamStore>>,
    State(bank): State<Arc<QuestionBank>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = store
        .get_attempt(id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    let participant_name = store
        .get_participant(attempt.participant_id)
        .await?
        .map(|p| p.full_name())
        .unwrap_or_default();

    let answers = store.answers_for_attempt(attempt.id).await?;
    let review = build_review(&bank, &attempt.answer_key(&bank), &answers);

    let total_correct = attempt.total_correct.unwrap_or(0);

    Ok(Json(AttemptDetail {
        attempt_id: attempt.id,
        participant_name,
        started_at: attempt.started_at,
        completed_at: attempt.completed_at,
        is_completed: attempt.is_completed,
        is_timed_out: attempt.is_timed_out,
        total_score: attempt.total_score.unwrap_or(0),
        total_correct,
        total_questions: attempt.total_questions,
        total_time_seconds: attempt.total_time_seconds.unwrap_or(0),
        percentage: percentage(total_correct, attempt.total_questions),
        answers: review,
    }))
}

/// Deletes an attempt together with its answers.
/// Admin only.
pub async fn delete_attempt(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_attempt(id).await? {
        return Err(AppError::NotFound("Attempt not found".to_string()));
    }

    tracing::info!("Attempt {} deleted", id);

    Ok(StatusCode::NO_CONTENT)
}

/// Manual override of an answer's correctness; the attempt totals are recomputed.
/// Admin only.
pub async fn grade_answer(
    State(store): State<Arc<dyn ExamStore>>,
    Json(payload): Json<GradeAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let regraded = store
        .regrade_answer(payload.attempt_id, payload.question_id, payload.is_correct)
        .await?
        .ok_or(AppError::NotFound("Answer not found".to_string()))?;

    tracing::info!(
        "Answer to question {} of attempt {} manually graded as {}",
        payload.question_id,
        payload.attempt_id,
        if payload.is_correct { "correct" } else { "incorrect" }
    );

    Ok(Json(GradeAnswerResponse {
        answer_id: regraded.answer.id,
        is_correct: payload.is_correct,
        total_correct: regraded.totals.total_correct,
        total_score: regraded.totals.total_score,
    }))
}

/// Dashboard statistics over completed attempts.
/// Admin only.
pub async fn get_stats(
    State(store): State<Arc<dyn ExamStore>>,
    State(bank): State<Arc<QuestionBank>>,
) -> Result<impl IntoResponse, AppError> {
    let completed = store.list_completed_attempts().await?;
    let answers = store.answers_for_completed_attempts().await?;
    let started = store.count_attempts().await?;

    let stats = build_admin_stats(&bank, &completed, &answers, started.max(0) as usize);

    Ok(Json(stats))
}
