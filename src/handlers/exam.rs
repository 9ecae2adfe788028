// src/handlers/exam.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    exam::{
        bank::QuestionBank,
        grader::grade,
        randomizer::build_attempt,
        review::build_review,
        scoring::percentage,
    },
    models::{
        answer::{NewAnswer, SubmitAnswerRequest, WRITTEN_SENTINEL},
        attempt::{
            CompleteExamRequest, Completion, ExamResult, NewAttempt, StartExamRequest,
            StartExamResponse,
        },
        exam_code::{ValidateCodeRequest, ValidateCodeResponse, normalize_code},
        participant::NewParticipant,
        question::{OptionKey, QuestionKind},
    },
    store::{Completed, ExamStore},
    utils::html::clean_html,
};

/// Checks an exam code before the participant enters their name.
///
/// Unknown and inactive codes are reported as not valid rather than as errors.
pub async fn validate_code(
    State(store): State<Arc<dyn ExamStore>>,
    Json(payload): Json<ValidateCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let code = store.find_exam_code(&normalize_code(&payload.code)).await?;

    let response = match code {
        Some(code) if code.is_active && code.is_expired(Utc::now()) => ValidateCodeResponse {
            valid: false,
            expired: true,
            exam_code_id: None,
            exam_name: None,
        },
        Some(code) if code.is_active => ValidateCodeResponse {
            valid: true,
            expired: false,
            exam_code_id: Some(code.id),
            exam_name: Some(code.name),
        },
        _ => ValidateCodeResponse {
            valid: false,
            expired: false,
            exam_code_id: None,
            exam_name: None,
        },
    };

    Ok(Json(response))
}

/// Starts an attempt: shuffles the bank with a fresh seed and stores the answer key.
///
/// Returns 201 with the participant view of the questions and the time limit.
pub async fn start_exam(
    State(store): State<Arc<dyn ExamStore>>,
    State(bank): State<Arc<QuestionBank>>,
    State(config): State<Config>,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exam_code = store
        .find_exam_code(&normalize_code(&payload.exam_code))
        .await?
        .filter(|code| code.is_active)
        .ok_or(AppError::NotFound("Invalid or inactive exam code".to_string()))?;

    if exam_code.is_expired(Utc::now()) {
        return Err(AppError::BadRequest("Exam code has expired".to_string()));
    }

    let participant = store
        .find_or_create_participant(NewParticipant::new(
            &payload.first_name,
            &payload.last_name,
        ))
        .await?;

    if store
        .find_attempt_for(participant.id, exam_code.id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Participant has already taken this exam".to_string(),
        ));
    }

    let seed = rand::random::<u32>() as i64;
    let layout = build_attempt(&bank, seed);
    let question_order = layout
        .answer_key
        .to_json()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let attempt = store
        .create_attempt(NewAttempt {
            participant_id: participant.id,
            exam_code_id: exam_code.id,
            question_order,
            total_questions: layout.questions.len() as i32,
        })
        .await?;

    tracing::info!(
        "Attempt {} started by {} for code {}",
        attempt.id,
        participant.full_name(),
        exam_code.code
    );

    Ok((
        StatusCode::CREATED,
        Json(StartExamResponse {
            attempt_id: attempt.id,
            questions: layout.questions,
            time_limit: config.time_limit_seconds(),
        }),
    ))
}

/// Grades and stores one answer. Resubmitting the same question overwrites it.
pub async fn submit_answer(
    State(store): State<Arc<dyn ExamStore>>,
    State(bank): State<Arc<QuestionBank>>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let attempt = store
        .get_attempt(payload.attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.is_completed {
        return Err(AppError::Conflict("Attempt is already completed".to_string()));
    }

    let answer_key = attempt.answer_key(&bank);
    let entry = answer_key.entry(payload.question_id).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Question {} is not part of this attempt",
            payload.question_id
        ))
    })?;
    let question = bank.get(payload.question_id).ok_or_else(|| {
        AppError::NotFound(format!("Question {} not found", payload.question_id))
    })?;

    let written_answer = payload
        .written_answer
        .as_deref()
        .filter(|text| !text.trim().is_empty());

    let selected_option = match &question.kind {
        QuestionKind::MultipleChoice { .. } => {
            if OptionKey::parse(&payload.selected_option).is_none() {
                return Err(AppError::BadRequest(
                    "Multiple-choice answers must be one of A, B, C or D".to_string(),
                ));
            }
            payload.selected_option.clone()
        }
        QuestionKind::TrueFalse { .. } => {
            if !matches!(payload.selected_option.as_str(), "true" | "false") {
                return Err(AppError::BadRequest(
                    "True/false answers must be \"true\" or \"false\"".to_string(),
                ));
            }
            payload.selected_option.clone()
        }
        QuestionKind::Written { max_length, .. } => {
            if written_answer.is_some_and(|text| text.chars().count() > *max_length) {
                return Err(AppError::BadRequest(format!(
                    "Written answer exceeds {} characters",
                    max_length
                )));
            }
            WRITTEN_SENTINEL.to_string()
        }
    };

    let result = grade(question, &selected_option, written_answer, entry)?;

    let saved = store
        .upsert_answer(NewAnswer {
            attempt_id: attempt.id,
            question_id: question.id,
            selected_option,
            written_answer: written_answer.map(clean_html),
            is_correct: result.is_correct,
            time_spent_seconds: payload.time_spent,
        })
        .await?;

    // The attempt was completed between the check above and the write.
    if saved.is_none() {
        return Err(AppError::Conflict("Attempt is already completed".to_string()));
    }

    Ok(Json(json!({ "saved": true })))
}

/// Finishes an attempt once, scoring it and returning the review.
///
/// A second completion is rejected with 409 and leaves the stored result untouched.
pub async fn complete_exam(
    State(store): State<Arc<dyn ExamStore>>,
    State(bank): State<Arc<QuestionBank>>,
    Json(payload): Json<CompleteExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let attempt = store
        .get_attempt(payload.attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.is_completed {
        return Err(AppError::Conflict("Attempt is already completed".to_string()));
    }

    let Completed {
        attempt: completed,
        answers,
        totals,
    } = store
        .complete_attempt(
            attempt.id,
            Completion {
                completed_at: Utc::now(),
                is_timed_out: payload.is_timed_out,
                total_time_seconds: payload.total_time_seconds,
            },
        )
        .await?
        .ok_or(AppError::Conflict("Attempt is already completed".to_string()))?;

    tracing::info!(
        "Attempt {} completed: {}/{} correct{}",
        completed.id,
        totals.total_correct,
        completed.total_questions,
        if completed.is_timed_out { " (timed out)" } else { "" }
    );

    let review = build_review(&bank, &completed.answer_key(&bank), &answers);

    Ok(Json(ExamResult {
        attempt_id: completed.id,
        total_score: totals.total_score,
        total_correct: totals.total_correct,
        total_questions: completed.total_questions,
        total_time_seconds: payload.total_time_seconds,
        percentage: percentage(totals.total_correct, completed.total_questions),
        answers: review,
    }))
}
