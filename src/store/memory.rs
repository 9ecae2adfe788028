// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
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

#[derive(Default)]
struct Tables {
    exam_codes: HashMap<Uuid, ExamCode>,
    participants: HashMap<Uuid, Participant>,
    attempts: HashMap<Uuid, Attempt>,
    answers: HashMap<(Uuid, i64), Answer>,
}

/// In-process store. A single lock over all tables makes every operation atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn create_exam_code(&self, new: NewExamCode) -> Result<ExamCode, AppError> {
        let mut tables = self.tables.write().await;
        if tables.exam_codes.values().any(|c| c.code == new.code) {
            return Err(AppError::Conflict(format!(
                "Exam code '{}' already exists",
                new.code
            )));
        }

        let code = ExamCode {
            id: Uuid::new_v4(),
            code: new.code,
            name: new.name,
            is_active: true,
            created_at: Utc::now(),
            expires_at: new.expires_at,
        };
        tables.exam_codes.insert(code.id, code.clone());
        Ok(code)
    }

    async fn find_exam_code(&self, code: &str) -> Result<Option<ExamCode>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.exam_codes.values().find(|c| c.code == code).cloned())
    }

    async fn list_exam_codes(&self) -> Result<Vec<ExamCode>, AppError> {
        let tables = self.tables.read().await;
        let mut codes: Vec<ExamCode> = tables.exam_codes.values().cloned().collect();
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codes)
    }

    async fn set_exam_code_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<ExamCode>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.exam_codes.get_mut(&id).map(|code| {
            code.is_active = is_active;
            code.clone()
        }))
    }

    async fn find_or_create_participant(
        &self,
        new: NewParticipant,
    ) -> Result<Participant, AppError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .participants
            .values()
            .find(|p| p.full_name_normalized == new.full_name_normalized)
        {
            return Ok(existing.clone());
        }

        let participant = Participant {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            full_name_normalized: new.full_name_normalized,
            created_at: Utc::now(),
        };
        tables
            .participants
            .insert(participant.id, participant.clone());
        Ok(participant)
    }

    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError> {
        Ok(self.tables.read().await.participants.get(&id).cloned())
    }

    async fn find_attempt_for(
        &self,
        participant_id: Uuid,
        exam_code_id: Uuid,
    ) -> Result<Option<Attempt>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .values()
            .find(|a| a.participant_id == participant_id && a.exam_code_id == exam_code_id)
            .cloned())
    }

    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .attempts
            .values()
            .any(|a| a.participant_id == new.participant_id && a.exam_code_id == new.exam_code_id)
        {
            return Err(AppError::Conflict(
                "Participant has already taken this exam".to_string(),
            ));
        }

        let attempt = Attempt {
            id: Uuid::new_v4(),
            participant_id: new.participant_id,
            exam_code_id: new.exam_code_id,
            question_order: Some(new.question_order),
            started_at: Utc::now(),
            completed_at: None,
            total_questions: new.total_questions,
            total_correct: None,
            total_score: None,
            total_time_seconds: None,
            is_completed: false,
            is_timed_out: false,
        };
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>, AppError> {
        Ok(self.tables.read().await.attempts.get(&id).cloned())
    }

    async fn complete_attempt(
        &self,
        id: Uuid,
        completion: Completion,
    ) -> Result<Option<Completed>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.attempts.get(&id) {
            Some(attempt) if !attempt.is_completed => {}
            _ => return Ok(None),
        }

        let mut answers: Vec<Answer> = tables
            .answers
            .values()
            .filter(|a| a.attempt_id == id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.answered_at.cmp(&b.answered_at));

        let Some(attempt) = tables.attempts.get_mut(&id) else {
            return Ok(None);
        };
        let totals = recompute(answers.iter().map(|a| a.is_correct), attempt.total_questions);

        attempt.completed_at = Some(completion.completed_at);
        attempt.is_completed = true;
        attempt.is_timed_out = completion.is_timed_out;
        attempt.total_time_seconds = Some(completion.total_time_seconds);
        attempt.total_correct = Some(totals.total_correct);
        attempt.total_score = Some(totals.total_score);

        Ok(Some(Completed {
            attempt: attempt.clone(),
            answers,
            totals,
        }))
    }

    async fn delete_attempt(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.attempts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.answers.retain(|(attempt_id, _), _| *attempt_id != id);
        Ok(true)
    }

    async fn list_completed_attempts(&self) -> Result<Vec<AttemptSummary>, AppError> {
        let tables = self.tables.read().await;
        let mut summaries: Vec<AttemptSummary> = tables
            .attempts
            .values()
            .filter(|a| a.is_completed)
            .filter_map(|a| {
                let p = tables.participants.get(&a.participant_id)?;
                Some(AttemptSummary {
                    id: a.id,
                    participant_name: p.full_name(),
                    first_name: p.first_name.clone(),
                    last_name: p.last_name.clone(),
                    completed_at: a.completed_at,
                    total_score: a.total_score,
                    total_correct: a.total_correct,
                    total_questions: a.total_questions,
                    total_time_seconds: a.total_time_seconds,
                    is_timed_out: a.is_timed_out,
                    question_order: a.question_order.clone(),
                })
            })
            .collect();
        summaries.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(summaries)
    }

    async fn count_attempts(&self) -> Result<i64, AppError> {
        Ok(self.tables.read().await.attempts.len() as i64)
    }

    async fn upsert_answer(&self, new: NewAnswer) -> Result<Option<Answer>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.attempts.get(&new.attempt_id) {
            Some(attempt) if !attempt.is_completed => {}
            _ => return Ok(None),
        }

        let key = (new.attempt_id, new.question_id);
        let id = tables.answers.get(&key).map_or_else(Uuid::new_v4, |a| a.id);
        let answer = Answer {
            id,
            attempt_id: new.attempt_id,
            question_id: new.question_id,
            selected_option: Some(new.selected_option),
            written_answer: new.written_answer,
            is_correct: Some(new.is_correct),
            time_spent_seconds: Some(new.time_spent_seconds),
            answered_at: Utc::now(),
        };
        tables.answers.insert(key, answer.clone());
        Ok(Some(answer))
    }

    async fn answers_for_attempt(&self, attempt_id: Uuid) -> Result<Vec<Answer>, AppError> {
        let tables = self.tables.read().await;
        let mut answers: Vec<Answer> = tables
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.answered_at.cmp(&b.answered_at));
        Ok(answers)
    }

    async fn answers_for_completed_attempts(&self) -> Result<Vec<Answer>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .answers
            .values()
            .filter(|a| {
                tables
                    .attempts
                    .get(&a.attempt_id)
                    .is_some_and(|attempt| attempt.is_completed)
            })
            .cloned()
            .collect())
    }

    async fn regrade_answer(
        &self,
        attempt_id: Uuid,
        question_id: i64,
        is_correct: bool,
    ) -> Result<Option<Regraded>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(answer) = tables.answers.get_mut(&(attempt_id, question_id)) else {
            return Ok(None);
        };
        answer.is_correct = Some(is_correct);
        let answer = answer.clone();

        let correctness: Vec<Option<bool>> = tables
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .map(|a| a.is_correct)
            .collect();

        let Some(attempt) = tables.attempts.get_mut(&attempt_id) else {
            return Ok(None);
        };
        let totals = recompute(correctness, attempt.total_questions);
        attempt.total_correct = Some(totals.total_correct);
        attempt.total_score = Some(totals.total_score);

        Ok(Some(Regraded { answer, totals }))
    }
}
