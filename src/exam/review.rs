// src/exam/review.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::exam::answer_key::{AnswerKey, AnswerKeyEntry, EntryLayout};
use crate::exam::bank::QuestionBank;
use crate::exam::grader::bool_literal;
use crate::models::answer::Answer;
use crate::models::question::{OptionKey, Question, QuestionKind, QuestionOption};

/// Post-submission view of one question, in the attempt's shuffled order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "questionType",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ReviewEntry {
    MultipleChoice {
        question_id: i64,
        question_text: String,
        /// Options as the participant saw them.
        options: Vec<QuestionOption>,
        selected_option: Option<String>,
        /// Shuffled letter of the correct option.
        correct_option: OptionKey,
        is_correct: bool,
        time_spent: i32,
    },
    TrueFalse {
        question_id: i64,
        question_text: String,
        selected_option: Option<String>,
        correct_option: &'static str,
        /// Motivation text.
        written_answer: Option<String>,
        explanation: String,
        is_correct: bool,
        time_spent: i32,
    },
    Written {
        question_id: i64,
        question_text: String,
        written_answer: Option<String>,
        accepted_keywords: Vec<String>,
        example_answer: String,
        is_correct: bool,
        time_spent: i32,
    },
}

impl ReviewEntry {
    pub fn question_id(&self) -> i64 {
        match self {
            ReviewEntry::MultipleChoice { question_id, .. }
            | ReviewEntry::TrueFalse { question_id, .. }
            | ReviewEntry::Written { question_id, .. } => *question_id,
        }
    }

    pub fn is_correct(&self) -> bool {
        match self {
            ReviewEntry::MultipleChoice { is_correct, .. }
            | ReviewEntry::TrueFalse { is_correct, .. }
            | ReviewEntry::Written { is_correct, .. } => *is_correct,
        }
    }
}

/// Builds the review for every answer key entry that still matches the bank.
/// Entries whose question is gone or whose type no longer matches are skipped.
pub fn build_review(bank: &QuestionBank, key: &AnswerKey, answers: &[Answer]) -> Vec<ReviewEntry> {
    let by_question: HashMap<i64, &Answer> = answers.iter().map(|a| (a.question_id, a)).collect();

    key.entries()
        .iter()
        .filter_map(|entry| {
            let Some(question) = bank.get(entry.id) else {
                tracing::warn!("Answer key references unknown question {}", entry.id);
                return None;
            };
            let review = review_entry(question, entry, by_question.get(&entry.id).copied());
            if review.is_none() {
                tracing::warn!("Answer key entry for question {} has the wrong type", entry.id);
            }
            review
        })
        .collect()
}

fn review_entry(
    question: &Question,
    entry: &AnswerKeyEntry,
    answer: Option<&Answer>,
) -> Option<ReviewEntry> {
    let is_correct = answer.and_then(|a| a.is_correct).unwrap_or(false);
    let time_spent = answer.and_then(|a| a.time_spent_seconds).unwrap_or(0);
    let selected_option = answer.and_then(|a| a.selected_option.clone());
    let written_answer = answer.and_then(|a| a.written_answer.clone());

    let review = match (&question.kind, &entry.layout) {
        (
            QuestionKind::MultipleChoice { .. },
            EntryLayout::MultipleChoice {
                original_order,
                shuffled_correct_index,
            },
        ) => {
            let options = original_order
                .iter()
                .enumerate()
                .filter_map(|(slot, original)| {
                    Some(QuestionOption {
                        key: OptionKey::from_index(slot)?,
                        text: question.option_text(*original).unwrap_or_default().to_string(),
                    })
                })
                .collect();

            ReviewEntry::MultipleChoice {
                question_id: question.id,
                question_text: question.text.clone(),
                options,
                selected_option,
                correct_option: OptionKey::from_index(*shuffled_correct_index)?,
                is_correct,
                time_spent,
            }
        }
        (
            QuestionKind::TrueFalse {
                correct_answer,
                explanation,
                ..
            },
            EntryLayout::TrueFalse,
        ) => ReviewEntry::TrueFalse {
            question_id: question.id,
            question_text: question.text.clone(),
            selected_option,
            correct_option: bool_literal(*correct_answer),
            written_answer,
            explanation: explanation.clone(),
            is_correct,
            time_spent,
        },
        (
            QuestionKind::Written {
                accepted_keywords,
                example_answer,
                ..
            },
            EntryLayout::Written,
        ) => ReviewEntry::Written {
            question_id: question.id,
            question_text: question.text.clone(),
            written_answer,
            accepted_keywords: accepted_keywords.clone(),
            example_answer: example_answer.clone(),
            is_correct,
            time_spent,
        },
        _ => return None,
    };

    Some(review)
}
