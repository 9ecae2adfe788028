// src/exam/grader.rs

use std::fmt;

use serde::Serialize;

use crate::exam::answer_key::{AnswerKeyEntry, EntryLayout};
use crate::models::question::{OptionKey, Question, QuestionKind};

/// Share of keywords a written answer must contain to count as correct.
pub const KEYWORD_PASS_RATIO: f64 = 0.5;

/// Outcome of grading a single answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub is_correct: bool,
    pub is_partially_correct: bool,
    pub matched_keywords: Vec<String>,
}

impl Grade {
    fn exact(is_correct: bool) -> Self {
        Self {
            is_correct,
            is_partially_correct: false,
            matched_keywords: Vec::new(),
        }
    }
}

/// Grading data does not line up with the question being graded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeError {
    /// The answer key entry belongs to a different question.
    WrongEntry { question_id: i64, entry_id: i64 },
    /// The answer key entry describes a different question type.
    TypeMismatch { question_id: i64 },
}

impl fmt::Display for GradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeError::WrongEntry {
                question_id,
                entry_id,
            } => write!(
                f,
                "answer key entry {} does not belong to question {}",
                entry_id, question_id
            ),
            GradeError::TypeMismatch { question_id } => {
                write!(f, "answer key entry for question {} has the wrong type", question_id)
            }
        }
    }
}

impl std::error::Error for GradeError {}

/// Grades one submission against the bank question and the attempt's answer key entry.
///
/// * multiple-choice: the submitted letter must equal the letter at the entry's
///   `shuffled_correct_index`. The bank's original key is never consulted.
/// * true-false: the submitted literal must equal the correct literal; the
///   motivation text is not scored.
/// * written: keyword overlap, see [`keyword_grade`].
pub fn grade(
    question: &Question,
    selected_option: &str,
    written_answer: Option<&str>,
    entry: &AnswerKeyEntry,
) -> Result<Grade, GradeError> {
    if entry.id != question.id {
        return Err(GradeError::WrongEntry {
            question_id: question.id,
            entry_id: entry.id,
        });
    }

    match (&question.kind, &entry.layout) {
        (
            QuestionKind::MultipleChoice { .. },
            EntryLayout::MultipleChoice {
                shuffled_correct_index,
                ..
            },
        ) => {
            let correct = OptionKey::from_index(*shuffled_correct_index);
            let selected = OptionKey::parse(selected_option);
            Ok(Grade::exact(selected.is_some() && selected == correct))
        }
        (QuestionKind::TrueFalse { correct_answer, .. }, EntryLayout::TrueFalse) => {
            Ok(Grade::exact(selected_option == bool_literal(*correct_answer)))
        }
        (
            QuestionKind::Written {
                accepted_keywords, ..
            },
            EntryLayout::Written,
        ) => Ok(keyword_grade(accepted_keywords, written_answer)),
        _ => Err(GradeError::TypeMismatch {
            question_id: question.id,
        }),
    }
}

/// Case-insensitive substring match of each keyword against `text`.
///
/// Correct at a match ratio of at least [`KEYWORD_PASS_RATIO`], partially
/// correct for any lower non-zero ratio. Missing text matches nothing.
pub fn keyword_grade(keywords: &[String], text: Option<&str>) -> Grade {
    let text = text.map(str::to_lowercase).unwrap_or_default();

    let matched_keywords: Vec<String> = if text.is_empty() {
        Vec::new()
    } else {
        keywords
            .iter()
            .filter(|k| text.contains(&k.to_lowercase()))
            .cloned()
            .collect()
    };

    let ratio = if keywords.is_empty() {
        0.0
    } else {
        matched_keywords.len() as f64 / keywords.len() as f64
    };

    Grade {
        is_correct: ratio >= KEYWORD_PASS_RATIO,
        is_partially_correct: ratio > 0.0 && ratio < KEYWORD_PASS_RATIO,
        matched_keywords,
    }
}

pub fn bool_literal(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
