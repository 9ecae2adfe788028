// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Option letters, in display order.
pub const OPTION_KEYS: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

/// Letter of a multiple-choice option (A-D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionKey {
    A,
    B,
    C,
    D,
}

impl OptionKey {
    /// Letter at a 0-based position, if the position is one of the four slots.
    pub fn from_index(index: usize) -> Option<Self> {
        OPTION_KEYS.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            OptionKey::A => 0,
            OptionKey::B => 1,
            OptionKey::C => 2,
            OptionKey::D => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::A => "A",
            OptionKey::B => "B",
            OptionKey::C => "C",
            OptionKey::D => "D",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "A" => Some(OptionKey::A),
            "B" => Some(OptionKey::B),
            "C" => Some(OptionKey::C),
            "D" => Some(OptionKey::D),
            _ => None,
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answer option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub key: OptionKey,
    pub text: String,
}

/// Discriminant of the three question shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Written,
}

/// Grading data carried by each question shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<QuestionOption>,
        correct_answer: OptionKey,
    },
    TrueFalse {
        correct_answer: bool,
        /// Keywords used to score the optional motivation text.
        accepted_keywords: Vec<String>,
        /// Shown after submission.
        explanation: String,
    },
    Written {
        accepted_keywords: Vec<String>,
        /// Shown after submission.
        example_answer: String,
        #[serde(default = "default_max_length")]
        max_length: usize,
    },
}

fn default_max_length() -> usize {
    300
}

/// A question from the compiled-in bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    /// The text content of the question.
    pub text: String,

    /// Display hint: the question builds on the previous one.
    #[serde(default)]
    pub is_follow_up: bool,

    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        match self.kind {
            QuestionKind::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionKind::TrueFalse { .. } => QuestionType::TrueFalse,
            QuestionKind::Written { .. } => QuestionType::Written,
        }
    }

    /// Option text for an original key, if this is a multiple-choice question.
    pub fn option_text(&self, key: OptionKey) -> Option<&str> {
        match &self.kind {
            QuestionKind::MultipleChoice { options, .. } => options
                .iter()
                .find(|o| o.key == key)
                .map(|o| o.text.as_str()),
            _ => None,
        }
    }
}

/// Participant-facing question: no correct answers, keywords or explanations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PublicQuestion {
    MultipleChoice {
        id: i64,
        text: String,
        is_follow_up: bool,
        /// Options re-lettered A-D in shuffled order.
        options: Vec<QuestionOption>,
    },
    TrueFalse {
        id: i64,
        text: String,
        is_follow_up: bool,
    },
    Written {
        id: i64,
        text: String,
        is_follow_up: bool,
        max_length: usize,
    },
}

impl PublicQuestion {
    pub fn id(&self) -> i64 {
        match self {
            PublicQuestion::MultipleChoice { id, .. }
            | PublicQuestion::TrueFalse { id, .. }
            | PublicQuestion::Written { id, .. } => *id,
        }
    }
}
