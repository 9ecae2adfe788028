// src/exam/bank.rs

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::models::question::{OPTION_KEYS, Question, QuestionKind};

/// Question catalog compiled into the binary.
const EMBEDDED_QUESTIONS: &str = include_str!("../../data/questions.json");

/// Reasons a question list is rejected as a bank.
#[derive(Debug)]
pub enum BankError {
    Parse(serde_json::Error),
    DuplicateId(i64),
    InvalidOptions(i64),
    MissingCorrectOption(i64),
    NoKeywords(i64),
}

impl fmt::Display for BankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankError::Parse(e) => write!(f, "question bank is not valid JSON: {}", e),
            BankError::DuplicateId(id) => write!(f, "question id {} appears more than once", id),
            BankError::InvalidOptions(id) => {
                write!(f, "question {} must have exactly the options A, B, C and D", id)
            }
            BankError::MissingCorrectOption(id) => {
                write!(f, "question {} names a correct answer that is not an option", id)
            }
            BankError::NoKeywords(id) => write!(f, "question {} has no accepted keywords", id),
        }
    }
}

impl std::error::Error for BankError {}

/// Immutable, ordered question catalog with lookup by id.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
    index: HashMap<i64, usize>,
}

impl QuestionBank {
    /// Validates and indexes a question list, keeping its order.
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        let mut index = HashMap::with_capacity(questions.len());

        for (pos, question) in questions.iter().enumerate() {
            if index.insert(question.id, pos).is_some() {
                return Err(BankError::DuplicateId(question.id));
            }
            validate_question(question)?;
        }

        Ok(Self { questions, index })
    }

    /// The bank shipped with the service.
    pub fn embedded() -> Result<Self, BankError> {
        Self::from_json(EMBEDDED_QUESTIONS)
    }

    pub fn from_json(raw: &str) -> Result<Self, BankError> {
        let questions: Vec<Question> = serde_json::from_str(raw).map_err(BankError::Parse)?;
        Self::new(questions)
    }

    pub fn get(&self, id: i64) -> Option<&Question> {
        self.index.get(&id).map(|&pos| &self.questions[pos])
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

fn validate_question(question: &Question) -> Result<(), BankError> {
    match &question.kind {
        QuestionKind::MultipleChoice {
            options,
            correct_answer,
        } => {
            let keys: HashSet<_> = options.iter().map(|o| o.key).collect();
            if options.len() != OPTION_KEYS.len() || keys.len() != OPTION_KEYS.len() {
                return Err(BankError::InvalidOptions(question.id));
            }
            if !keys.contains(correct_answer) {
                return Err(BankError::MissingCorrectOption(question.id));
            }
        }
        QuestionKind::TrueFalse {
            accepted_keywords, ..
        }
        | QuestionKind::Written {
            accepted_keywords, ..
        } => {
            if accepted_keywords.is_empty() {
                return Err(BankError::NoKeywords(question.id));
            }
        }
    }
    Ok(())
}
