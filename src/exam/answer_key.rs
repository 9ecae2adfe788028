// src/exam/answer_key.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::exam::bank::QuestionBank;
use crate::models::question::{OPTION_KEYS, OptionKey, QuestionKind};

/// Current version of the persisted `question_order` blob.
pub const ANSWER_KEY_VERSION: u32 = 1;

/// Shuffle data recorded for one question of an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum EntryLayout {
    MultipleChoice {
        /// Original key of the option shown at each shuffled position.
        original_order: [OptionKey; 4],
        /// Shuffled position (0-3) holding the correct option.
        shuffled_correct_index: usize,
    },
    TrueFalse,
    Written,
}

/// One question of an attempt, in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub id: i64,
    #[serde(flatten)]
    pub layout: EntryLayout,
}

impl AnswerKeyEntry {
    /// Letter of the correct option as the participant saw it.
    pub fn correct_letter(&self) -> Option<OptionKey> {
        match self.layout {
            EntryLayout::MultipleChoice {
                shuffled_correct_index,
                ..
            } => OptionKey::from_index(shuffled_correct_index),
            _ => None,
        }
    }

    /// Original key behind a shuffled letter.
    pub fn original_key(&self, shown: OptionKey) -> Option<OptionKey> {
        match &self.layout {
            EntryLayout::MultipleChoice { original_order, .. } => {
                Some(original_order[shown.index()])
            }
            _ => None,
        }
    }

    fn is_well_formed(&self) -> bool {
        match &self.layout {
            EntryLayout::MultipleChoice {
                original_order,
                shuffled_correct_index,
            } => {
                let distinct: HashSet<_> = original_order.iter().collect();
                distinct.len() == OPTION_KEYS.len() && *shuffled_correct_index < OPTION_KEYS.len()
            }
            EntryLayout::TrueFalse | EntryLayout::Written => true,
        }
    }
}

/// Per-attempt answer key: the question order and, for multiple-choice,
/// where each option and the correct answer ended up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerKey {
    entries: Vec<AnswerKeyEntry>,
}

#[derive(Serialize)]
struct StoredKeyRef<'a> {
    version: u32,
    entries: &'a [AnswerKeyEntry],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredKey {
    Versioned {
        version: u32,
        entries: Vec<AnswerKeyEntry>,
    },
    Legacy(Vec<AnswerKeyEntry>),
}

impl AnswerKey {
    pub fn new(entries: Vec<AnswerKeyEntry>) -> Self {
        Self { entries }
    }

    /// Unshuffled key in bank order, used when a stored key is unreadable.
    pub fn bank_order(bank: &QuestionBank) -> Self {
        let entries = bank
            .questions()
            .iter()
            .map(|q| {
                let layout = match &q.kind {
                    QuestionKind::MultipleChoice { correct_answer, .. } => {
                        EntryLayout::MultipleChoice {
                            original_order: OPTION_KEYS,
                            shuffled_correct_index: correct_answer.index(),
                        }
                    }
                    QuestionKind::TrueFalse { .. } => EntryLayout::TrueFalse,
                    QuestionKind::Written { .. } => EntryLayout::Written,
                };
                AnswerKeyEntry { id: q.id, layout }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[AnswerKeyEntry] {
        &self.entries
    }

    pub fn entry(&self, question_id: i64) -> Option<&AnswerKeyEntry> {
        self.entries.iter().find(|e| e.id == question_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes to the versioned blob stored in `attempts.question_order`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&StoredKeyRef {
            version: ANSWER_KEY_VERSION,
            entries: &self.entries,
        })
    }

    /// Strict parse of a stored blob. Malformed multiple-choice entries are dropped.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let entries = match serde_json::from_str::<StoredKey>(raw)? {
            StoredKey::Versioned { version, entries } if version == ANSWER_KEY_VERSION => entries,
            StoredKey::Versioned { version, .. } => {
                return Err(serde::de::Error::custom(format!(
                    "unsupported answer key version {}",
                    version
                )));
            }
            StoredKey::Legacy(entries) => entries,
        };

        let total = entries.len();
        let entries: Vec<_> = entries.into_iter().filter(|e| e.is_well_formed()).collect();
        if entries.len() != total {
            tracing::warn!(
                "Dropped {} malformed answer key entries",
                total - entries.len()
            );
        }

        Ok(Self { entries })
    }

    /// Reads a stored blob, falling back to bank order when it is missing or unreadable.
    pub fn parse_or_bank_order(raw: Option<&str>, bank: &QuestionBank) -> Self {
        match raw.map(Self::parse) {
            Some(Ok(key)) => key,
            Some(Err(e)) => {
                tracing::warn!("Unreadable answer key, using bank order: {}", e);
                Self::bank_order(bank)
            }
            None => {
                tracing::warn!("Attempt has no answer key, using bank order");
                Self::bank_order(bank)
            }
        }
    }
}
