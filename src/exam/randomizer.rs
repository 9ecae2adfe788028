// src/exam/randomizer.rs

use crate::exam::answer_key::{AnswerKey, AnswerKeyEntry, EntryLayout};
use crate::exam::bank::QuestionBank;
use crate::exam::shuffle::seeded_shuffle;
use crate::models::question::{OptionKey, PublicQuestion, QuestionKind, QuestionOption};

/// Offset between the option seeds of consecutive shuffled positions.
const OPTION_SEED_STRIDE: i64 = 1000;

/// Result of randomizing the bank for one attempt.
#[derive(Debug, Clone)]
pub struct AttemptLayout {
    /// Sent to the participant.
    pub questions: Vec<PublicQuestion>,
    /// Persisted with the attempt.
    pub answer_key: AnswerKey,
}

/// Shuffles the question order and every multiple-choice option list for `seed`.
pub fn build_attempt(bank: &QuestionBank, seed: i64) -> AttemptLayout {
    let shuffled = seeded_shuffle(bank.questions(), seed);
    let mut questions = Vec::with_capacity(shuffled.len());
    let mut entries = Vec::with_capacity(shuffled.len());

    for (position, question) in shuffled.into_iter().enumerate() {
        let id = question.id;
        let is_follow_up = question.is_follow_up;

        match question.kind {
            QuestionKind::MultipleChoice {
                options,
                correct_answer,
            } => {
                let option_seed = seed.wrapping_add((position as i64).wrapping_mul(OPTION_SEED_STRIDE));
                let shuffled_options = seeded_shuffle(&options, option_seed);

                let mut original_order = [OptionKey::A; 4];
                let mut shuffled_correct_index = 0;
                let mut shown = Vec::with_capacity(shuffled_options.len());

                for (slot, option) in shuffled_options.into_iter().enumerate() {
                    original_order[slot] = option.key;
                    if option.key == correct_answer {
                        shuffled_correct_index = slot;
                    }
                    if let Some(letter) = OptionKey::from_index(slot) {
                        shown.push(QuestionOption {
                            key: letter,
                            text: option.text,
                        });
                    }
                }

                questions.push(PublicQuestion::MultipleChoice {
                    id,
                    text: question.text,
                    is_follow_up,
                    options: shown,
                });
                entries.push(AnswerKeyEntry {
                    id,
                    layout: EntryLayout::MultipleChoice {
                        original_order,
                        shuffled_correct_index,
                    },
                });
            }
            QuestionKind::TrueFalse { .. } => {
                questions.push(PublicQuestion::TrueFalse {
                    id,
                    text: question.text,
                    is_follow_up,
                });
                entries.push(AnswerKeyEntry {
                    id,
                    layout: EntryLayout::TrueFalse,
                });
            }
            QuestionKind::Written { max_length, .. } => {
                questions.push(PublicQuestion::Written {
                    id,
                    text: question.text,
                    is_follow_up,
                    max_length,
                });
                entries.push(AnswerKeyEntry {
                    id,
                    layout: EntryLayout::Written,
                });
            }
        }
    }

    AttemptLayout {
        questions,
        answer_key: AnswerKey::new(entries),
    }
}
