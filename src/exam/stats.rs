// src/exam/stats.rs

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::exam::answer_key::AnswerKey;
use crate::exam::bank::QuestionBank;
use crate::exam::scoring::percentage;
use crate::models::answer::Answer;
use crate::models::attempt::AttemptSummary;
use crate::models::participant::short_name;
use crate::models::question::{OPTION_KEYS, OptionKey, QuestionKind, QuestionType};

/// Correct percentage above which a question is considered too easy.
pub const EASY_THRESHOLD: i32 = 90;
/// Correct percentage below which a question is considered too hard.
pub const HARD_THRESHOLD: i32 = 30;

/// Upper bucket bounds of the score distribution, in percent of the question count.
const DISTRIBUTION_BOUNDS: [i32; 6] = [20, 40, 60, 80, 90, 100];

const HARDEST_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamStats {
    pub total_participants: usize,
    pub average_score: i32,
    pub median_score: i32,
    pub min_score: i32,
    pub max_score: i32,
    pub average_time: i32,
    pub completion_rate: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionCount {
    pub option: String,
    pub count: usize,
    pub percentage: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    pub question_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub total_answers: usize,
    pub correct_percentage: i32,
    /// Multiple-choice counts are per original option key.
    pub option_distribution: Vec<OptionCount>,
    pub difficulty: Difficulty,
    pub most_common_wrong_answer: Option<OptionKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBucket {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeScorePoint {
    pub time: i32,
    pub score: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub average_score: i32,
    pub count: usize,
}

/// Everything the admin dashboard shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub stats: ExamStats,
    pub question_stats: Vec<QuestionStats>,
    pub score_distribution: Vec<ScoreBucket>,
    pub time_vs_score: Vec<TimeScorePoint>,
    pub trend_data: Vec<TrendPoint>,
    pub hardest_questions: Vec<QuestionStats>,
    pub flagged_questions: Vec<QuestionStats>,
}

/// Builds dashboard statistics from completed attempts and their answers.
/// `started_attempts` counts every attempt, finished or not.
pub fn build_admin_stats(
    bank: &QuestionBank,
    completed: &[AttemptSummary],
    answers: &[Answer],
    started_attempts: usize,
) -> AdminStats {
    let question_stats = question_stats(bank, completed, answers);

    let mut hardest_questions = question_stats.clone();
    hardest_questions.sort_by_key(|q| q.correct_percentage);
    hardest_questions.truncate(HARDEST_COUNT);

    let flagged_questions = question_stats
        .iter()
        .filter(|q| q.difficulty != Difficulty::Medium)
        .cloned()
        .collect();

    AdminStats {
        stats: exam_stats(completed, started_attempts),
        score_distribution: score_distribution(completed, bank.len() as i32),
        time_vs_score: time_vs_score(completed),
        trend_data: trend(completed),
        question_stats,
        hardest_questions,
        flagged_questions,
    }
}

pub fn exam_stats(completed: &[AttemptSummary], started_attempts: usize) -> ExamStats {
    if completed.is_empty() {
        return ExamStats {
            total_participants: 0,
            average_score: 0,
            median_score: 0,
            min_score: 0,
            max_score: 0,
            average_time: 0,
            completion_rate: 0,
        };
    }

    let mut scores: Vec<i32> = completed.iter().map(|a| a.total_score.unwrap_or(0)).collect();
    scores.sort_unstable();
    let times: Vec<i32> = completed
        .iter()
        .map(|a| a.total_time_seconds.unwrap_or(0))
        .collect();

    let mid = scores.len() / 2;
    let median = if scores.len() % 2 == 1 {
        scores[mid] as f64
    } else {
        (scores[mid - 1] + scores[mid]) as f64 / 2.0
    };

    ExamStats {
        total_participants: completed.len(),
        average_score: mean(&scores),
        median_score: median.round() as i32,
        min_score: scores[0],
        max_score: scores[scores.len() - 1],
        average_time: mean(&times),
        completion_rate: percentage(
            completed.len() as i32,
            started_attempts.max(completed.len()) as i32,
        ),
    }
}

fn mean(values: &[i32]) -> i32 {
    if values.is_empty() {
        return 0;
    }
    let sum: i64 = values.iter().map(|&v| v as i64).sum();
    (sum as f64 / values.len() as f64).round() as i32
}

/// Index of the first bound covering `correct` out of `total`.
fn bound_index(correct: i32, total: i32) -> usize {
    DISTRIBUTION_BOUNDS
        .iter()
        .position(|bound| correct <= total * bound / 100)
        .unwrap_or(DISTRIBUTION_BOUNDS.len() - 1)
}

/// Buckets of `total_correct`, labelled for `total_questions`.
/// For 30 questions: 0-6, 7-12, 13-18, 19-24, 25-27, 28-30.
///
/// Each attempt is placed by its own question count. A band that is empty for
/// `total_questions` hands its attempts to the next band.
pub fn score_distribution(completed: &[AttemptSummary], total_questions: i32) -> Vec<ScoreBucket> {
    let mut per_bound = [0usize; DISTRIBUTION_BOUNDS.len()];
    for attempt in completed {
        per_bound[bound_index(attempt.total_correct.unwrap_or(0), attempt.total_questions)] += 1;
    }

    let mut buckets: Vec<ScoreBucket> = Vec::with_capacity(DISTRIBUTION_BOUNDS.len());
    let mut min = 0;
    let mut carried = 0;

    for (bound, count) in DISTRIBUTION_BOUNDS.into_iter().zip(per_bound) {
        carried += count;
        let max = total_questions * bound / 100;
        if max < min {
            continue;
        }
        buckets.push(ScoreBucket {
            range: format!("{}-{}", min, max),
            count: carried,
        });
        carried = 0;
        min = max + 1;
    }

    if let Some(last) = buckets.last_mut() {
        last.count += carried;
    }

    buckets
}

pub fn time_vs_score(completed: &[AttemptSummary]) -> Vec<TimeScorePoint> {
    completed
        .iter()
        .map(|a| TimeScorePoint {
            time: a.total_time_seconds.unwrap_or(0),
            score: a.total_correct.unwrap_or(0),
            name: short_name(&a.first_name, &a.last_name),
        })
        .collect()
}

/// Mean correct count per completion day (UTC), oldest first.
pub fn trend(completed: &[AttemptSummary]) -> Vec<TrendPoint> {
    let mut days: BTreeMap<NaiveDate, Vec<i32>> = BTreeMap::new();
    for attempt in completed {
        if let Some(at) = attempt.completed_at {
            days.entry(at.date_naive())
                .or_default()
                .push(attempt.total_correct.unwrap_or(0));
        }
    }

    days.into_iter()
        .map(|(date, correct)| TrendPoint {
            date: date.format("%Y-%m-%d").to_string(),
            average_score: mean(&correct),
            count: correct.len(),
        })
        .collect()
}

#[derive(Default)]
struct Tally {
    total: usize,
    correct: usize,
    options: HashMap<String, usize>,
}

pub fn question_stats(
    bank: &QuestionBank,
    completed: &[AttemptSummary],
    answers: &[Answer],
) -> Vec<QuestionStats> {
    let keys: HashMap<Uuid, AnswerKey> = completed
        .iter()
        .map(|a| {
            (
                a.id,
                AnswerKey::parse_or_bank_order(a.question_order.as_deref(), bank),
            )
        })
        .collect();

    let mut tallies: HashMap<i64, Tally> = HashMap::new();
    for answer in answers {
        let Some(key) = keys.get(&answer.attempt_id) else {
            continue;
        };
        let tally = tallies.entry(answer.question_id).or_default();
        tally.total += 1;
        if answer.is_correct == Some(true) {
            tally.correct += 1;
        }

        let Some(selected) = answer.selected_option.as_deref() else {
            continue;
        };
        // Shuffled letters only mean something through this attempt's key.
        let option = match OptionKey::parse(selected) {
            Some(shown) => match key.entry(answer.question_id).and_then(|e| e.original_key(shown)) {
                Some(original) => original.as_str().to_string(),
                None => continue,
            },
            None => selected.to_string(),
        };
        *tally.options.entry(option).or_default() += 1;
    }

    bank.questions()
        .iter()
        .map(|question| {
            let tally = tallies.remove(&question.id).unwrap_or_default();
            let total = tally.total as i32;
            let correct_percentage = percentage(tally.correct as i32, total);
            let share = |count: usize| percentage(count as i32, total);
            let count_of = |option: &str| tally.options.get(option).copied().unwrap_or(0);

            let (option_distribution, most_common_wrong_answer) = match &question.kind {
                QuestionKind::MultipleChoice { correct_answer, .. } => {
                    let distribution = OPTION_KEYS
                        .iter()
                        .map(|key| OptionCount {
                            option: key.as_str().to_string(),
                            count: count_of(key.as_str()),
                            percentage: share(count_of(key.as_str())),
                        })
                        .collect();

                    let mut wrong: Option<(OptionKey, usize)> = None;
                    for key in OPTION_KEYS.iter().filter(|k| *k != correct_answer) {
                        let count = count_of(key.as_str());
                        if count > 0 && wrong.is_none_or(|(_, best)| count > best) {
                            wrong = Some((*key, count));
                        }
                    }

                    (distribution, wrong.map(|(key, _)| key))
                }
                QuestionKind::TrueFalse { .. } => {
                    let distribution = ["true", "false"]
                        .into_iter()
                        .map(|literal| OptionCount {
                            option: literal.to_string(),
                            count: count_of(literal),
                            percentage: share(count_of(literal)),
                        })
                        .collect();
                    (distribution, None)
                }
                QuestionKind::Written { .. } => {
                    let incorrect = tally.total - tally.correct;
                    let distribution = vec![
                        OptionCount {
                            option: "correct".to_string(),
                            count: tally.correct,
                            percentage: share(tally.correct),
                        },
                        OptionCount {
                            option: "incorrect".to_string(),
                            count: incorrect,
                            percentage: share(incorrect),
                        },
                    ];
                    (distribution, None)
                }
            };

            QuestionStats {
                question_id: question.id,
                question_text: question.text.clone(),
                question_type: question.question_type(),
                total_answers: tally.total,
                correct_percentage,
                option_distribution,
                difficulty: difficulty(tally.total, correct_percentage),
                most_common_wrong_answer,
            }
        })
        .collect()
}

fn difficulty(total_answers: usize, correct_percentage: i32) -> Difficulty {
    if total_answers == 0 {
        Difficulty::Medium
    } else if correct_percentage > EASY_THRESHOLD {
        Difficulty::Easy
    } else if correct_percentage < HARD_THRESHOLD {
        Difficulty::Hard
    } else {
        Difficulty::Medium
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::exam::answer_key::{AnswerKeyEntry, EntryLayout};

    fn summary(score: i32, correct: i32, time: i32, day: u32) -> AttemptSummary {
        AttemptSummary {
            id: Uuid::new_v4(),
            participant_name: "Anna Svensson".to_string(),
            first_name: "Anna".to_string(),
            last_name: "Svensson".to_string(),
            completed_at: Some(Utc.with_ymd_and_hms(2026, 3, day, 10, 0, 0).unwrap()),
            total_score: Some(score),
            total_correct: Some(correct),
            total_questions: 30,
            total_time_seconds: Some(time),
            is_timed_out: false,
            question_order: None,
        }
    }

    fn answer(attempt_id: Uuid, question_id: i64, selected: &str, is_correct: bool) -> Answer {
        Answer {
            id: Uuid::new_v4(),
            attempt_id,
            question_id,
            selected_option: Some(selected.to_string()),
            written_answer: None,
            is_correct: Some(is_correct),
            time_spent_seconds: Some(5),
            answered_at: Utc::now(),
        }
    }

    #[test]
    fn test_overview() {
        let completed = vec![
            summary(50, 15, 600, 1),
            summary(80, 24, 900, 1),
            summary(90, 27, 300, 2),
            summary(40, 12, 1200, 2),
        ];
        let stats = exam_stats(&completed, 5);
        assert_eq!(stats.total_participants, 4);
        assert_eq!(stats.average_score, 65);
        assert_eq!(stats.median_score, 65);
        assert_eq!(stats.min_score, 40);
        assert_eq!(stats.max_score, 90);
        assert_eq!(stats.average_time, 750);
        assert_eq!(stats.completion_rate, 80);
    }

    #[test]
    fn test_overview_empty() {
        assert_eq!(exam_stats(&[], 3).total_participants, 0);
    }

    #[test]
    fn test_distribution_buckets_for_thirty() {
        let completed = vec![summary(0, 0, 1, 1), summary(0, 6, 1, 1), summary(0, 7, 1, 1), summary(0, 30, 1, 1)];
        let buckets = score_distribution(&completed, 30);
        let ranges: Vec<&str> = buckets.iter().map(|b| b.range.as_str()).collect();
        assert_eq!(ranges, vec!["0-6", "7-12", "13-18", "19-24", "25-27", "28-30"]);
        let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_distribution_small_bank_skips_empty_ranges() {
        let buckets = score_distribution(&[], 3);
        for bucket in &buckets {
            let (lo, hi) = bucket.range.split_once('-').unwrap();
            assert!(lo.parse::<i32>().unwrap() <= hi.parse::<i32>().unwrap());
        }
        assert_eq!(buckets.last().unwrap().range.split_once('-').unwrap().1, "3");
    }

    #[test]
    fn test_distribution_places_attempts_by_their_own_question_count() {
        let mut short = summary(0, 5, 1, 1);
        short.total_questions = 10;
        let mut perfect_short = summary(0, 10, 1, 1);
        perfect_short.total_questions = 10;
        let completed = vec![short, perfect_short, summary(0, 15, 1, 1)];

        // 5/10 and 15/30 are both in the 40-60 % band.
        let counts: Vec<usize> = score_distribution(&completed, 30)
            .iter()
            .map(|b| b.count)
            .collect();
        assert_eq!(counts, vec![0, 0, 2, 0, 0, 1]);
    }

    #[test]
    fn test_trend_groups_by_day() {
        let completed = vec![summary(0, 10, 1, 2), summary(0, 20, 1, 1), summary(0, 11, 1, 2)];
        let points = trend(&completed);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, "2026-03-01");
        assert_eq!(points[0].average_score, 20);
        assert_eq!(points[1].average_score, 11);
        assert_eq!(points[1].count, 2);
    }

    #[test]
    fn test_time_vs_score_names() {
        let points = time_vs_score(&[summary(0, 9, 321, 1)]);
        assert_eq!(points[0], TimeScorePoint { time: 321, score: 9, name: "Anna S.".to_string() });
    }

    #[test]
    fn test_option_counts_use_original_keys() {
        let bank = QuestionBank::embedded().unwrap();
        let mut first = summary(0, 0, 1, 1);
        let key = AnswerKey::new(vec![AnswerKeyEntry {
            id: 1,
            layout: EntryLayout::MultipleChoice {
                original_order: [OptionKey::C, OptionKey::A, OptionKey::D, OptionKey::B],
                shuffled_correct_index: 3,
            },
        }]);
        first.question_order = Some(key.to_json().unwrap());
        // Unshuffled key (missing blob): letters map to themselves.
        let second = summary(0, 0, 1, 1);

        let answers = vec![
            answer(first.id, 1, "A", false),  // shown A = original C
            answer(second.id, 1, "C", false), // original C
            answer(second.id, 1, "B", true),
            answer(Uuid::new_v4(), 1, "D", false), // not a completed attempt
        ];

        let stats = question_stats(&bank, &[first, second], &answers);
        let q1 = stats.iter().find(|q| q.question_id == 1).unwrap();
        assert_eq!(q1.total_answers, 3);
        assert_eq!(q1.correct_percentage, 33);
        assert_eq!(q1.option_distribution[2].option, "C");
        assert_eq!(q1.option_distribution[2].count, 2);
        assert_eq!(q1.most_common_wrong_answer, Some(OptionKey::C));
        assert_eq!(q1.difficulty, Difficulty::Medium);

        let unanswered = stats.iter().find(|q| q.question_id == 2).unwrap();
        assert_eq!(unanswered.total_answers, 0);
        assert_eq!(unanswered.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_flagged_and_hardest() {
        let bank = QuestionBank::embedded().unwrap();
        let attempt = summary(0, 0, 1, 1);
        let answers = vec![
            answer(attempt.id, 24, "false", true),
            answer(attempt.id, 25, "true", false),
        ];
        let all = build_admin_stats(&bank, &[attempt], &answers, 1);

        assert_eq!(all.hardest_questions.len(), 5);
        assert_eq!(all.hardest_questions[0].correct_percentage, 0);
        let flagged: Vec<(i64, Difficulty)> = all
            .flagged_questions
            .iter()
            .map(|q| (q.question_id, q.difficulty))
            .collect();
        assert_eq!(flagged, vec![(24, Difficulty::Easy), (25, Difficulty::Hard)]);

        let tf = all.question_stats.iter().find(|q| q.question_id == 25).unwrap();
        assert_eq!(tf.option_distribution[0], OptionCount { option: "true".to_string(), count: 1, percentage: 100 });
    }
}
