use serde::Serialize;

use crate::aggregate::IssueCounts;
use crate::issues::{Issue, QUESTIONS};
use crate::models::{Collections, QuestionId, QuestionTimingSamples};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankedIssue {
    pub name: Issue,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDifficulty {
    pub question_id: QuestionId,
    pub label: &'static str,
    pub average_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_users: usize,
    pub completed_assessments: usize,
    pub completion_rate: u64,
    pub avg_minutes_per_question: u64,
}

/// `numerator / denominator` rounded half up, 0 when the denominator is 0.
pub fn rounded_ratio(numerator: u64, denominator: u64) -> u64 {
    wide_ratio(u128::from(numerator), u128::from(denominator))
}

/// Half-up ratio over widened sums; saturates at `u64::MAX`.
fn wide_ratio(numerator: u128, denominator: u128) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let round_up = numerator % denominator * 2 >= denominator;
    let half_up = numerator / denominator + u128::from(round_up);
    u64::try_from(half_up).unwrap_or(u64::MAX)
}

pub fn percentage(part: u64, whole: u64) -> u64 {
    rounded_ratio(part.saturating_mul(100), whole)
}

pub fn top_issues(counts: &IssueCounts, n: usize) -> Vec<RankedIssue> {
    counts
        .ranked()
        .into_iter()
        .take(n)
        .map(|(name, count)| RankedIssue { name, count })
        .collect()
}

/// Mean time per question in whole seconds, slowest first.
///
/// The mean is taken over raw milliseconds before rounding. Questions with no
/// samples report 0, and equal averages keep question order.
pub fn question_difficulty(samples: &QuestionTimingSamples) -> Vec<QuestionDifficulty> {
    let mut difficulties: Vec<QuestionDifficulty> = QUESTIONS
        .iter()
        .map(|question| {
            let times = samples.get(&question.id).map(Vec::as_slice).unwrap_or(&[]);
            let total: u128 = times.iter().map(|&ms| u128::from(ms)).sum();
            QuestionDifficulty {
                question_id: question.id,
                label: question.label,
                average_seconds: wide_ratio(total, times.len() as u128 * 1000),
            }
        })
        .collect();
    difficulties.sort_by(|a, b| b.average_seconds.cmp(&a.average_seconds));
    difficulties
}

/// Headline numbers; the user population comes from login records.
pub fn overview(collections: &Collections) -> Overview {
    let total_users = collections.logins.len();
    let completed_assessments = collections.users.iter().filter(|u| u.completed()).count();

    let (total_ms, samples) = collections
        .users
        .iter()
        .filter_map(|u| u.question_time_ms())
        .flat_map(|times| times.values())
        .fold((0u128, 0u128), |(sum, n), &ms| (sum + u128::from(ms), n + 1));

    Overview {
        total_users,
        completed_assessments,
        completion_rate: percentage(completed_assessments as u64, total_users as u64),
        avg_minutes_per_question: wide_ratio(total_ms, samples * 60_000),
    }
}

/// The leading issue, when it affects at least `threshold` users.
pub fn awareness_alert(counts: &IssueCounts, threshold: u64) -> Option<RankedIssue> {
    top_issues(counts, 1)
        .into_iter()
        .next()
        .filter(|top| top.count >= threshold)
}
