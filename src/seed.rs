//! Synthetic mock data for demos and load checks.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::{AnalyticsError, Result};
use crate::issues::QUESTIONS;
use crate::models::{
    Answers, Collections, Completion, Demographics, DemographicsTrackingRecord, LoginRecord,
    QuestionTimes, Questionnaire, UserData, UserRecord,
};
use crate::store::{KeyValueStore, LoadedCollections, RecordStore};

pub const AGE_BRACKETS: [&str; 5] = ["13-17", "18-22", "23-27", "28-32", "33+"];
pub const GENDERS: [&str; 4] = ["male", "female", "non-binary", "prefer-not-to-say"];
pub const PROFESSIONS: [&str; 4] = ["student", "working", "both", "other"];

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const SUBMISSION_WINDOW_MS: i64 = 30 * DAY_MS;
const EXTRA_VISITS: u64 = 120;
const EXTRA_STARTS: u64 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    AlreadySeeded { mock_users: usize },
    Seeded { users: usize },
}

pub fn is_mock_email(email: &str, prefix: &str) -> bool {
    !email.is_empty() && email.starts_with(prefix)
}

pub fn mock_user_count(collections: &Collections, prefix: &str) -> usize {
    collections
        .users
        .iter()
        .filter(|u| is_mock_email(&u.email, prefix))
        .count()
}

/// Replaces any earlier mock batch with `count` fresh mock users.
///
/// Funnel counters and the global timing samples accumulate; they are not
/// rolled back when an old batch is dropped.
pub fn seed_collections<R: Rng>(
    collections: &mut Collections,
    count: usize,
    prefix: &str,
    now_ms: i64,
    rng: &mut R,
) {
    collections.users.retain(|u| !is_mock_email(&u.email, prefix));
    collections.logins.retain(|l| !is_mock_email(&l.email, prefix));
    collections.tracking.retain(|t| !is_mock_email(&t.email, prefix));

    let users = count as u64;
    collections.funnel.visited += users + EXTRA_VISITS;
    collections.funnel.attempted += users + EXTRA_STARTS;
    collections.funnel.completed += users;

    for i in 1..=count {
        let email = format!("{prefix}{i}@example.com");
        let timestamp = now_ms - rng.gen_range(0..SUBMISSION_WINDOW_MS);
        let age = pick(&AGE_BRACKETS, rng);
        let gender = pick(&GENDERS, rng);
        let profession = pick(&PROFESSIONS, rng);

        let mut answers = Answers::new();
        let mut question_times = QuestionTimes::new();
        for question in &QUESTIONS {
            let index = match question.id {
                // sleep and stress lean towards their two worst options
                2 | 3 => (rng.gen_range(0..2) + 2).min(question.options.len() - 1),
                _ => rng.gen_range(0..question.options.len()),
            };
            answers.insert(question.id, question.options[index].to_string());

            let elapsed = rng.gen_range(2000..10_000);
            question_times.insert(question.id, elapsed);
            collections
                .question_analytics
                .entry(question.id)
                .or_default()
                .push(elapsed);
        }

        let demographics = Demographics::new(age, profession, gender);
        collections.users.push(UserRecord {
            email: email.clone(),
            timestamp: Some(timestamp),
            last_updated: Some(timestamp),
            data: Some(UserData {
                demographics: Some(demographics.clone()),
                questionnaire: Some(Questionnaire {
                    demographics: Some(demographics),
                    answers,
                    question_times: Some(question_times),
                    completed_at: Some(timestamp + 60_000),
                }),
                completion: Some(Completion {
                    completed: true,
                    timestamp: Some(timestamp + 60_000),
                }),
            }),
        });

        collections.logins.push(LoginRecord {
            email: email.clone(),
            first_login: Some(timestamp - DAY_MS),
            last_login: Some(timestamp),
            login_count: rng.gen_range(1..=5),
        });

        collections.tracking.push(DemographicsTrackingRecord {
            email,
            age: Some(age.to_string()),
            profession: Some(profession.to_string()),
            gender: Some(gender.to_string()),
            timestamp: Some(timestamp),
        });
    }
}

/// Seeds mock users unless `threshold` of them already exist.
///
/// Seeding rewrites every collection, so it fails without writing anything
/// when a collection lost rows on load.
pub fn seed_if_needed<S: KeyValueStore, R: Rng>(
    store: &mut RecordStore<S>,
    threshold: usize,
    prefix: &str,
    now_ms: i64,
    rng: &mut R,
) -> Result<SeedOutcome> {
    let LoadedCollections {
        mut collections,
        recovered,
    } = store.load_checked()?;
    let existing = mock_user_count(&collections, prefix);
    if existing >= threshold {
        return Ok(SeedOutcome::AlreadySeeded {
            mock_users: existing,
        });
    }
    if !recovered.is_empty() {
        return Err(AnalyticsError::UncleanCollections {
            keys: recovered.iter().map(|key| key.to_string()).collect(),
        });
    }

    seed_collections(&mut collections, threshold, prefix, now_ms, rng);
    store.save_all(&collections)?;
    info!(users = threshold, replaced = existing, "seeded mock analytics data");
    Ok(SeedOutcome::Seeded { users: threshold })
}

fn pick<R: Rng>(values: &[&'static str], rng: &mut R) -> &'static str {
    values.choose(rng).copied().unwrap_or_default()
}
