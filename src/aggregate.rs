//! Aggregation engine.
//!
//! Every pass recomputes from the loaded collections; nothing here mutates
//! its inputs, so aggregating the same snapshot twice gives equal results.

use std::collections::BTreeMap;

use tracing::debug;

use crate::demographics::DemographicsMerger;
use crate::issues::{classify, Issue};
use crate::models::{Collections, Demographics, QuestionTimingSamples};

/// Value that disables filtering on a dimension.
pub const WILDCARD: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueTally {
    pub count: u64,
    /// Position at which the issue was first counted in this table.
    pub first_seen: usize,
}

/// Issue counters that remember the order issues were first seen in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueCounts {
    tallies: BTreeMap<Issue, IssueTally>,
}

impl IssueCounts {
    pub fn record(&mut self, issue: Issue) {
        let next = self.tallies.len();
        self.tallies
            .entry(issue)
            .or_insert(IssueTally {
                count: 0,
                first_seen: next,
            })
            .count += 1;
    }

    pub fn get(&self, issue: Issue) -> u64 {
        self.tallies.get(&issue).map_or(0, |t| t.count)
    }

    pub(crate) fn tally(&self, issue: Issue) -> Option<IssueTally> {
        self.tallies.get(&issue).copied()
    }

    pub fn total(&self) -> u64 {
        self.tallies.values().map(|t| t.count).sum()
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Entries in first-seen order.
    pub fn in_first_seen_order(&self) -> Vec<(Issue, u64)> {
        let mut entries: Vec<(Issue, IssueTally)> =
            self.tallies.iter().map(|(i, t)| (*i, *t)).collect();
        entries.sort_by_key(|(_, t)| t.first_seen);
        entries.into_iter().map(|(i, t)| (i, t.count)).collect()
    }

    /// Entries by count descending, ties by first-seen order.
    pub fn ranked(&self) -> Vec<(Issue, u64)> {
        let mut entries: Vec<(Issue, IssueTally)> =
            self.tallies.iter().map(|(i, t)| (*i, *t)).collect();
        entries.sort_by(|(_, a), (_, b)| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
        });
        entries.into_iter().map(|(i, t)| (i, t.count)).collect()
    }
}

/// Issue counters per segment label (an age bracket or a profession).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    segments: BTreeMap<String, IssueCounts>,
}

impl SegmentTable {
    fn segment_mut(&mut self, label: &str) -> &mut IssueCounts {
        self.segments.entry(label.to_string()).or_default()
    }

    pub fn get(&self, label: &str) -> Option<&IssueCounts> {
        self.segments.get(label)
    }

    pub fn count(&self, label: &str, issue: Issue) -> u64 {
        self.get(label).map_or(0, |counts| counts.get(issue))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.segments.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IssueCounts)> {
        self.segments.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of issue counts per segment.
    pub fn totals(&self) -> Vec<(String, u64)> {
        self.segments
            .iter()
            .map(|(label, counts)| (label.clone(), counts.total()))
            .collect()
    }
}

/// Demographic restriction; `None` on a dimension means any value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentFilter {
    pub age: Option<String>,
    pub profession: Option<String>,
}

impl SegmentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter from raw selector values where `"all"` or an empty
    /// string lifts the restriction.
    pub fn parse(age: Option<&str>, profession: Option<&str>) -> Self {
        fn dimension(value: Option<&str>) -> Option<String> {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty() && *v != WILDCARD)
                .map(str::to_string)
        }
        Self {
            age: dimension(age),
            profession: dimension(profession),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.age.is_none() && self.profession.is_none()
    }

    /// Compares against unknown-resolved labels, so `"unknown"` selects
    /// records lacking that field.
    pub fn matches(&self, demographics: &Demographics) -> bool {
        let age_ok = self
            .age
            .as_deref()
            .map_or(true, |age| demographics.age_label() == age);
        let profession_ok = self
            .profession
            .as_deref()
            .map_or(true, |p| demographics.profession_label() == p);
        age_ok && profession_ok
    }

    pub fn describe(&self) -> String {
        format!(
            "age={}, profession={}",
            self.age.as_deref().unwrap_or(WILDCARD),
            self.profession.as_deref().unwrap_or(WILDCARD)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationResult {
    pub issue_counts: IssueCounts,
    pub issues_by_age: SegmentTable,
    pub issues_by_profession: SegmentTable,
    pub question_time_samples: QuestionTimingSamples,
    /// Records with a questionnaire that passed the filter.
    pub records_considered: usize,
}

pub fn aggregate(collections: &Collections, filter: &SegmentFilter) -> AggregationResult {
    let merger = DemographicsMerger::new(&collections.tracking);
    let mut result = AggregationResult::default();

    for user in &collections.users {
        let Some(questionnaire) = user.questionnaire() else {
            continue;
        };
        let demographics = merger.merge(&user.email, user.demographics());
        if !filter.matches(&demographics) {
            continue;
        }
        result.records_considered += 1;

        let issues = classify(&questionnaire.answers);
        let by_age = result.issues_by_age.segment_mut(demographics.age_label());
        for issue in &issues {
            by_age.record(*issue);
        }
        let by_profession = result
            .issues_by_profession
            .segment_mut(demographics.profession_label());
        for issue in &issues {
            by_profession.record(*issue);
        }
        for issue in issues {
            result.issue_counts.record(issue);
        }

        if let Some(times) = &questionnaire.question_times {
            for (question, elapsed) in times {
                result
                    .question_time_samples
                    .entry(*question)
                    .or_default()
                    .push(*elapsed);
            }
        }
    }

    debug!(
        filter = %filter.describe(),
        records = result.records_considered,
        issues = result.issue_counts.total(),
        "aggregated questionnaire records"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Answers, DemographicsTrackingRecord, Questionnaire, QuestionTimes, UserData, UserRecord,
    };

    fn user(email: &str, demographics: Option<Demographics>, answers: &[(u8, &str)]) -> UserRecord {
        let answers: Answers = answers.iter().map(|(q, a)| (*q, a.to_string())).collect();
        UserRecord {
            email: email.to_string(),
            data: Some(UserData {
                questionnaire: Some(Questionnaire {
                    demographics,
                    answers,
                    ..Questionnaire::default()
                }),
                ..UserData::default()
            }),
            ..UserRecord::default()
        }
    }

    #[test]
    fn single_stress_answer_counts_once() {
        let collections = Collections {
            users: vec![user("a@example.com", None, &[(3, "daily")])],
            ..Collections::default()
        };
        let result = aggregate(&collections, &SegmentFilter::all());

        assert_eq!(result.issue_counts.get(Issue::HighStress), 1);
        assert_eq!(result.issue_counts.len(), 1);
        assert_eq!(result.issues_by_age.count("unknown", Issue::HighStress), 1);
        assert_eq!(result.issues_by_profession.count("unknown", Issue::HighStress), 1);
    }

    #[test]
    fn records_without_questionnaire_are_skipped() {
        let collections = Collections {
            users: vec![UserRecord {
                email: "a@example.com".to_string(),
                ..UserRecord::default()
            }],
            ..Collections::default()
        };
        let result = aggregate(&collections, &SegmentFilter::all());
        assert_eq!(result.records_considered, 0);
        assert!(result.issues_by_age.is_empty());
    }

    #[test]
    fn segments_use_merged_demographics() {
        let collections = Collections {
            users: vec![user("a@example.com", None, &[(1, "low")])],
            tracking: vec![DemographicsTrackingRecord {
                email: "a@example.com".to_string(),
                age: Some("18-22".to_string()),
                profession: Some("student".to_string()),
                ..DemographicsTrackingRecord::default()
            }],
            ..Collections::default()
        };
        let result = aggregate(&collections, &SegmentFilter::all());
        assert_eq!(result.issues_by_age.count("18-22", Issue::LowEnergy), 1);
        assert_eq!(result.issues_by_profession.count("student", Issue::LowEnergy), 1);
    }

    #[test]
    fn filters_compose_with_and() {
        let collections = Collections {
            users: vec![
                user(
                    "a@example.com",
                    Some(Demographics::new("18-22", "student", "male")),
                    &[(1, "low")],
                ),
                user(
                    "b@example.com",
                    Some(Demographics::new("18-22", "working", "male")),
                    &[(1, "low")],
                ),
                user(
                    "c@example.com",
                    Some(Demographics::new("33+", "student", "male")),
                    &[(1, "low")],
                ),
            ],
            ..Collections::default()
        };

        let both = aggregate(
            &collections,
            &SegmentFilter::parse(Some("18-22"), Some("student")),
        );
        assert_eq!(both.records_considered, 1);
        assert_eq!(both.issue_counts.get(Issue::LowEnergy), 1);

        let age_only =
            aggregate(&collections, &SegmentFilter::parse(Some("18-22"), Some("all")));
        assert_eq!(age_only.records_considered, 2);

        let everything = aggregate(&collections, &SegmentFilter::parse(Some("all"), None));
        assert_eq!(everything.records_considered, 3);
    }

    #[test]
    fn unknown_filter_selects_missing_demographics() {
        let collections = Collections {
            users: vec![
                user("a@example.com", None, &[(2, "less_5")]),
                user(
                    "b@example.com",
                    Some(Demographics::new("33+", "other", "female")),
                    &[(2, "less_5")],
                ),
            ],
            ..Collections::default()
        };
        let result = aggregate(&collections, &SegmentFilter::parse(Some("unknown"), None));
        assert_eq!(result.records_considered, 1);
        assert_eq!(result.issues_by_age.labels().collect::<Vec<_>>(), vec!["unknown"]);
    }

    #[test]
    fn timing_samples_ignore_completion_flag() {
        let mut record = user("a@example.com", None, &[]);
        if let Some(q) = record.data.as_mut().and_then(|d| d.questionnaire.as_mut()) {
            q.question_times = Some(QuestionTimes::from([(1, 2000), (2, 3500)]));
        }
        assert!(!record.completed());
        let collections = Collections {
            users: vec![record.clone(), record],
            ..Collections::default()
        };
        let result = aggregate(&collections, &SegmentFilter::all());
        assert_eq!(result.question_time_samples.get(&1), Some(&vec![2000, 2000]));
        assert_eq!(result.question_time_samples.get(&2), Some(&vec![3500, 3500]));
    }

    #[test]
    fn ties_rank_by_first_seen() {
        let mut counts = IssueCounts::default();
        counts.record(Issue::SocialIsolation);
        counts.record(Issue::LowEnergy);
        counts.record(Issue::HighStress);
        counts.record(Issue::HighStress);

        assert_eq!(
            counts.ranked(),
            vec![
                (Issue::HighStress, 2),
                (Issue::SocialIsolation, 1),
                (Issue::LowEnergy, 1),
            ]
        );
        assert_eq!(counts.tally(Issue::LowEnergy).unwrap().first_seen, 1);
    }

    #[test]
    fn segment_totals_sum_issue_counts() {
        let collections = Collections {
            users: vec![
                user(
                    "a@example.com",
                    Some(Demographics::new("18-22", "student", "male")),
                    &[(1, "low"), (3, "often")],
                ),
                user(
                    "b@example.com",
                    Some(Demographics::new("18-22", "student", "male")),
                    &[(8, "often")],
                ),
            ],
            ..Collections::default()
        };
        let result = aggregate(&collections, &SegmentFilter::all());
        assert_eq!(result.issues_by_age.totals(), vec![("18-22".to_string(), 3)]);
    }
}
