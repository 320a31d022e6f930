use std::collections::HashMap;

use crate::models::{present, Demographics, DemographicsTrackingRecord};

/// Backfills questionnaire demographics from visit-time tracking records.
///
/// When several tracking records share an email, the one with the latest
/// `timestamp` is used. Untimestamped records lose to timestamped ones, and
/// exact ties keep the earliest record in collection order.
#[derive(Debug, Default)]
pub struct DemographicsMerger<'a> {
    latest: HashMap<&'a str, &'a DemographicsTrackingRecord>,
}

impl<'a> DemographicsMerger<'a> {
    pub fn new(tracking: &'a [DemographicsTrackingRecord]) -> Self {
        let mut latest: HashMap<&'a str, &'a DemographicsTrackingRecord> = HashMap::new();
        for record in tracking {
            latest
                .entry(record.email.as_str())
                .and_modify(|current| {
                    if record.timestamp > current.timestamp {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        Self { latest }
    }

    fn tracked(&self, email: &str) -> Option<&'a DemographicsTrackingRecord> {
        self.latest.get(email).copied()
    }

    /// Age and profession fall back to tracking data; gender never does.
    pub fn merge(&self, email: &str, questionnaire: Option<&Demographics>) -> Demographics {
        let mut merged = questionnaire.cloned().unwrap_or_default();
        let Some(tracked) = self.tracked(email) else {
            return merged;
        };

        if present(&merged.age).is_none() {
            if let Some(age) = present(&tracked.age) {
                merged.age = Some(age.to_string());
            }
        }
        if present(&merged.profession).is_none() {
            if let Some(profession) = present(&tracked.profession) {
                merged.profession = Some(profession.to_string());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking(
        email: &str,
        age: &str,
        profession: &str,
        timestamp: Option<i64>,
    ) -> DemographicsTrackingRecord {
        DemographicsTrackingRecord {
            email: email.to_string(),
            age: Some(age.to_string()),
            profession: Some(profession.to_string()),
            gender: Some("female".to_string()),
            timestamp,
        }
    }

    #[test]
    fn questionnaire_age_always_wins() {
        let rows = vec![tracking("a@example.com", "33+", "working", Some(10))];
        let merger = DemographicsMerger::new(&rows);
        let base = Demographics {
            age: Some("18-22".to_string()),
            ..Demographics::default()
        };

        let merged = merger.merge("a@example.com", Some(&base));
        assert_eq!(merged.age.as_deref(), Some("18-22"));
        assert_eq!(merged.profession.as_deref(), Some("working"));
    }

    #[test]
    fn gender_is_never_backfilled() {
        let rows = vec![tracking("a@example.com", "33+", "working", Some(10))];
        let merged = DemographicsMerger::new(&rows).merge("a@example.com", None);
        assert_eq!(merged.age.as_deref(), Some("33+"));
        assert_eq!(merged.gender, None);
    }

    #[test]
    fn empty_questionnaire_values_are_filled() {
        let rows = vec![tracking("a@example.com", "23-27", "both", None)];
        let base = Demographics {
            age: Some(String::new()),
            profession: Some(String::new()),
            gender: Some("male".to_string()),
        };
        let merged = DemographicsMerger::new(&rows).merge("a@example.com", Some(&base));
        assert_eq!(merged, Demographics::new("23-27", "both", "male"));
    }

    #[test]
    fn most_recent_tracking_record_wins() {
        let rows = vec![
            tracking("a@example.com", "13-17", "student", Some(100)),
            tracking("a@example.com", "18-22", "both", Some(300)),
            tracking("a@example.com", "33+", "other", Some(200)),
            tracking("a@example.com", "28-32", "working", None),
        ];
        let merged = DemographicsMerger::new(&rows).merge("a@example.com", None);
        assert_eq!(merged.age.as_deref(), Some("18-22"));
        assert_eq!(merged.profession.as_deref(), Some("both"));
    }

    #[test]
    fn timestamp_ties_keep_first_record() {
        let rows = vec![
            tracking("a@example.com", "13-17", "student", Some(100)),
            tracking("a@example.com", "33+", "other", Some(100)),
        ];
        let merged = DemographicsMerger::new(&rows).merge("a@example.com", None);
        assert_eq!(merged.age.as_deref(), Some("13-17"));
    }

    #[test]
    fn unmatched_email_leaves_fields_absent() {
        let rows = vec![tracking("other@example.com", "33+", "other", Some(1))];
        let merged = DemographicsMerger::new(&rows).merge("a@example.com", None);
        assert_eq!(merged, Demographics::default());
        assert_eq!(merged.age_label(), "unknown");
    }
}
