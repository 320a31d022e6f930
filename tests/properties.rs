use proptest::prelude::*;

use wellbeing_analytics::aggregate::{aggregate, SegmentFilter};
use wellbeing_analytics::demographics::DemographicsMerger;
use wellbeing_analytics::funnel::funnel_steps;
use wellbeing_analytics::issues::{classify, QUESTIONS, RULES};
use wellbeing_analytics::models::{
    Answers, Collections, Demographics, DemographicsTrackingRecord, FunnelCounters,
    Questionnaire, UserData, UserRecord,
};
use wellbeing_analytics::ranking::top_issues;

static AGES: [&str; 5] = ["13-17", "18-22", "23-27", "28-32", "33+"];
static PROFESSIONS: [&str; 4] = ["student", "working", "both", "other"];

fn answers_strategy() -> impl Strategy<Value = Answers> {
    prop::collection::vec(prop::option::of(0usize..4), 10).prop_map(|picks| {
        QUESTIONS
            .iter()
            .zip(picks)
            .filter_map(|(q, pick)| pick.map(|i| (q.id, q.options[i].to_string())))
            .collect()
    })
}

fn label_strategy(values: &'static [&'static str]) -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(values).prop_map(str::to_string))
}

fn user_strategy() -> impl Strategy<Value = UserRecord> {
    (
        0u8..20,
        label_strategy(&AGES),
        label_strategy(&PROFESSIONS),
        answers_strategy(),
        prop::collection::btree_map(1u8..=10, 1000u64..20_000, 0..10),
    )
        .prop_map(|(n, age, profession, answers, times)| UserRecord {
            email: format!("user{n}@example.com"),
            data: Some(UserData {
                questionnaire: Some(Questionnaire {
                    demographics: Some(Demographics {
                        age,
                        profession,
                        gender: None,
                    }),
                    answers,
                    question_times: Some(times),
                    completed_at: None,
                }),
                ..UserData::default()
            }),
            ..UserRecord::default()
        })
}

fn tracking_strategy() -> impl Strategy<Value = DemographicsTrackingRecord> {
    (
        0u8..20,
        label_strategy(&AGES),
        label_strategy(&PROFESSIONS),
        prop::option::of(0i64..100),
    )
        .prop_map(|(n, age, profession, timestamp)| DemographicsTrackingRecord {
            email: format!("user{n}@example.com"),
            age,
            profession,
            gender: None,
            timestamp,
        })
}

fn collections_strategy() -> impl Strategy<Value = Collections> {
    (
        prop::collection::vec(user_strategy(), 0..40),
        prop::collection::vec(tracking_strategy(), 0..20),
    )
        .prop_map(|(users, tracking)| Collections {
            users,
            tracking,
            ..Collections::default()
        })
}

proptest! {
    #[test]
    fn questionnaire_age_survives_merge(
        age in prop::sample::select(&AGES[..]),
        tracking in prop::collection::vec(tracking_strategy(), 0..10),
    ) {
        let base = Demographics { age: Some(age.to_string()), ..Demographics::default() };
        let merger = DemographicsMerger::new(&tracking);
        for n in 0..20 {
            let merged = merger.merge(&format!("user{n}@example.com"), Some(&base));
            prop_assert_eq!(merged.age.as_deref(), Some(age));
            prop_assert_eq!(merged.gender, None);
        }
    }

    #[test]
    fn non_trigger_answers_classify_to_nothing(picks in prop::collection::vec(0usize..4, 10)) {
        let answers: Answers = QUESTIONS
            .iter()
            .zip(picks)
            .filter_map(|(q, i)| {
                let option = q.options[i];
                let triggers: &[&str] = RULES
                    .iter()
                    .find(|r| r.question == q.id)
                    .map(|r| r.triggers)
                    .unwrap_or(&[]);
                (!triggers.contains(&option)).then(|| (q.id, option.to_string()))
            })
            .collect();
        prop_assert!(classify(&answers).is_empty());
    }

    #[test]
    fn aggregation_is_deterministic(collections in collections_strategy()) {
        let first = aggregate(&collections, &SegmentFilter::all());
        let second = aggregate(&collections, &SegmentFilter::all());
        prop_assert_eq!(&first, &second);

        let age_total: u64 = first.issues_by_age.totals().iter().map(|(_, n)| n).sum();
        let profession_total: u64 =
            first.issues_by_profession.totals().iter().map(|(_, n)| n).sum();
        prop_assert_eq!(age_total, first.issue_counts.total());
        prop_assert_eq!(profession_total, first.issue_counts.total());
    }

    #[test]
    fn filtered_counts_never_exceed_unfiltered(
        collections in collections_strategy(),
        age in prop::sample::select(&AGES[..]),
    ) {
        let all = aggregate(&collections, &SegmentFilter::all());
        let filtered = aggregate(&collections, &SegmentFilter::parse(Some(age), None));
        prop_assert!(filtered.records_considered <= all.records_considered);
        prop_assert_eq!(
            filtered.issue_counts.total(),
            all.issues_by_age.get(age).map_or(0, |c| c.total())
        );
    }

    #[test]
    fn top_issues_are_bounded_and_sorted(collections in collections_strategy(), n in 0usize..10) {
        let result = aggregate(&collections, &SegmentFilter::all());
        let top = top_issues(&result.issue_counts, n);
        prop_assert!(top.len() <= n);
        prop_assert!(top.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn funnel_never_divides_by_zero(
        visited in 0u64..1000,
        attempted in 0u64..1000,
        completed in 0u64..1000,
    ) {
        let summary = funnel_steps(&FunnelCounters { visited, attempted, completed });
        if visited == 0 {
            prop_assert_eq!(summary.steps[1].conversion_pct, Some(0));
        }
        if attempted == 0 {
            prop_assert_eq!(summary.steps[2].conversion_pct, Some(0));
        }
        prop_assert_eq!(summary.has_data, visited + attempted + completed > 0);
    }
}

#[test]
fn zero_funnel_reports_no_data() {
    let summary = funnel_steps(&FunnelCounters::default());
    assert!(!summary.has_data);
    assert!(summary
        .steps
        .iter()
        .skip(1)
        .all(|step| step.conversion_pct == Some(0)));
}
