use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{AggregationResult, SegmentFilter, SegmentTable};
use crate::dashboard::AnalyticsContext;
use crate::error::Result;

pub struct ReportOptions<'a> {
    pub filter: &'a SegmentFilter,
    pub top_n: usize,
    pub alert_threshold: u64,
    pub generated_at: DateTime<Utc>,
}

pub fn build_report(context: &AnalyticsContext, options: &ReportOptions<'_>) -> String {
    let overview = context.overview();
    let top = context.top_issues(options.top_n);
    let difficulty = context.question_difficulty();
    let funnel = context.funnel_steps();
    let segments = context.aggregate(options.filter);

    let mut output = String::new();

    let _ = writeln!(output, "# Wellbeing Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} for segment {}",
        options.generated_at.format("%Y-%m-%d %H:%M UTC"),
        options.filter.describe()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total users: {}", overview.total_users);
    let _ = writeln!(
        output,
        "- Completed assessments: {}",
        overview.completed_assessments
    );
    let _ = writeln!(output, "- Completion rate: {}%", overview.completion_rate);
    let _ = writeln!(
        output,
        "- Average time per question: {} min",
        overview.avg_minutes_per_question
    );

    if let Some(alert) = context.awareness_alert(options.alert_threshold) {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> **Alert:** {} is affecting {} users.",
            alert.name, alert.count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top {} Issues", options.top_n);
    if top.is_empty() {
        let _ = writeln!(output, "No issues recorded yet.");
    } else {
        for (rank, issue) in top.iter().enumerate() {
            let _ = writeln!(output, "{}. {} ({} users)", rank + 1, issue.name, issue.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Question Difficulty");
    for question in &difficulty {
        let _ = writeln!(
            output,
            "- Q{} {}: {}s avg",
            question.question_id, question.label, question.average_seconds
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Funnel");
    if !funnel.has_data {
        let _ = writeln!(output, "No funnel data available yet.");
    } else {
        for step in &funnel.steps {
            match step.conversion_pct {
                None => {
                    let _ = writeln!(output, "- {}: {} users (baseline)", step.label, step.value);
                }
                Some(pct) => {
                    let _ = writeln!(
                        output,
                        "- {}: {} users, {}% conversion",
                        step.label, step.value, pct
                    );
                }
            }
        }
        let _ = writeln!(
            output,
            "- Drop-off: {} before starting, {} before completing",
            funnel.steps[0].dropoff, funnel.steps[1].dropoff
        );
        for anomaly in &funnel.anomalies {
            let _ = writeln!(output, "- Data quality: {anomaly}");
        }
    }

    write_segment_section(&mut output, "Issues by Age", &segments.issues_by_age);
    write_segment_section(
        &mut output,
        "Issues by Profession",
        &segments.issues_by_profession,
    );

    output
}

fn write_segment_section(output: &mut String, title: &str, table: &SegmentTable) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");
    if table.is_empty() {
        let _ = writeln!(output, "No records match this segment.");
        return;
    }
    for (label, counts) in table.iter() {
        let _ = writeln!(output, "### {label} (total {})", counts.total());
        for (issue, count) in counts.in_first_seen_order() {
            let _ = writeln!(output, "- {issue}: {count}");
        }
    }
}

#[derive(Debug, Serialize)]
struct SegmentRow<'a> {
    dimension: &'a str,
    segment: &'a str,
    issue: &'a str,
    count: u64,
}

/// Writes the age and profession cross-tabs as flat CSV rows.
pub fn write_segments_csv<W: std::io::Write>(writer: W, result: &AggregationResult) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for (dimension, table) in [
        ("age", &result.issues_by_age),
        ("profession", &result.issues_by_profession),
    ] {
        for (segment, counts) in table.iter() {
            for (issue, count) in counts.in_first_seen_order() {
                csv.serialize(SegmentRow {
                    dimension,
                    segment,
                    issue: issue.name(),
                    count,
                })?;
            }
        }
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}
