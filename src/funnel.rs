use std::fmt;

use serde::Serialize;

use crate::models::FunnelCounters;
use crate::ranking::percentage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunnelStage {
    Visited,
    Started,
    Completed,
}

impl FunnelStage {
    pub fn label(self) -> &'static str {
        match self {
            FunnelStage::Visited => "Visited Page",
            FunnelStage::Started => "Started Questionnaire",
            FunnelStage::Completed => "Completed Assessment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStep {
    pub stage: FunnelStage,
    pub label: &'static str,
    pub value: u64,
    /// Percent of the previous step; `None` for the baseline.
    pub conversion_pct: Option<u64>,
    /// This step minus the next one. Negative when the counters are out of order.
    pub dropoff: i64,
}

/// Counter pairs that break `visited >= attempted >= completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunnelAnomaly {
    StartedExceedsVisited { visited: u64, attempted: u64 },
    CompletedExceedsStarted { attempted: u64, completed: u64 },
}

impl fmt::Display for FunnelAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunnelAnomaly::StartedExceedsVisited { visited, attempted } => {
                write!(f, "{attempted} starts recorded against only {visited} visits")
            }
            FunnelAnomaly::CompletedExceedsStarted {
                attempted,
                completed,
            } => write!(
                f,
                "{completed} completions recorded against only {attempted} starts"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelSummary {
    pub steps: [FunnelStep; 3],
    pub has_data: bool,
    pub anomalies: Vec<FunnelAnomaly>,
}

fn signed_difference(a: u64, b: u64) -> i64 {
    let diff = i128::from(a) - i128::from(b);
    diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Conversions chain step to step: starts over visits, completions over
/// starts. Out-of-order counters are reported, not corrected.
pub fn funnel_steps(counters: &FunnelCounters) -> FunnelSummary {
    let FunnelCounters {
        visited,
        attempted,
        completed,
    } = *counters;

    let steps = [
        FunnelStep {
            stage: FunnelStage::Visited,
            label: FunnelStage::Visited.label(),
            value: visited,
            conversion_pct: None,
            dropoff: signed_difference(visited, attempted),
        },
        FunnelStep {
            stage: FunnelStage::Started,
            label: FunnelStage::Started.label(),
            value: attempted,
            conversion_pct: Some(percentage(attempted, visited)),
            dropoff: signed_difference(attempted, completed),
        },
        FunnelStep {
            stage: FunnelStage::Completed,
            label: FunnelStage::Completed.label(),
            value: completed,
            conversion_pct: Some(percentage(completed, attempted)),
            dropoff: 0,
        },
    ];

    let mut anomalies = Vec::new();
    if attempted > visited {
        anomalies.push(FunnelAnomaly::StartedExceedsVisited { visited, attempted });
    }
    if completed > attempted {
        anomalies.push(FunnelAnomaly::CompletedExceedsStarted {
            attempted,
            completed,
        });
    }

    FunnelSummary {
        steps,
        has_data: visited > 0 || attempted > 0 || completed > 0,
        anomalies,
    }
}
