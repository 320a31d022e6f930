use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type QuestionId = u8;

/// Answer option chosen per question, keyed by question number.
pub type Answers = BTreeMap<QuestionId, String>;

/// Elapsed milliseconds, keyed by question number.
pub type QuestionTimes = BTreeMap<QuestionId, u64>;

/// Global timing view: every observed sample per question, in arrival order.
pub type QuestionTimingSamples = BTreeMap<QuestionId, Vec<u64>>;

pub const UNKNOWN_SEGMENT: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Demographics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl Demographics {
    pub fn new(age: &str, profession: &str, gender: &str) -> Self {
        Self {
            age: Some(age.to_string()),
            profession: Some(profession.to_string()),
            gender: Some(gender.to_string()),
        }
    }

    /// Age bracket used as an aggregation key.
    pub fn age_label(&self) -> &str {
        present(&self.age).unwrap_or(UNKNOWN_SEGMENT)
    }

    /// Profession category used as an aggregation key.
    pub fn profession_label(&self) -> &str {
        present(&self.profession).unwrap_or(UNKNOWN_SEGMENT)
    }
}

/// Treats empty strings the same as a missing value.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Reads a stored duration as whole milliseconds.
///
/// Fractional values round half up. Negative, non-finite and non-numeric
/// values are rejected.
pub(crate) fn millis(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_times<'de, D>(deserializer: D) -> Result<Option<QuestionTimes>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<QuestionId, Value>>::deserialize(deserializer)?;
    Ok(raw.map(|times| {
        times
            .into_iter()
            .filter_map(|(question, value)| Some((question, millis(&value)?)))
            .collect()
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Questionnaire {
    pub demographics: Option<Demographics>,
    #[serde(deserialize_with = "null_as_default")]
    pub answers: Answers,
    #[serde(deserialize_with = "lenient_times")]
    pub question_times: Option<QuestionTimes>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Completion {
    pub completed: bool,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub demographics: Option<Demographics>,
    pub questionnaire: Option<Questionnaire>,
    pub completion: Option<Completion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserRecord {
    pub email: String,
    pub timestamp: Option<i64>,
    pub last_updated: Option<i64>,
    pub data: Option<UserData>,
}

impl UserRecord {
    pub fn submitted_at(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn questionnaire(&self) -> Option<&Questionnaire> {
        self.data.as_ref()?.questionnaire.as_ref()
    }

    /// Questionnaire demographics, falling back to the record-level snapshot.
    pub fn demographics(&self) -> Option<&Demographics> {
        let data = self.data.as_ref()?;
        data.questionnaire
            .as_ref()
            .and_then(|q| q.demographics.as_ref())
            .or(data.demographics.as_ref())
    }

    pub fn answers(&self) -> Option<&Answers> {
        self.questionnaire().map(|q| &q.answers)
    }

    pub fn question_time_ms(&self) -> Option<&QuestionTimes> {
        self.questionnaire()?.question_times.as_ref()
    }

    pub fn completed(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.completion.as_ref())
            .is_some_and(|c| c.completed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRecord {
    pub email: String,
    pub first_login: Option<i64>,
    pub last_login: Option<i64>,
    pub login_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicsTrackingRecord {
    pub email: String,
    pub age: Option<String>,
    pub profession: Option<String>,
    pub gender: Option<String>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelCounters {
    pub visited: u64,
    pub attempted: u64,
    pub completed: u64,
}

/// One loaded snapshot of the five persisted collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    pub users: Vec<UserRecord>,
    pub logins: Vec<LoginRecord>,
    pub tracking: Vec<DemographicsTrackingRecord>,
    pub question_analytics: QuestionTimingSamples,
    pub funnel: FunnelCounters,
}
