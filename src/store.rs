//! Record store adapter.
//!
//! Collections are stored as whole JSON documents under fixed keys in a
//! key-value backend. Reads never fail on bad JSON: a missing or malformed
//! collection loads as its empty default, and a malformed row inside an array
//! collection is skipped on its own. Writes go through a [`WriteBatch`] so a
//! backend can apply a full reset as one unit.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AnalyticsError, Result};
use crate::models::{self, Collections, QuestionId, QuestionTimingSamples};

pub mod keys {
    pub const USERS: &str = "allUsersData";
    pub const LOGINS: &str = "allUserLogins";
    pub const DEMOGRAPHICS_TRACKING: &str = "demographicsTracking";
    pub const QUESTION_ANALYTICS: &str = "questionAnalytics";
    pub const FUNNEL: &str = "funnelAnalytics";

    pub const COLLECTIONS: [&str; 5] = [
        USERS,
        LOGINS,
        DEMOGRAPHICS_TRACKING,
        QUESTION_ANALYTICS,
        FUNNEL,
    ];

    pub const FUNNEL_TRACKING: &str = "userFunnelTracking";

    /// Session and in-progress questionnaire keys written by the front end.
    pub const AUXILIARY: [&str; 8] = [
        FUNNEL_TRACKING,
        "questionnaireAnswers",
        "questionnaireCompleted",
        "questionnaireCompleteData",
        "userDemographics",
        "userOTP",
        "userOTPEmail",
        "userOTPExpiry",
    ];
}

/// Pending writes; `None` removes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<(String, Option<String>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: String) -> &mut Self {
        self.ops.push((key.to_string(), Some(value)));
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.ops.push((key.to_string(), None));
        self
    }

    fn apply_to(self, map: &mut BTreeMap<String, String>) {
        for (key, value) in self.ops {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
    }
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Applies every operation in the batch, or none of them.
    fn apply(&mut self, batch: WriteBatch) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        batch.apply_to(&mut self.entries);
        Ok(())
    }
}

/// All keys in one JSON object on disk, replaced through a rename on write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(AnalyticsError::io(&self.path, err)),
        }
    }

    fn write_document(&self, document: &BTreeMap<String, String>) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let encoded = serde_json::to_string_pretty(document)?;
        std::fs::write(&tmp, encoded).map_err(|err| AnalyticsError::io(&tmp, err))?;
        std::fs::rename(&tmp, &self.path).map_err(|err| AnalyticsError::io(&self.path, err))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_document()?.remove(key))
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        let mut document = self.read_document()?;
        batch.apply_to(&mut document);
        self.write_document(&document)
    }
}

/// A loaded snapshot plus the keys that lost data on the way in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedCollections {
    pub collections: Collections,
    /// Keys whose document or some of whose rows could not be read.
    pub recovered: Vec<&'static str>,
}

impl LoadedCollections {
    pub fn is_clean(&self) -> bool {
        self.recovered.is_empty()
    }
}

/// Typed access to the five analytics collections.
#[derive(Debug, Clone)]
pub struct RecordStore<S> {
    kv: S,
}

impl<S: KeyValueStore> RecordStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    pub fn load_all(&self) -> Result<Collections> {
        Ok(self.load_checked()?.collections)
    }

    /// Like [`load_all`](Self::load_all), but also reports which keys were
    /// only partly readable. Writers must not save those keys back.
    pub fn load_checked(&self) -> Result<LoadedCollections> {
        let mut recovered = Vec::new();
        let collections = Collections {
            users: self.read_rows(keys::USERS, &mut recovered)?,
            logins: self.read_rows(keys::LOGINS, &mut recovered)?,
            tracking: self.read_rows(keys::DEMOGRAPHICS_TRACKING, &mut recovered)?,
            question_analytics: self.read_samples(&mut recovered)?,
            funnel: self.read_document(keys::FUNNEL, &mut recovered)?,
        };
        debug!(
            users = collections.users.len(),
            logins = collections.logins.len(),
            tracking = collections.tracking.len(),
            recovered = recovered.len(),
            "loaded analytics collections"
        );
        Ok(LoadedCollections {
            collections,
            recovered,
        })
    }

    /// Overwrites all five collections in a single batch.
    pub fn save_all(&mut self, collections: &Collections) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch
            .set(keys::USERS, encode(&collections.users)?)
            .set(keys::LOGINS, encode(&collections.logins)?)
            .set(keys::DEMOGRAPHICS_TRACKING, encode(&collections.tracking)?)
            .set(keys::QUESTION_ANALYTICS, encode(&collections.question_analytics)?)
            .set(keys::FUNNEL, encode(&collections.funnel)?);
        self.kv.apply(batch)
    }

    /// Removes every collection plus the auxiliary session keys.
    pub fn reset_all(&mut self) -> Result<()> {
        let mut batch = WriteBatch::new();
        for key in keys::COLLECTIONS.iter().chain(keys::AUXILIARY.iter()) {
            batch.remove(key);
        }
        self.kv.apply(batch)?;
        info!("cleared all analytics collections and session keys");
        Ok(())
    }

    pub fn reset_funnel(&mut self) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.remove(keys::FUNNEL).remove(keys::FUNNEL_TRACKING);
        self.kv.apply(batch)?;
        info!("cleared funnel counters");
        Ok(())
    }

    fn read_document<T: DeserializeOwned + Default>(
        &self,
        key: &'static str,
        recovered: &mut Vec<&'static str>,
    ) -> Result<T> {
        let Some(raw) = self.kv.get(key)? else {
            return Ok(T::default());
        };
        match serde_json::from_str::<Option<T>>(&raw) {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(err) => {
                warn!(key, error = %err, "malformed collection, using empty default");
                recovered.push(key);
                Ok(T::default())
            }
        }
    }

    fn read_rows<T: DeserializeOwned>(
        &self,
        key: &'static str,
        recovered: &mut Vec<&'static str>,
    ) -> Result<Vec<T>> {
        let rows: Vec<Value> = self.read_document(key, recovered)?;
        let total = rows.len();
        let parsed: Vec<T> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(key, index, error = %err, "skipping malformed row");
                    None
                }
            })
            .collect();
        if parsed.len() < total {
            recovered.push(key);
        }
        Ok(parsed)
    }

    fn read_samples(&self, recovered: &mut Vec<&'static str>) -> Result<QuestionTimingSamples> {
        let key = keys::QUESTION_ANALYTICS;
        let raw: BTreeMap<QuestionId, Vec<Value>> = self.read_document(key, recovered)?;
        let mut dropped = 0usize;
        let samples: QuestionTimingSamples = raw
            .into_iter()
            .map(|(question, values)| {
                let total = values.len();
                let times: Vec<u64> = values.iter().filter_map(models::millis).collect();
                dropped += total - times.len();
                (question, times)
            })
            .collect();
        if dropped > 0 {
            warn!(key, dropped, "skipping malformed timing samples");
            recovered.push(key);
        }
        Ok(samples)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
