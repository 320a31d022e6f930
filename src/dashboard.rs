//! Analytics context and the cached dashboard facade.
//!
//! An [`AnalyticsContext`] wraps one loaded snapshot of the collections and is
//! passed to every query. [`Dashboard`] decides when to reload: it keeps the
//! last context until [`Dashboard::invalidate`] is called or a mutating
//! operation runs.

use std::cell::OnceCell;

use rand::Rng;

use crate::aggregate::{aggregate, AggregationResult, SegmentFilter};
use crate::error::Result;
use crate::funnel::{funnel_steps, FunnelSummary};
use crate::models::Collections;
use crate::ranking::{self, Overview, QuestionDifficulty, RankedIssue};
use crate::seed::{self, SeedOutcome};
use crate::store::{KeyValueStore, RecordStore};

#[derive(Debug, Default)]
pub struct AnalyticsContext {
    collections: Collections,
    unfiltered: OnceCell<AggregationResult>,
}

impl AnalyticsContext {
    pub fn new(collections: Collections) -> Self {
        Self {
            collections,
            unfiltered: OnceCell::new(),
        }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Unfiltered aggregation, computed once per context.
    pub fn summary(&self) -> &AggregationResult {
        self.unfiltered
            .get_or_init(|| aggregate(&self.collections, &SegmentFilter::all()))
    }

    pub fn aggregate(&self, filter: &SegmentFilter) -> AggregationResult {
        if filter.is_unrestricted() {
            return self.summary().clone();
        }
        aggregate(&self.collections, filter)
    }

    pub fn top_issues(&self, n: usize) -> Vec<RankedIssue> {
        ranking::top_issues(&self.summary().issue_counts, n)
    }

    /// Difficulty over the persisted global timing samples.
    pub fn question_difficulty(&self) -> Vec<QuestionDifficulty> {
        ranking::question_difficulty(&self.collections.question_analytics)
    }

    /// Difficulty over the timing maps embedded in user records.
    pub fn question_difficulty_from_records(&self) -> Vec<QuestionDifficulty> {
        ranking::question_difficulty(&self.summary().question_time_samples)
    }

    pub fn funnel_steps(&self) -> FunnelSummary {
        funnel_steps(&self.collections.funnel)
    }

    pub fn overview(&self) -> Overview {
        ranking::overview(&self.collections)
    }

    pub fn awareness_alert(&self, threshold: u64) -> Option<RankedIssue> {
        ranking::awareness_alert(&self.summary().issue_counts, threshold)
    }
}

pub struct Dashboard<S> {
    store: RecordStore<S>,
    cached: Option<AnalyticsContext>,
}

impl<S: KeyValueStore> Dashboard<S> {
    pub fn new(store: RecordStore<S>) -> Self {
        Self {
            store,
            cached: None,
        }
    }

    pub fn store(&self) -> &RecordStore<S> {
        &self.store
    }

    /// Reloads every collection, replacing any cached context.
    pub fn load_all(&mut self) -> Result<&AnalyticsContext> {
        let collections = self.store.load_all()?;
        Ok(self.cached.insert(AnalyticsContext::new(collections)))
    }

    /// The cached context, loading it first if needed.
    pub fn context(&mut self) -> Result<&AnalyticsContext> {
        let context = match self.cached.take() {
            Some(context) => context,
            None => AnalyticsContext::new(self.store.load_all()?),
        };
        Ok(self.cached.insert(context))
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub fn reset_all(&mut self) -> Result<()> {
        self.invalidate();
        self.store.reset_all()
    }

    pub fn reset_funnel(&mut self) -> Result<()> {
        self.invalidate();
        self.store.reset_funnel()
    }

    pub fn seed_if_needed<R: Rng>(
        &mut self,
        threshold: usize,
        prefix: &str,
        now_ms: i64,
        rng: &mut R,
    ) -> Result<SeedOutcome> {
        let outcome = seed::seed_if_needed(&mut self.store, threshold, prefix, now_ms, rng)?;
        if matches!(outcome, SeedOutcome::Seeded { .. }) {
            self.invalidate();
        }
        Ok(outcome)
    }
}
