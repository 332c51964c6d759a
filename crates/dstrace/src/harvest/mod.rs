//! Process-wide aggregation of transaction data between harvests.
//!
//! Transactions merge their slow queries and metrics into a shared
//! [`HarvestAggregator`] when they end. Once per harvest period the
//! aggregator is drained: its contents are handed out as a [`Harvest`] and
//! it starts over empty.
//!
//! Merges and drains serialize on one lock, so a transaction that ends
//! while a drain is in progress lands wholly in either the drained harvest
//! or the next one, never split across both.

mod scheduler;
mod set;


pub use scheduler::HarvestScheduler;
pub use set::{MergeOutcome, SlowQuerySet};

use crate::metrics::{Metric, MetricKey, MetricTable};
use crate::slow_query::{SlowQueryRecord, TxnSlowQueries};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Everything collected during one harvest interval.
#[derive(Debug, Clone, Serialize)]
pub struct Harvest {
    /// Retained slow queries, most expensive first.
    pub slow_queries: Vec<SlowQueryRecord>,
    /// Rollup metrics ordered by name then scope.
    pub metrics: Vec<(MetricKey, Metric)>,
    /// Distinct slow queries that did not fit and were dropped or evicted.
    pub dropped_slow_queries: u64,
    /// Time between the start of the interval and the drain.
    pub interval: Duration,
}

impl Harvest {
    pub fn is_empty(&self) -> bool {
        self.slow_queries.is_empty() && self.metrics.is_empty()
    }
}

#[derive(Debug)]
struct HarvestState {
    slow_queries: SlowQuerySet,
    metrics: MetricTable,
    started: Instant,
}

impl HarvestState {
    fn new(capacity: usize) -> Self {
        Self {
            slow_queries: SlowQuerySet::new(capacity),
            metrics: MetricTable::new(),
            started: Instant::now(),
        }
    }
}

/// Shared, capacity-bounded store of slow queries and metrics.
#[derive(Debug)]
pub struct HarvestAggregator {
    capacity: usize,
    state: Mutex<HarvestState>,
}

impl HarvestAggregator {
    /// Create an aggregator retaining at most `capacity` distinct slow queries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(HarvestState::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, HarvestState> {
        // Every mutation completes before the guard drops, so a poisoned
        // state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge one transaction's slow queries.
    pub fn merge(&self, slow_queries: TxnSlowQueries) {
        self.merge_transaction(slow_queries, MetricTable::new());
    }

    /// Merge one transaction's slow queries and metrics as a single step.
    pub fn merge_transaction(&self, slow_queries: TxnSlowQueries, metrics: MetricTable) {
        let mut records = slow_queries.into_records();
        // Offer the most expensive first so a full set keeps the costliest.
        records.sort_by(|a, b| b.total.cmp(&a.total));

        let mut state = self.lock();
        state.metrics.merge(metrics);
        for record in records {
            self.offer(&mut state, record);
        }
    }

    /// Merge already-aggregated records, e.g. a harvest a transport could not
    /// deliver.
    pub fn merge_records(&self, records: impl IntoIterator<Item = SlowQueryRecord>) {
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_by(|a, b| b.total.cmp(&a.total));

        let mut state = self.lock();
        for record in records {
            self.offer(&mut state, record);
        }
    }

    fn offer(&self, state: &mut HarvestState, record: SlowQueryRecord) {
        match state.slow_queries.merge(record) {
            MergeOutcome::Evicted(fingerprint) => {
                tracing::debug!(
                    target: "dstrace.harvest",
                    metric_name = %fingerprint.metric_name,
                    "evicted cheapest slow query"
                );
            }
            MergeOutcome::Dropped => {
                tracing::debug!(
                    target: "dstrace.harvest",
                    capacity = self.capacity,
                    "slow query set full, dropped record"
                );
            }
            MergeOutcome::Aggregated | MergeOutcome::Inserted => {}
        }
    }

    /// Take everything collected so far and reset to empty.
    pub fn drain(&self) -> Harvest {
        let state = {
            let mut guard = self.lock();
            std::mem::replace(&mut *guard, HarvestState::new(self.capacity))
        };

        let harvest = Harvest {
            dropped_slow_queries: state.slow_queries.dropped(),
            interval: state.started.elapsed(),
            slow_queries: state.slow_queries.into_records(),
            metrics: state.metrics.into_sorted_vec(),
        };
        tracing::debug!(
            target: "dstrace.harvest",
            slow_queries = harvest.slow_queries.len(),
            metrics = harvest.metrics.len(),
            dropped = harvest.dropped_slow_queries,
            "harvest drained"
        );
        harvest
    }

    /// Number of distinct slow queries currently held.
    pub fn slow_query_count(&self) -> usize {
        self.lock().slow_queries.len()
    }
}
