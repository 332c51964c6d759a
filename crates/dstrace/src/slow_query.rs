//! Slow query records and the per-transaction collector.

use crate::config::TracerConfig;
use crate::event::{CallEvent, TxnIdentity};
use crate::instance::InstanceKey;
use crate::naming::{CallKey, Fingerprint};
use crate::params::{ParamPolicy, QueryParams, sanitize_params};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

/// Details retained from the first occurrence of a slow query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlowQuerySample {
    /// Empty unless database name reporting was enabled.
    pub database_name: String,
    /// Empty unless instance reporting was enabled.
    pub host: String,
    pub port_path_or_id: String,
    /// Sanitized parameters, `None` when absent or fully filtered.
    pub params: Option<QueryParams>,
    pub txn_name: String,
    /// Request URL, empty for background transactions.
    pub txn_url: String,
}

impl SlowQuerySample {
    /// Build the sample for `event` under the given configuration.
    pub fn capture(
        event: &CallEvent,
        instance: &InstanceKey,
        txn: &TxnIdentity,
        config: &TracerConfig,
    ) -> Self {
        let database_name = if config.database_name_reporting_enabled {
            event.database_name.clone()
        } else {
            String::new()
        };

        Self {
            database_name,
            host: instance.host.clone(),
            port_path_or_id: instance.port_path_or_id.clone(),
            params: sanitize_params(
                event.query_parameters.as_ref(),
                &ParamPolicy::from_config(config),
            ),
            txn_name: txn.name.clone(),
            txn_url: txn.url.clone().unwrap_or_default(),
        }
    }
}

/// Aggregated timings for one fingerprint plus its retained sample.
///
/// `count >= 1`, and `min <= max` with `total` the sum of all observed
/// durations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowQueryRecord {
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    pub sample: SlowQuerySample,
}

impl SlowQueryRecord {
    pub fn new(fingerprint: Fingerprint, duration: Duration, sample: SlowQuerySample) -> Self {
        Self {
            fingerprint,
            count: 1,
            total: duration,
            min: duration,
            max: duration,
            sample,
        }
    }

    /// Add one more occurrence. The sample is left untouched.
    pub fn observe(&mut self, duration: Duration) {
        self.count = self.count.saturating_add(1);
        self.total = self.total.saturating_add(duration);
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
    }

    /// Fold `other` into this record, keeping this record's sample.
    pub fn aggregate(&mut self, other: &SlowQueryRecord) {
        self.count = self.count.saturating_add(other.count);
        self.total = self.total.saturating_add(other.total);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn metric_name(&self) -> &str {
        &self.fingerprint.metric_name
    }

    pub fn query(&self) -> &str {
        &self.fingerprint.query
    }
}

/// Slow queries collected during one transaction, keyed by fingerprint.
///
/// Uncapped; the whole collection is handed to the harvest aggregator when
/// the transaction ends.
#[derive(Debug, Default)]
pub struct TxnSlowQueries {
    records: HashMap<Fingerprint, SlowQueryRecord>,
}

impl TxnSlowQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence of `fingerprint`.
    ///
    /// `sample` is only invoked for the first occurrence.
    pub fn observe(
        &mut self,
        fingerprint: Fingerprint,
        duration: Duration,
        sample: impl FnOnce() -> SlowQuerySample,
    ) {
        match self.records.entry(fingerprint) {
            Entry::Occupied(mut e) => e.get_mut().observe(duration),
            Entry::Vacant(e) => {
                let record = SlowQueryRecord::new(e.key().clone(), duration, sample());
                e.insert(record);
            }
        }
    }

    /// Name `event` and record it against the already resolved `instance`.
    ///
    /// Does not consult the slow query gate. The sample is only captured and
    /// sanitized for the first occurrence of a fingerprint.
    pub fn record(
        &mut self,
        event: &CallEvent,
        instance: &InstanceKey,
        txn: &TxnIdentity,
        config: &TracerConfig,
    ) {
        let fingerprint = CallKey::from_event(event).fingerprint(&event.parameterized_query);
        self.observe(fingerprint, event.duration(), || {
            SlowQuerySample::capture(event, instance, txn, config)
        });
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&SlowQueryRecord> {
        self.records.get(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<SlowQueryRecord> {
        self.records.into_values().collect()
    }
}
