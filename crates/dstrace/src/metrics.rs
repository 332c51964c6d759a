//! Rollup metrics recorded for every datastore call.

use crate::instance::InstanceKey;
use crate::naming::{self, CallKey};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

/// Metric name plus scope. Unscoped metrics have an empty scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetricKey {
    pub name: String,
    pub scope: String,
}

impl MetricKey {
    pub fn unscoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: String::new(),
        }
    }

    pub fn scoped(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }
}

/// Timing statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricData {
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Sum of squared durations, in seconds².
    pub sum_of_squares: f64,
}

impl MetricData {
    fn single(duration: Duration) -> Self {
        Self {
            count: 1,
            total: duration,
            min: duration,
            max: duration,
            sum_of_squares: duration.as_secs_f64() * duration.as_secs_f64(),
        }
    }

    fn aggregate(&mut self, other: &MetricData) {
        self.count = self.count.saturating_add(other.count);
        self.total = self.total.saturating_add(other.total);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum_of_squares += other.sum_of_squares;
    }
}

/// A recorded metric and whether it is forced.
///
/// Forced metrics are always kept by the backend even when it trims
/// low-volume metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metric {
    pub data: MetricData,
    pub forced: bool,
}

/// Accumulates metrics keyed by name and scope.
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    metrics: HashMap<MetricKey, Metric>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: MetricKey, duration: Duration, forced: bool) {
        self.add_data(key, MetricData::single(duration), forced);
    }

    fn add_data(&mut self, key: MetricKey, data: MetricData, forced: bool) {
        match self.metrics.entry(key) {
            Entry::Occupied(mut e) => {
                let metric = e.get_mut();
                metric.data.aggregate(&data);
                metric.forced |= forced;
            }
            Entry::Vacant(e) => {
                e.insert(Metric { data, forced });
            }
        }
    }

    /// Fold every metric of `other` into this table.
    pub fn merge(&mut self, other: MetricTable) {
        for (key, metric) in other.metrics {
            self.add_data(key, metric.data, metric.forced);
        }
    }

    pub fn get(&self, name: &str, scope: &str) -> Option<&Metric> {
        self.metrics.get(&MetricKey::scoped(name, scope))
    }

    pub fn contains(&self, name: &str, scope: &str) -> bool {
        self.get(name, scope).is_some()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, &Metric)> {
        self.metrics.iter()
    }

    /// Consume the table into entries ordered by name then scope.
    pub fn into_sorted_vec(self) -> Vec<(MetricKey, Metric)> {
        let mut out: Vec<_> = self.metrics.into_iter().collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Record the rollup metrics for one datastore call.
///
/// Emits the overall, per-product, per-operation and per-statement metrics
/// plus the per-instance metric when the instance is reportable. The
/// statement metric (or the operation metric, without a collection) is
/// also recorded under `scope`.
pub fn record_datastore_metrics(
    table: &mut MetricTable,
    key: &CallKey<'_>,
    instance: &InstanceKey,
    scope: &str,
    is_web: bool,
    duration: Duration,
) {
    let product = key.product;

    table.add(MetricKey::unscoped(naming::DATASTORE_ALL), duration, true);
    table.add(MetricKey::unscoped(naming::product_all(product)), duration, true);
    if is_web {
        table.add(MetricKey::unscoped(naming::DATASTORE_ALL_WEB), duration, true);
        table.add(
            MetricKey::unscoped(naming::product_all_web(product)),
            duration,
            true,
        );
    } else {
        table.add(MetricKey::unscoped(naming::DATASTORE_ALL_OTHER), duration, true);
        table.add(
            MetricKey::unscoped(naming::product_all_other(product)),
            duration,
            true,
        );
    }

    let operation = naming::operation_metric(product, key.operation);
    table.add(MetricKey::unscoped(operation.clone()), duration, false);

    let scoped_name = match key.collection {
        Some(collection) => {
            let statement = naming::statement_metric(product, collection, key.operation);
            table.add(MetricKey::unscoped(statement.clone()), duration, false);
            statement
        }
        None => operation,
    };
    if !scope.is_empty() {
        table.add(MetricKey::scoped(scoped_name, scope), duration, false);
    }

    if instance.is_reportable() {
        let name = naming::instance_metric(product, &instance.host, &instance.port_path_or_id);
        table.add(MetricKey::unscoped(name), duration, false);
    }
}
