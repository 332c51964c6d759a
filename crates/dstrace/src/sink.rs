//! Consumers of drained harvests.
//!
//! Encoding and delivering a harvest to a collector is up to the
//! implementor of [`HarvestSink`]. The sinks here log, forward over a
//! channel, or discard.

use crate::harvest::Harvest;
use crate::truncate_bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

/// Receives each drained [`Harvest`].
///
/// Called from the harvest task; implementations should hand work off
/// rather than block.
pub trait HarvestSink: Send + Sync {
    fn consume(&self, harvest: Harvest);
}

impl<S: HarvestSink + ?Sized> HarvestSink for Arc<S> {
    fn consume(&self, harvest: Harvest) {
        (**self).consume(harvest);
    }
}

/// A sink that discards every harvest.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl HarvestSink for NoopSink {
    fn consume(&self, _harvest: Harvest) {}
}

/// A `tracing`-based sink that emits one event per slow query.
///
/// Parameter values are never logged.
#[derive(Debug, Clone)]
pub struct LoggingSink {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long queries (in bytes). `None` means no truncation.
    pub max_query_length: Option<usize>,
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            max_query_length: Some(200),
        }
    }
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum query length to display.
    pub fn max_query_length(mut self, len: usize) -> Self {
        self.max_query_length = Some(len);
        self
    }

    /// Disable query truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_query_length = None;
        self
    }

    pub(crate) fn truncate_query(&self, query: &str) -> String {
        match self.max_query_length {
            Some(max) if query.len() > max => format!("{}...", truncate_bytes(query, max)),
            _ => query.to_string(),
        }
    }
}

impl HarvestSink for LoggingSink {
    fn consume(&self, harvest: Harvest) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        emit_at_level!(
            self.level,
            target: "dstrace.sink",
            slow_queries = harvest.slow_queries.len(),
            metrics = harvest.metrics.len(),
            dropped = harvest.dropped_slow_queries,
            interval = ?harvest.interval,
            "harvest"
        );

        for record in &harvest.slow_queries {
            let query = self.truncate_query(record.query());
            emit_at_level!(
                self.level,
                target: "dstrace.sink",
                metric_name = %record.metric_name(),
                query = %query,
                count = record.count,
                total = ?record.total,
                min = ?record.min,
                max = ?record.max,
                txn = %record.sample.txn_name,
                has_params = record.sample.params.is_some(),
                "slow query"
            );
        }
    }
}

/// Forwards harvests over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Harvest>,
}

impl ChannelSink {
    /// Create a sink and the receiver its harvests arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Harvest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HarvestSink for ChannelSink {
    fn consume(&self, harvest: Harvest) {
        if self.tx.send(harvest).is_err() {
            tracing::warn!(target: "dstrace.sink", "harvest receiver closed, harvest discarded");
        }
    }
}
