use crate::config::{ConnectReply, TracerConfig};
use crate::error::TracerResult;
use crate::event::TxnIdentity;
use crate::harvest::{Harvest, HarvestAggregator, HarvestScheduler};
use crate::sink::HarvestSink;
use crate::transaction::Transaction;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
struct TracerInner {
    config: TracerConfig,
    collect_traces: AtomicBool,
    aggregator: Arc<HarvestAggregator>,
}

/// Process-wide entry point for datastore instrumentation.
///
/// Cheap to clone; clones share configuration, remote settings and the
/// harvest aggregator.
#[derive(Debug, Clone)]
pub struct DatastoreTracer {
    inner: Arc<TracerInner>,
}

impl DatastoreTracer {
    /// Create a tracer after validating `config`.
    pub fn new(config: TracerConfig) -> TracerResult<Self> {
        config.validate()?;
        let aggregator = Arc::new(HarvestAggregator::new(config.max_slow_queries));
        Ok(Self {
            inner: Arc::new(TracerInner {
                config,
                collect_traces: AtomicBool::new(ConnectReply::default().collect_traces),
                aggregator,
            }),
        })
    }

    pub fn config(&self) -> &TracerConfig {
        &self.inner.config
    }

    /// Apply settings received from the backend on (re)connect.
    pub fn on_connect(&self, reply: ConnectReply) {
        self.inner
            .collect_traces
            .store(reply.collect_traces, Ordering::Relaxed);
        tracing::debug!(
            target: "dstrace.gate",
            collect_traces = reply.collect_traces,
            "applied connect reply"
        );
    }

    /// Current remote permission to collect traces.
    pub fn collect_traces(&self) -> bool {
        self.inner.collect_traces.load(Ordering::Relaxed)
    }

    /// Begin a transaction. Its data reaches the harvest only when it ends.
    pub fn start_transaction(&self, identity: TxnIdentity) -> Transaction {
        Transaction::new(self.clone(), identity)
    }

    pub fn aggregator(&self) -> &Arc<HarvestAggregator> {
        &self.inner.aggregator
    }

    /// Drain the aggregator now.
    pub fn harvest(&self) -> Harvest {
        self.inner.aggregator.drain()
    }

    /// Start periodic harvesting into `sink` using the configured period.
    pub fn spawn_harvest<S: HarvestSink + 'static>(&self, sink: S) -> HarvestScheduler {
        HarvestScheduler::spawn(
            Arc::clone(&self.inner.aggregator),
            self.inner.config.harvest_period,
            Arc::new(sink),
        )
    }
}
