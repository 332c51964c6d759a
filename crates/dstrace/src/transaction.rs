use crate::event::{CallEvent, TxnIdentity};
use crate::gate::SlowQueryGate;
use crate::instance::resolve_instance;
use crate::metrics::{MetricTable, record_datastore_metrics};
use crate::naming::CallKey;
use crate::slow_query::TxnSlowQueries;
use crate::tracer::DatastoreTracer;

/// One in-flight transaction.
///
/// Calls are recorded through `&mut self`, so a transaction has a single
/// writer; wrap it in a lock to share it across concurrent sub-operations.
/// Nothing reaches the harvest until [`Transaction::end`] is called;
/// dropping a transaction discards its data.
#[must_use = "a transaction's data is discarded unless `end` is called"]
#[derive(Debug)]
pub struct Transaction {
    tracer: DatastoreTracer,
    identity: TxnIdentity,
    slow_queries: TxnSlowQueries,
    metrics: MetricTable,
}

impl Transaction {
    pub(crate) fn new(tracer: DatastoreTracer, identity: TxnIdentity) -> Self {
        Self {
            tracer,
            identity,
            slow_queries: TxnSlowQueries::new(),
            metrics: MetricTable::new(),
        }
    }

    pub fn identity(&self) -> &TxnIdentity {
        &self.identity
    }

    /// Record a completed datastore call.
    ///
    /// Rollup metrics are always recorded. The call also contributes a slow
    /// query when it passes the slow query gate.
    pub fn record_call(&mut self, event: &CallEvent) {
        let config = self.tracer.config();
        let key = CallKey::from_event(event);
        let duration = event.duration();
        let instance = resolve_instance(
            &event.host,
            &event.port_path_or_id,
            config.instance_reporting_enabled,
        );

        record_datastore_metrics(
            &mut self.metrics,
            &key,
            &instance,
            &self.identity.name,
            self.identity.is_web(),
            duration,
        );

        let gate = SlowQueryGate::new(config, self.tracer.collect_traces());
        if let Err(reason) = gate.check(duration) {
            tracing::trace!(
                target: "dstrace.gate",
                %reason,
                product = key.product,
                operation = key.operation,
                ?duration,
                "call not captured as slow query"
            );
            return;
        }

        self.slow_queries.record(event, &instance, &self.identity, config);
    }

    /// Slow queries recorded so far.
    pub fn slow_queries(&self) -> &TxnSlowQueries {
        &self.slow_queries
    }

    /// Rollup metrics recorded so far.
    pub fn metrics(&self) -> &MetricTable {
        &self.metrics
    }

    /// Finish the transaction and hand its data to the harvest aggregator.
    pub fn end(self) {
        self.tracer
            .aggregator()
            .merge_transaction(self.slow_queries, self.metrics);
    }
}
