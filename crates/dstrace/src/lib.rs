//! # dstrace
//!
//! Datastore call instrumentation for an application performance agent.
//!
//! Every completed datastore call is turned into:
//!
//! - **Rollup metrics**: overall, per-product, per-operation, per-statement
//!   and per-instance timings, recorded for every call.
//! - **Slow query exemplars**: calls that pass the slow query gate are
//!   grouped by fingerprint (metric name + display query), with one retained
//!   sample per fingerprint and a bounded number of fingerprints per harvest.
//!
//! ```ignore
//! use dstrace::{CallEvent, DatastoreTracer, LoggingSink, TracerConfig, TxnIdentity};
//! use std::time::{Duration, Instant};
//!
//! let tracer = DatastoreTracer::new(
//!     TracerConfig::new().with_slow_query_threshold(Duration::from_millis(50)),
//! )?;
//! let scheduler = tracer.spawn_harvest(LoggingSink::new());
//!
//! let mut txn = tracer.start_transaction(TxnIdentity::web("WebTransaction/Go/users", "/users"));
//! let start = Instant::now();
//! // ... run the query ...
//! txn.record_call(
//!     &CallEvent::ending_now(start)
//!         .with_product("Postgres")
//!         .with_collection("users")
//!         .with_operation("SELECT")
//!         .with_query("SELECT * FROM users WHERE id = $1")
//!         .with_param("id", 42),
//! );
//! txn.end();
//!
//! scheduler.shutdown().await;
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod harvest;
pub mod instance;
pub mod metrics;
pub mod naming;
pub mod params;
pub mod sink;
pub mod slow_query;
pub mod tracer;
pub mod transaction;

pub use config::{ConnectReply, TracerConfig};
pub use error::{TracerError, TracerResult};
pub use event::{CallEvent, DatastoreProduct, TxnIdentity};
pub use gate::{Rejection, SlowQueryGate};
pub use harvest::{Harvest, HarvestAggregator, HarvestScheduler, MergeOutcome, SlowQuerySet};
pub use instance::{InstanceKey, resolve_instance};
pub use metrics::{Metric, MetricData, MetricKey, MetricTable};
pub use naming::{CallKey, Fingerprint, name_call};
pub use params::{ParamPolicy, ParamValue, QueryParams, sanitize_params};
pub use sink::{ChannelSink, HarvestSink, LoggingSink, NoopSink};
pub use slow_query::{SlowQueryRecord, SlowQuerySample, TxnSlowQueries};
pub use tracer::DatastoreTracer;
pub use transaction::Transaction;

/// Cut `s` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
