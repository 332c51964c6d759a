use super::HarvestAggregator;
use crate::sink::HarvestSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Background task that drains an aggregator once per period.
///
/// Ticks are handled one at a time by a single task, so drains never
/// overlap. A tick that fires late is still delivered. Must be spawned from
/// within a tokio runtime.
pub struct HarvestScheduler {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl HarvestScheduler {
    /// Start harvesting `aggregator` into `sink` every `period`.
    ///
    /// The first harvest happens one full period after spawning.
    pub fn spawn(
        aggregator: Arc<HarvestAggregator>,
        period: Duration,
        sink: Arc<dyn HarvestSink>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sink.consume(aggregator.drain());
                    }
                    // Fires on an explicit shutdown and when the handle is dropped.
                    _ = &mut shutdown_rx => {
                        sink.consume(aggregator.drain());
                        tracing::debug!(target: "dstrace.harvest", "harvest scheduler stopped");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Stop the task after one final harvest, and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = self.task.await {
            tracing::warn!(target: "dstrace.harvest", error = %err, "harvest task failed");
        }
    }
}
