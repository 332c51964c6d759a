use crate::config::TracerConfig;
use std::fmt;
use std::time::Duration;

/// Why a call was not eligible for slow query capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The backend turned trace collection off.
    CollectTracesDisabled,
    /// Slow query capture is disabled locally.
    SlowQueriesDisabled,
    /// The call finished faster than the threshold.
    BelowThreshold,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::CollectTracesDisabled => "collect_traces disabled by backend",
            Rejection::SlowQueriesDisabled => "slow queries disabled",
            Rejection::BelowThreshold => "below threshold",
        })
    }
}

/// Decides whether a call may contribute a slow query exemplar.
///
/// Checks run in order and stop at the first failure: remote permission,
/// local enable flag, then the duration threshold. Rollup metrics are
/// recorded regardless of the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlowQueryGate {
    pub collect_traces: bool,
    pub enabled: bool,
    pub threshold: Duration,
}

impl SlowQueryGate {
    pub fn new(config: &TracerConfig, collect_traces: bool) -> Self {
        Self {
            collect_traces,
            enabled: config.slow_query_enabled,
            threshold: config.slow_query_threshold,
        }
    }

    pub fn check(&self, duration: Duration) -> Result<(), Rejection> {
        if !self.collect_traces {
            return Err(Rejection::CollectTracesDisabled);
        }
        if !self.enabled {
            return Err(Rejection::SlowQueriesDisabled);
        }
        if duration < self.threshold {
            return Err(Rejection::BelowThreshold);
        }
        Ok(())
    }

    pub fn admits(&self, duration: Duration) -> bool {
        self.check(duration).is_ok()
    }
}
