use crate::error::{TracerError, TracerResult};
use serde::Deserialize;
use std::time::Duration;

/// Default slow query threshold.
pub const DEFAULT_SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(10);

/// Default number of distinct slow queries kept per harvest interval.
pub const DEFAULT_MAX_SLOW_QUERIES: usize = 10;

/// Default maximum length (bytes) of a query parameter key.
pub const DEFAULT_PARAM_KEY_LIMIT: usize = 255;

/// Default maximum length (bytes) of a query parameter string value.
pub const DEFAULT_PARAM_VALUE_LIMIT: usize = 255;

/// Default harvest period.
pub const DEFAULT_HARVEST_PERIOD: Duration = Duration::from_secs(60);

/// Process-wide datastore tracer configuration.
///
/// Defaults capture slow queries above 10ms with parameters, instance and
/// database name reporting all enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerConfig {
    /// Whether slow query exemplars are captured at all.
    pub slow_query_enabled: bool,
    /// Calls shorter than this are never captured as slow queries.
    pub slow_query_threshold: Duration,
    /// Whether query parameters are retained on slow query samples.
    pub query_parameters_enabled: bool,
    /// Whether host and port/path/id are reported.
    pub instance_reporting_enabled: bool,
    /// Whether the database name is reported.
    pub database_name_reporting_enabled: bool,
    /// High security mode. Suppresses query parameters regardless of other settings.
    pub high_security: bool,
    /// Maximum number of distinct slow queries per harvest interval.
    pub max_slow_queries: usize,
    /// Keys longer than this are dropped from query parameters.
    pub param_key_limit: usize,
    /// String values longer than this are truncated.
    pub param_value_limit: usize,
    /// Interval between harvests.
    pub harvest_period: Duration,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            slow_query_enabled: true,
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
            query_parameters_enabled: true,
            instance_reporting_enabled: true,
            database_name_reporting_enabled: true,
            high_security: false,
            max_slow_queries: DEFAULT_MAX_SLOW_QUERIES,
            param_key_limit: DEFAULT_PARAM_KEY_LIMIT,
            param_value_limit: DEFAULT_PARAM_VALUE_LIMIT,
            harvest_period: DEFAULT_HARVEST_PERIOD,
        }
    }
}

impl TracerConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slow query threshold.
    ///
    /// A zero threshold admits every call, including zero-duration ones.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Enable slow query capture.
    pub fn enable_slow_queries(mut self) -> Self {
        self.slow_query_enabled = true;
        self
    }

    /// Disable slow query capture. Rollup metrics are still recorded.
    pub fn disable_slow_queries(mut self) -> Self {
        self.slow_query_enabled = false;
        self
    }

    /// Enable or disable query parameter capture.
    pub fn with_query_parameters(mut self, enabled: bool) -> Self {
        self.query_parameters_enabled = enabled;
        self
    }

    /// Enable or disable instance (host/port) reporting.
    pub fn with_instance_reporting(mut self, enabled: bool) -> Self {
        self.instance_reporting_enabled = enabled;
        self
    }

    /// Enable or disable database name reporting.
    pub fn with_database_name_reporting(mut self, enabled: bool) -> Self {
        self.database_name_reporting_enabled = enabled;
        self
    }

    /// Turn on high security mode.
    pub fn enable_high_security(mut self) -> Self {
        self.high_security = true;
        self
    }

    /// Set the number of distinct slow queries kept per harvest.
    pub fn with_max_slow_queries(mut self, max: usize) -> Self {
        self.max_slow_queries = max;
        self
    }

    /// Set the parameter key and value length limits.
    pub fn with_param_limits(mut self, key_limit: usize, value_limit: usize) -> Self {
        self.param_key_limit = key_limit;
        self.param_value_limit = value_limit;
        self
    }

    /// Set the harvest period.
    pub fn with_harvest_period(mut self, period: Duration) -> Self {
        self.harvest_period = period;
        self
    }

    /// Check that limits and periods are usable.
    pub fn validate(&self) -> TracerResult<()> {
        if self.harvest_period.is_zero() {
            return Err(TracerError::config("harvest period must be greater than zero"));
        }
        if self.param_key_limit == 0 || self.param_value_limit == 0 {
            return Err(TracerError::config(
                "parameter key and value limits must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Parse a TOML configuration document.
    ///
    /// Every key is optional; missing keys keep their defaults.
    ///
    /// ```toml
    /// high_security = false
    ///
    /// [datastore_tracer.slow_query]
    /// enabled = true
    /// threshold_ms = 10
    ///
    /// [datastore_tracer.query_parameters]
    /// enabled = true
    ///
    /// [harvest]
    /// period_ms = 60000
    /// max_slow_queries = 10
    /// ```
    pub fn from_toml_str(raw: &str) -> TracerResult<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        let config = file.into_config();
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    high_security: Option<bool>,
    #[serde(default)]
    datastore_tracer: DatastoreTracerSection,
    #[serde(default)]
    harvest: HarvestSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatastoreTracerSection {
    #[serde(default)]
    slow_query: SlowQuerySection,
    #[serde(default)]
    query_parameters: ToggleSection,
    #[serde(default)]
    instance_reporting: ToggleSection,
    #[serde(default)]
    database_name_reporting: ToggleSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SlowQuerySection {
    enabled: Option<bool>,
    threshold_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToggleSection {
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HarvestSection {
    period_ms: Option<u64>,
    max_slow_queries: Option<usize>,
    param_key_limit: Option<usize>,
    param_value_limit: Option<usize>,
}

impl ConfigFile {
    fn into_config(self) -> TracerConfig {
        let mut config = TracerConfig::default();
        let ds = self.datastore_tracer;

        if let Some(v) = self.high_security {
            config.high_security = v;
        }
        if let Some(v) = ds.slow_query.enabled {
            config.slow_query_enabled = v;
        }
        if let Some(ms) = ds.slow_query.threshold_ms {
            config.slow_query_threshold = Duration::from_millis(ms);
        }
        if let Some(v) = ds.query_parameters.enabled {
            config.query_parameters_enabled = v;
        }
        if let Some(v) = ds.instance_reporting.enabled {
            config.instance_reporting_enabled = v;
        }
        if let Some(v) = ds.database_name_reporting.enabled {
            config.database_name_reporting_enabled = v;
        }
        if let Some(ms) = self.harvest.period_ms {
            config.harvest_period = Duration::from_millis(ms);
        }
        if let Some(v) = self.harvest.max_slow_queries {
            config.max_slow_queries = v;
        }
        if let Some(v) = self.harvest.param_key_limit {
            config.param_key_limit = v;
        }
        if let Some(v) = self.harvest.param_value_limit {
            config.param_value_limit = v;
        }
        config
    }
}

/// Settings pushed by the monitoring backend when the agent connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConnectReply {
    /// Whether the backend accepts traces (including slow queries).
    #[serde(default = "default_collect_traces")]
    pub collect_traces: bool,
}

fn default_collect_traces() -> bool {
    true
}

impl Default for ConnectReply {
    fn default() -> Self {
        Self {
            collect_traces: default_collect_traces(),
        }
    }
}
