//! Reportable host and port/path/id for a datastore call.

use std::sync::OnceLock;

const UNKNOWN: &str = "unknown";

const LOCAL_HOSTS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "0:0:0:0:0:0:0:1",
    "::1",
    "0:0:0:0:0:0:0:0",
    "::",
];

/// Host and port/path/id as they will be reported.
///
/// Both fields are empty when instance reporting is off or nothing was
/// supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceKey {
    pub host: String,
    pub port_path_or_id: String,
}

impl InstanceKey {
    /// Whether a per-instance metric should be emitted.
    pub fn is_reportable(&self) -> bool {
        !self.host.is_empty() && !self.port_path_or_id.is_empty()
    }
}

/// Resolve the reportable instance for a call.
///
/// A missing half of a supplied pair resolves to `"unknown"`. Local
/// loopback hosts are replaced with this machine's hostname.
pub fn resolve_instance(host: &str, port_path_or_id: &str, reporting_enabled: bool) -> InstanceKey {
    if !reporting_enabled || (host.is_empty() && port_path_or_id.is_empty()) {
        return InstanceKey::default();
    }

    let host = if host.is_empty() {
        UNKNOWN.to_string()
    } else if is_local_host(host) {
        this_host().to_string()
    } else {
        host.to_string()
    };

    let port_path_or_id = if port_path_or_id.is_empty() {
        UNKNOWN.to_string()
    } else {
        port_path_or_id.to_string()
    };

    InstanceKey {
        host,
        port_path_or_id,
    }
}

fn is_local_host(host: &str) -> bool {
    LOCAL_HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host))
}

fn this_host() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    })
}
