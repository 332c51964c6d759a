//! Metric names and display queries for datastore calls.

use crate::event::CallEvent;
use serde::Serialize;

pub(crate) const DEFAULT_PRODUCT: &str = "Unknown";
pub(crate) const DEFAULT_COLLECTION: &str = "unknown";
pub(crate) const DEFAULT_OPERATION: &str = "other";

/// Identity of a logical slow query: its metric name plus display text.
///
/// Calls with the same fingerprint aggregate together even when their raw
/// parameter values differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Fingerprint {
    pub metric_name: String,
    pub query: String,
}

/// The product, collection and operation of a call with defaults applied.
///
/// `collection` is `None` when the call did not name one; the default is
/// only substituted into synthesized query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallKey<'a> {
    pub product: &'a str,
    pub collection: Option<&'a str>,
    pub operation: &'a str,
}

impl<'a> CallKey<'a> {
    pub fn new(product: &'a str, collection: &'a str, operation: &'a str) -> Self {
        Self {
            product: non_empty_or(product, DEFAULT_PRODUCT),
            collection: (!collection.is_empty()).then_some(collection),
            operation: non_empty_or(operation, DEFAULT_OPERATION),
        }
    }

    pub fn from_event(event: &'a CallEvent) -> Self {
        Self::new(event.product.as_str(), &event.collection, &event.operation)
    }

    /// `Datastore/statement/{product}/{collection}/{operation}` when a
    /// collection is known, `Datastore/operation/{product}/{operation}`
    /// otherwise.
    pub fn metric_name(&self) -> String {
        match self.collection {
            Some(collection) => statement_metric(self.product, collection, self.operation),
            None => operation_metric(self.product, self.operation),
        }
    }

    /// The raw query when present, otherwise a synthesized description.
    pub fn display_query(&self, raw_query: &str) -> String {
        if !raw_query.is_empty() {
            return raw_query.to_string();
        }
        format!(
            "'{}' on '{}' using '{}'",
            self.operation,
            self.collection.unwrap_or(DEFAULT_COLLECTION),
            self.product
        )
    }

    pub fn fingerprint(&self, raw_query: &str) -> Fingerprint {
        Fingerprint {
            metric_name: self.metric_name(),
            query: self.display_query(raw_query),
        }
    }
}

fn non_empty_or<'a>(s: &'a str, default: &'a str) -> &'a str {
    if s.is_empty() { default } else { s }
}

/// Compute the `(metric name, display query)` pair for a call.
pub fn name_call(product: &str, collection: &str, operation: &str, raw_query: &str) -> Fingerprint {
    CallKey::new(product, collection, operation).fingerprint(raw_query)
}

pub(crate) fn statement_metric(product: &str, collection: &str, operation: &str) -> String {
    format!("Datastore/statement/{product}/{collection}/{operation}")
}

pub(crate) fn operation_metric(product: &str, operation: &str) -> String {
    format!("Datastore/operation/{product}/{operation}")
}

pub(crate) fn instance_metric(product: &str, host: &str, port_path_or_id: &str) -> String {
    format!("Datastore/instance/{product}/{host}/{port_path_or_id}")
}

pub(crate) const DATASTORE_ALL: &str = "Datastore/all";
pub(crate) const DATASTORE_ALL_WEB: &str = "Datastore/allWeb";
pub(crate) const DATASTORE_ALL_OTHER: &str = "Datastore/allOther";

pub(crate) fn product_all(product: &str) -> String {
    format!("Datastore/{product}/all")
}

pub(crate) fn product_all_web(product: &str) -> String {
    format!("Datastore/{product}/allWeb")
}

pub(crate) fn product_all_other(product: &str) -> String {
    format!("Datastore/{product}/allOther")
}
