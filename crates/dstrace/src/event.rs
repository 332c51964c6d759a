use crate::params::{ParamValue, QueryParams};
use std::fmt;
use std::time::{Duration, Instant};

/// The kind of datastore a call was made against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DatastoreProduct {
    /// Product not set
    #[default]
    Unknown,
    Cassandra,
    Derby,
    Elasticsearch,
    Firebird,
    IbmDb2,
    Informix,
    Memcached,
    MongoDb,
    MySql,
    MsSql,
    Oracle,
    Postgres,
    Redis,
    Solr,
    Sqlite,
    CouchDb,
    Riak,
    VoltDb,
    DynamoDb,
    /// Any product not listed above
    Custom(String),
}

impl DatastoreProduct {
    /// Name used in metric names and synthesized queries.
    pub fn as_str(&self) -> &str {
        match self {
            DatastoreProduct::Unknown => "Unknown",
            DatastoreProduct::Cassandra => "Cassandra",
            DatastoreProduct::Derby => "Derby",
            DatastoreProduct::Elasticsearch => "Elasticsearch",
            DatastoreProduct::Firebird => "Firebird",
            DatastoreProduct::IbmDb2 => "IBMDB2",
            DatastoreProduct::Informix => "Informix",
            DatastoreProduct::Memcached => "Memcached",
            DatastoreProduct::MongoDb => "MongoDB",
            DatastoreProduct::MySql => "MySQL",
            DatastoreProduct::MsSql => "MSSQL",
            DatastoreProduct::Oracle => "Oracle",
            DatastoreProduct::Postgres => "Postgres",
            DatastoreProduct::Redis => "Redis",
            DatastoreProduct::Solr => "Solr",
            DatastoreProduct::Sqlite => "SQLite",
            DatastoreProduct::CouchDb => "CouchDB",
            DatastoreProduct::Riak => "Riak",
            DatastoreProduct::VoltDb => "VoltDB",
            DatastoreProduct::DynamoDb => "DynamoDB",
            DatastoreProduct::Custom(name) if name.is_empty() => "Unknown",
            DatastoreProduct::Custom(name) => name,
        }
    }
}

impl fmt::Display for DatastoreProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for DatastoreProduct {
    fn from(name: &str) -> Self {
        match name {
            "" | "Unknown" => DatastoreProduct::Unknown,
            "Cassandra" => DatastoreProduct::Cassandra,
            "Derby" => DatastoreProduct::Derby,
            "Elasticsearch" => DatastoreProduct::Elasticsearch,
            "Firebird" => DatastoreProduct::Firebird,
            "IBMDB2" => DatastoreProduct::IbmDb2,
            "Informix" => DatastoreProduct::Informix,
            "Memcached" => DatastoreProduct::Memcached,
            "MongoDB" => DatastoreProduct::MongoDb,
            "MySQL" => DatastoreProduct::MySql,
            "MSSQL" => DatastoreProduct::MsSql,
            "Oracle" => DatastoreProduct::Oracle,
            "Postgres" => DatastoreProduct::Postgres,
            "Redis" => DatastoreProduct::Redis,
            "Solr" => DatastoreProduct::Solr,
            "SQLite" => DatastoreProduct::Sqlite,
            "CouchDB" => DatastoreProduct::CouchDb,
            "Riak" => DatastoreProduct::Riak,
            "VoltDB" => DatastoreProduct::VoltDb,
            "DynamoDB" => DatastoreProduct::DynamoDb,
            other => DatastoreProduct::Custom(other.to_string()),
        }
    }
}

impl From<String> for DatastoreProduct {
    fn from(name: String) -> Self {
        DatastoreProduct::from(name.as_str())
    }
}

/// Name and request URL of the transaction that owns a call.
///
/// A transaction with a request URL is a web transaction; one without is
/// a background transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxnIdentity {
    /// Full transaction name, also used as the scope of scoped metrics.
    pub name: String,
    /// Request URL for web transactions.
    pub url: Option<String>,
}

impl TxnIdentity {
    /// Identity of a web transaction.
    pub fn web(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
        }
    }

    /// Identity of a background transaction.
    pub fn background(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }

    pub fn is_web(&self) -> bool {
        self.url.is_some()
    }
}

/// A completed, timed datastore call.
///
/// Every identifying field is optional; empty strings count as unset.
#[derive(Debug, Clone)]
pub struct CallEvent {
    pub product: DatastoreProduct,
    /// Table or collection name.
    pub collection: String,
    /// Operation verb, e.g. `SELECT`.
    pub operation: String,
    /// Query text, assumed already parameterized by the caller.
    pub parameterized_query: String,
    pub query_parameters: Option<QueryParams>,
    pub database_name: String,
    pub host: String,
    /// Port, socket path or other instance identifier.
    pub port_path_or_id: String,
    pub start: Instant,
    pub end: Instant,
}

impl CallEvent {
    /// Create an event for a call timed from `start` to `end`.
    pub fn new(start: Instant, end: Instant) -> Self {
        Self {
            product: DatastoreProduct::Unknown,
            collection: String::new(),
            operation: String::new(),
            parameterized_query: String::new(),
            query_parameters: None,
            database_name: String::new(),
            host: String::new(),
            port_path_or_id: String::new(),
            start,
            end,
        }
    }

    /// Create an event for a call that started at `start` and ends now.
    pub fn ending_now(start: Instant) -> Self {
        Self::new(start, Instant::now())
    }

    pub fn with_product(mut self, product: impl Into<DatastoreProduct>) -> Self {
        self.product = product.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.parameterized_query = query.into();
        self
    }

    /// Replace the query parameters.
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.query_parameters = Some(params);
        self
    }

    /// Add a single query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query_parameters
            .get_or_insert_with(QueryParams::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port_path_or_id(mut self, port: impl Into<String>) -> Self {
        self.port_path_or_id = port.into();
        self
    }

    /// Call duration. An end before the start counts as zero.
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}
