//! End-to-end slow query behaviour through `DatastoreTracer` and `Transaction`.

use dstrace::{
    CallEvent, ConnectReply, DatastoreProduct, DatastoreTracer, Harvest, ParamValue, QueryParams,
    SlowQueryRecord, TracerConfig, TxnIdentity,
};
use serde_json::json;
use std::time::{Duration, Instant};

const TXN_NAME: &str = "WebTransaction/Go/myName";
const TXN_URL: &str = "/hello";
const INSERT_USERS: &str = "INSERT INTO users (name, age) VALUES ($1, $2)";

// ── Helpers ──────────────────────────────────────────────────────────────────

fn tracer_with(config: TracerConfig) -> DatastoreTracer {
    DatastoreTracer::new(config.with_slow_query_threshold(Duration::ZERO)).unwrap()
}

fn tracer() -> DatastoreTracer {
    tracer_with(TracerConfig::new())
}

fn insert_users() -> CallEvent {
    let now = Instant::now();
    CallEvent::new(now, now)
        .with_product(DatastoreProduct::MySql)
        .with_collection("users")
        .with_operation("INSERT")
        .with_query(INSERT_USERS)
}

fn run_one(tracer: &DatastoreTracer, event: CallEvent) -> Harvest {
    let mut txn = tracer.start_transaction(TxnIdentity::web(TXN_NAME, TXN_URL));
    txn.record_call(&event);
    txn.end();
    tracer.harvest()
}

fn only_slow_query(harvest: &Harvest) -> &SlowQueryRecord {
    assert_eq!(harvest.slow_queries.len(), 1, "{:?}", harvest.slow_queries);
    &harvest.slow_queries[0]
}

fn has_metric(harvest: &Harvest, name: &str, scope: &str) -> bool {
    harvest
        .metrics
        .iter()
        .any(|(k, _)| k.name == name && k.scope == scope)
}

fn metric_names(harvest: &Harvest) -> Vec<(String, String, bool)> {
    harvest
        .metrics
        .iter()
        .map(|(k, m)| (k.name.clone(), k.scope.clone(), m.forced))
        .collect()
}

fn params(value: serde_json::Value) -> QueryParams {
    let serde_json::Value::Object(map) = value else {
        panic!("expected object");
    };
    map.into_iter().map(|(k, v)| (k, ParamValue::from(v))).collect()
}

fn expected_insert_metrics(instance: Option<&str>) -> Vec<(String, String, bool)> {
    let mut expected = vec![
        ("Datastore/MySQL/all", "", true),
        ("Datastore/MySQL/allWeb", "", true),
        ("Datastore/all", "", true),
        ("Datastore/allWeb", "", true),
        ("Datastore/operation/MySQL/INSERT", "", false),
        ("Datastore/statement/MySQL/users/INSERT", "", false),
        ("Datastore/statement/MySQL/users/INSERT", TXN_NAME, false),
    ];
    if let Some(instance) = instance {
        expected.insert(4, (instance, "", false));
    }
    expected
        .into_iter()
        .map(|(n, s, f)| (n.to_string(), s.to_string(), f))
        .collect()
}

// ── Basic capture and the configuration gate ─────────────────────────────────

#[test]
fn basic_slow_query() {
    let harvest = run_one(&tracer(), insert_users());
    let sq = only_slow_query(&harvest);

    assert_eq!(sq.count, 1);
    assert_eq!(sq.metric_name(), "Datastore/statement/MySQL/users/INSERT");
    assert_eq!(sq.query(), INSERT_USERS);
    assert_eq!(sq.sample.txn_name, TXN_NAME);
    assert_eq!(sq.sample.txn_url, TXN_URL);
    assert_eq!(sq.sample.database_name, "");
    assert_eq!(sq.sample.host, "");
    assert_eq!(sq.sample.port_path_or_id, "");
    assert!(sq.sample.params.is_none());
    assert_eq!(sq.min, Duration::ZERO);
    assert_eq!(sq.max, Duration::ZERO);
}

#[test]
fn locally_disabled() {
    let harvest = run_one(
        &tracer_with(TracerConfig::new().disable_slow_queries()),
        insert_users(),
    );
    assert!(harvest.slow_queries.is_empty());
    assert_eq!(metric_names(&harvest), expected_insert_metrics(None));
}

#[test]
fn remotely_disabled() {
    let tracer = tracer();
    tracer.on_connect(ConnectReply {
        collect_traces: false,
    });
    let harvest = run_one(&tracer, insert_users());
    assert!(harvest.slow_queries.is_empty());
    assert_eq!(metric_names(&harvest), expected_insert_metrics(None));

    tracer.on_connect(ConnectReply::default());
    assert_eq!(run_one(&tracer, insert_users()).slow_queries.len(), 1);
}

#[test]
fn below_threshold() {
    let tracer =
        DatastoreTracer::new(TracerConfig::new().with_slow_query_threshold(Duration::from_secs(3600)))
            .unwrap();
    let harvest = run_one(&tracer, insert_users());
    assert!(harvest.slow_queries.is_empty());
    assert_eq!(metric_names(&harvest), expected_insert_metrics(None));
}

#[test]
fn at_threshold_is_captured() {
    let tracer =
        DatastoreTracer::new(TracerConfig::new().with_slow_query_threshold(Duration::from_millis(5)))
            .unwrap();
    let start = Instant::now();
    let mut event = insert_users();
    event.start = start;
    event.end = start + Duration::from_millis(5);

    let sq_count = run_one(&tracer, event).slow_queries.len();
    assert_eq!(sq_count, 1);
}

// ── Sample fields ────────────────────────────────────────────────────────────

#[test]
fn database_provided() {
    let harvest = run_one(&tracer(), insert_users().with_database_name("my_database"));
    assert_eq!(only_slow_query(&harvest).sample.database_name, "my_database");
}

#[test]
fn database_name_disabled() {
    let harvest = run_one(
        &tracer_with(TracerConfig::new().with_database_name_reporting(false)),
        insert_users().with_database_name("db-server-1"),
    );
    assert_eq!(only_slow_query(&harvest).sample.database_name, "");
}

#[test]
fn host_provided() {
    let harvest = run_one(&tracer(), insert_users().with_host("db-server-1"));
    let sq = only_slow_query(&harvest);
    assert_eq!(sq.sample.host, "db-server-1");
    assert_eq!(sq.sample.port_path_or_id, "unknown");
    assert_eq!(
        metric_names(&harvest),
        expected_insert_metrics(Some("Datastore/instance/MySQL/db-server-1/unknown"))
    );
}

#[test]
fn port_provided() {
    let harvest = run_one(&tracer(), insert_users().with_port_path_or_id("98021"));
    let sq = only_slow_query(&harvest);
    assert_eq!(sq.sample.host, "unknown");
    assert_eq!(sq.sample.port_path_or_id, "98021");
    assert_eq!(
        metric_names(&harvest),
        expected_insert_metrics(Some("Datastore/instance/MySQL/unknown/98021"))
    );
}

#[test]
fn host_and_port_provided() {
    let harvest = run_one(
        &tracer(),
        insert_users()
            .with_host("db-server-1")
            .with_port_path_or_id("98021"),
    );
    let sq = only_slow_query(&harvest);
    assert_eq!(sq.sample.host, "db-server-1");
    assert_eq!(sq.sample.port_path_or_id, "98021");
    assert!(has_metric(
        &harvest,
        "Datastore/instance/MySQL/db-server-1/98021",
        ""
    ));
}

#[test]
fn instance_disabled() {
    let harvest = run_one(
        &tracer_with(TracerConfig::new().with_instance_reporting(false)),
        insert_users().with_host("db-server-1"),
    );
    let sq = only_slow_query(&harvest);
    assert_eq!(sq.sample.host, "");
    assert_eq!(sq.sample.port_path_or_id, "");
    assert_eq!(metric_names(&harvest), expected_insert_metrics(None));
}

#[test]
fn instance_disabled_localhost() {
    let harvest = run_one(
        &tracer_with(TracerConfig::new().with_instance_reporting(false)),
        insert_users()
            .with_host("localhost")
            .with_port_path_or_id("3306"),
    );
    let sq = only_slow_query(&harvest);
    assert_eq!(sq.sample.host, "");
    assert_eq!(sq.sample.port_path_or_id, "");
    assert_eq!(metric_names(&harvest), expected_insert_metrics(None));
}

// ── Aggregation and naming ───────────────────────────────────────────────────

#[test]
fn aggregation_within_transaction() {
    let tracer = tracer();
    let mut txn = tracer.start_transaction(TxnIdentity::web(TXN_NAME, TXN_URL));
    txn.record_call(&insert_users());
    txn.record_call(&insert_users());
    let now = Instant::now();
    txn.record_call(
        &CallEvent::new(now, now)
            .with_product(DatastoreProduct::Postgres)
            .with_collection("products")
            .with_operation("INSERT")
            .with_query("INSERT INTO products (name, price) VALUES ($1, $2)"),
    );
    assert_eq!(txn.slow_queries().len(), 2);
    txn.end();

    let harvest = tracer.harvest();
    assert_eq!(harvest.slow_queries.len(), 2);
    let mysql = harvest
        .slow_queries
        .iter()
        .find(|r| r.metric_name() == "Datastore/statement/MySQL/users/INSERT")
        .unwrap();
    assert_eq!(mysql.count, 2);
    let postgres = harvest
        .slow_queries
        .iter()
        .find(|r| r.metric_name() == "Datastore/statement/Postgres/products/INSERT")
        .unwrap();
    assert_eq!(postgres.count, 1);
    assert_eq!(
        postgres.query(),
        "INSERT INTO products (name, price) VALUES ($1, $2)"
    );
}

#[test]
fn missing_query() {
    let now = Instant::now();
    let harvest = run_one(
        &tracer(),
        CallEvent::new(now, now)
            .with_product(DatastoreProduct::MySql)
            .with_collection("users")
            .with_operation("INSERT"),
    );
    let sq = only_slow_query(&harvest);
    assert_eq!(sq.metric_name(), "Datastore/statement/MySQL/users/INSERT");
    assert_eq!(sq.query(), "'INSERT' on 'users' using 'MySQL'");
}

#[test]
fn missing_everything() {
    let now = Instant::now();
    let harvest = run_one(&tracer(), CallEvent::new(now, now));
    let sq = only_slow_query(&harvest);
    assert_eq!(sq.metric_name(), "Datastore/operation/Unknown/other");
    assert_eq!(sq.query(), "'other' on 'unknown' using 'Unknown'");

    let expected: Vec<(String, String, bool)> = vec![
        ("Datastore/Unknown/all", "", true),
        ("Datastore/Unknown/allWeb", "", true),
        ("Datastore/all", "", true),
        ("Datastore/allWeb", "", true),
        ("Datastore/operation/Unknown/other", "", false),
        ("Datastore/operation/Unknown/other", TXN_NAME, false),
    ]
    .into_iter()
    .map(|(n, s, f)| (n.to_string(), s.to_string(), f))
    .collect();
    assert_eq!(metric_names(&harvest), expected);
}

#[test]
fn background_transaction_uses_all_other() {
    let tracer = tracer();
    let mut txn = tracer.start_transaction(TxnIdentity::background("OtherTransaction/Go/job"));
    txn.record_call(&insert_users());
    txn.end();

    let harvest = tracer.harvest();
    assert!(has_metric(&harvest, "Datastore/allOther", ""));
    assert!(has_metric(&harvest, "Datastore/MySQL/allOther", ""));
    assert!(!has_metric(&harvest, "Datastore/allWeb", ""));
    assert_eq!(only_slow_query(&harvest).sample.txn_url, "");
}

// ── Parameters ───────────────────────────────────────────────────────────────

#[test]
fn with_query_parameters() {
    let supplied = params(json!({"str": "zap", "int": 123}));
    let harvest = run_one(&tracer(), insert_users().with_params(supplied.clone()));
    assert_eq!(only_slow_query(&harvest).sample.params, Some(supplied));
}

#[test]
fn high_security() {
    let harvest = run_one(
        &tracer_with(TracerConfig::new().enable_high_security()),
        insert_users().with_params(params(json!({"str": "zap", "int": 123}))),
    );
    assert!(only_slow_query(&harvest).sample.params.is_none());
}

#[test]
fn invalid_parameters() {
    let mut supplied = params(json!({
        "str": "zap",
        "int": 123,
        "invalid_value": {},
        "long-key": "A".repeat(300),
    }));
    supplied.insert("key-too-long".repeat(100), ParamValue::Int(1));

    let harvest = run_one(&tracer(), insert_users().with_params(supplied));

    let expected = params(json!({
        "str": "zap",
        "int": 123,
        "long-key": "A".repeat(255),
    }));
    assert_eq!(only_slow_query(&harvest).sample.params, Some(expected));
}

#[test]
fn parameters_disabled() {
    let harvest = run_one(
        &tracer_with(TracerConfig::new().with_query_parameters(false)),
        insert_users().with_params(params(json!({"str": "zap", "int": 123}))),
    );
    assert!(only_slow_query(&harvest).sample.params.is_none());
}

// ── Harvest capacity ─────────────────────────────────────────────────────────

fn timed_select(table: &str, ms: u64) -> CallEvent {
    let start = Instant::now();
    CallEvent::new(start, start + Duration::from_millis(ms))
        .with_product(DatastoreProduct::Postgres)
        .with_collection(table)
        .with_operation("SELECT")
}

#[test]
fn full_harvest_keeps_most_expensive() {
    let tracer = tracer_with(TracerConfig::new().with_max_slow_queries(2));

    for (table, ms) in [("a", 10), ("b", 20)] {
        let mut txn = tracer.start_transaction(TxnIdentity::web(TXN_NAME, TXN_URL));
        txn.record_call(&timed_select(table, ms));
        txn.end();
    }

    let mut cheap = tracer.start_transaction(TxnIdentity::web(TXN_NAME, TXN_URL));
    cheap.record_call(&timed_select("c", 5));
    cheap.end();
    assert_eq!(tracer.aggregator().slow_query_count(), 2);

    let mut costly = tracer.start_transaction(TxnIdentity::web(TXN_NAME, TXN_URL));
    costly.record_call(&timed_select("d", 30));
    costly.end();

    let harvest = tracer.harvest();
    let kept: Vec<_> = harvest
        .slow_queries
        .iter()
        .map(|r| r.metric_name().to_string())
        .collect();
    assert_eq!(
        kept,
        vec![
            "Datastore/statement/Postgres/d/SELECT",
            "Datastore/statement/Postgres/b/SELECT",
        ]
    );
    assert_eq!(harvest.dropped_slow_queries, 2);
    // Rollups are not capped.
    assert!(has_metric(&harvest, "Datastore/statement/Postgres/c/SELECT", ""));
    assert!(has_metric(&harvest, "Datastore/statement/Postgres/a/SELECT", ""));
}

#[test]
fn unended_transaction_contributes_nothing() {
    let tracer = tracer();
    {
        let mut txn = tracer.start_transaction(TxnIdentity::web(TXN_NAME, TXN_URL));
        txn.record_call(&insert_users());
        assert_eq!(txn.metrics().len(), 7);
        drop(txn);
    }
    assert!(tracer.harvest().is_empty());
}

#[test]
fn harvest_serializes_to_json() {
    let harvest = run_one(
        &tracer(),
        insert_users().with_params(params(json!({"str": "zap"}))),
    );
    let encoded = serde_json::to_value(&harvest).unwrap();
    let sq = &encoded["slow_queries"][0];
    assert_eq!(sq["metric_name"], "Datastore/statement/MySQL/users/INSERT");
    assert_eq!(sq["query"], INSERT_USERS);
    assert_eq!(sq["count"], 1);
    assert_eq!(sq["sample"]["params"]["str"], "zap");
}
