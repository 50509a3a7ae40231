//! Framework broker discovery integration tests
//!
//! The scheduler endpoint is a wiremock server; SRV answers are stubbed.

use async_trait::async_trait;
use kafka_relay::resolver::{
    BrokerResolver, DiscoveryConfig, FrameworkDiscovery, ResolveBrokers, SrvLookup, SrvRecord,
};
use kafka_relay::RelayError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Framework name doubling as the scheduler host when the HTTP domain is empty
const FRAMEWORK: &str = "127.0.0.1";

struct StubSrv {
    answer: Result<Vec<SrvRecord>, String>,
    queried: Mutex<Vec<String>>,
}

impl StubSrv {
    fn new(answer: Result<Vec<SrvRecord>, String>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            queried: Mutex::new(Vec::new()),
        })
    }

    fn port(port: u16) -> Arc<Self> {
        Self::new(Ok(vec![SrvRecord {
            target: "scheduler.kafka.marathon.mesos.".to_string(),
            port,
            priority: 0,
            weight: 1,
        }]))
    }

    fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl SrvLookup for StubSrv {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>, String> {
        self.queried.lock().unwrap().push(name.to_string());
        self.answer.clone()
    }
}

fn resolver(srv: Arc<StubSrv>) -> BrokerResolver {
    let config = DiscoveryConfig {
        srv_domain: "marathon.mesos".to_string(),
        http_domain: String::new(),
        timeout: Duration::from_secs(5),
    };
    let discovery = FrameworkDiscovery::new(config, srv).expect("HTTP client builds");
    BrokerResolver::framework(FRAMEWORK, discovery)
}

fn connection_body(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/json")
        .set_body_string(body)
}

#[tokio::test]
async fn test_resolves_brokers_from_scheduler() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(connection_body(
            r#"{"address":["10.0.0.5:9092"],"dns":["broker-0.kafka.mesos:9092","broker-1.kafka.mesos:9092"]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let srv = StubSrv::port(server.address().port());
    let resolver = resolver(Arc::clone(&srv));

    let brokers = resolver.resolve().await.expect("brokers resolve");

    assert_eq!(
        brokers.as_slice(),
        ["broker-0.kafka.mesos:9092", "broker-1.kafka.mesos:9092"]
    );
    assert_eq!(srv.queried(), vec!["_127.0.0.1._tcp.marathon.mesos"]);
    server.verify().await;
}

#[tokio::test]
async fn test_zero_srv_records_skips_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(connection_body(r#"{"dns":["a:1"]}"#))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = resolver(StubSrv::new(Ok(vec![])));
    let err = resolver.resolve().await.unwrap_err();

    assert!(matches!(err, RelayError::Lookup { .. }), "got {:?}", err);
    assert_eq!(err.framework(), Some(FRAMEWORK));
    server.verify().await;
}

#[tokio::test]
async fn test_srv_failure_is_lookup_error() {
    let resolver = resolver(StubSrv::new(Err("SERVFAIL".to_string())));
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, RelayError::Lookup { .. }), "got {:?}", err);
    assert!(err.to_string().contains("SERVFAIL"));
}

#[tokio::test]
async fn test_non_string_broker_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(connection_body(r#"{"dns":["a:1",9092]}"#))
        .mount(&server)
        .await;

    let resolver = resolver(StubSrv::port(server.address().port()));
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, RelayError::Parse { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_missing_dns_key_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(connection_body(r#"{"address":["10.0.0.5:9092"]}"#))
        .mount(&server)
        .await;

    let resolver = resolver(StubSrv::port(server.address().port()));
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, RelayError::Parse { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_empty_broker_entry_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(connection_body(r#"{"dns":["broker-0:9092",""]}"#))
        .mount(&server)
        .await;

    let resolver = resolver(StubSrv::port(server.address().port()));
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, RelayError::Parse { .. }), "got {:?}", err);
    assert_eq!(err.framework(), Some(FRAMEWORK));
}

#[tokio::test]
async fn test_empty_broker_list_is_lookup_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(connection_body(r#"{"dns":[]}"#))
        .mount(&server)
        .await;

    let resolver = resolver(StubSrv::port(server.address().port()));
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, RelayError::Lookup { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_scheduler_error_status_is_lookup_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let resolver = resolver(StubSrv::port(server.address().port()));
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, RelayError::Lookup { .. }), "got {:?}", err);
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_each_resolve_queries_scheduler_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(connection_body(r#"{"dns":["old-broker:9092"]}"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/connection"))
        .respond_with(connection_body(r#"{"dns":["new-broker:9092"]}"#))
        .mount(&server)
        .await;

    let srv = StubSrv::port(server.address().port());
    let resolver = resolver(Arc::clone(&srv));

    let first = resolver.resolve().await.unwrap();
    let second = resolver.resolve().await.unwrap();

    assert_eq!(first.as_slice(), ["old-broker:9092"]);
    assert_eq!(second.as_slice(), ["new-broker:9092"]);
    assert_eq!(srv.queried().len(), 2);
}
