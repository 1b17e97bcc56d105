#![cfg(feature = "reqwest")]

// self
use upstream_guard::{
	_preludet::*,
	auth::BasicCredentials,
	boundary::{ErrorBody, Rejection},
	config::GatewayConfig,
	gateway::GatewayCore,
	limit::MemoryCounterStore,
};

const CONFIG: &str = r#"{
	"limit": { "enabled": true, "max_requests": 2, "interval_secs": 60 },
	"authorization": {
		"enabled": true,
		"allowed": [{ "username": "alice", "password": "wonderland" }]
	}
}"#;

fn open_core() -> GatewayCore {
	let config = GatewayConfig::from_json(CONFIG).expect("Config fixture should parse.");
	let store = Arc::new(MemoryCounterStore::with_clock(Arc::new(fixture_clock())));

	GatewayCore::open(&config, store).expect("Gateway core should open.")
}

fn alice() -> String {
	BasicCredentials::new("alice", "wonderland").to_header()
}

#[tokio::test]
async fn authorized_callers_are_admitted_until_the_limit() {
	let core = open_core();
	let header = alice();

	for _ in 0..2 {
		let username =
			core.admit("10.0.0.7", Some(&header)).await.expect("Caller should be admitted.");

		assert_eq!(username.as_deref(), Some("alice"));
	}

	let rejection =
		core.admit("10.0.0.7", Some(&header)).await.expect_err("Third call should be limited.");

	assert_eq!(rejection.status_code(), 429);

	let body = rejection.to_body();

	assert_eq!(body.code, 429);
	assert_eq!(body.detail, "Rate limit reached");
	assert_eq!(body.headers.get("Retry-After").map(String::as_str), Some("60"));

	let other = core.admit("10.0.0.8", Some(&header)).await;

	assert!(other.is_ok());
}

#[tokio::test]
async fn bad_credentials_are_rejected_before_counting() {
	let core = open_core();
	let wrong = BasicCredentials::new("alice", "looking-glass").to_header();

	for header in [None, Some("Bearer token"), Some(wrong.as_str())] {
		let rejection = core.admit("10.0.0.9", header).await.expect_err("Caller should be rejected.");

		assert_eq!(rejection.status_code(), 401);

		let body = rejection.to_body();

		assert_eq!(body.headers.get("WWW-Authenticate").map(String::as_str), Some("Basic"));
		assert!(matches!(rejection, Rejection::Error(Error::InvalidCredentials { .. })));
	}

	let header = alice();

	core.admit("10.0.0.9", Some(&header)).await.expect("First valid call should be admitted.");
	core.admit("10.0.0.9", Some(&header)).await.expect("Second valid call should be admitted.");
}

#[tokio::test]
async fn shutdown_reports_a_drained_pool() {
	let core = open_core();
	let report = core.shutdown().await;

	assert!(report.drained());
	assert!(core.pool().is_closed());
}

#[test]
fn error_bodies_serialize_for_handlers() {
	let body = ErrorBody::from_error(&Error::Cancelled).with_time(fixture_clock_now());
	let json = serde_json::to_value(&body).expect("Error body should serialize.");

	assert_eq!(json["code"], 504);
	assert_eq!(json["time"], "2023-11-14T22:13:20Z");
}

fn fixture_clock_now() -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp(FIXTURE_UNIX).expect("Fixture timestamp should be valid.")
}
