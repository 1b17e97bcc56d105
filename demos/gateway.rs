//! Demonstrates wiring a gateway core from JSON configuration, admitting inbound callers, and
//! issuing a signed upstream call against a local mock host.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use upstream_guard::{
	auth::BasicCredentials,
	client::Endpoint,
	config::GatewayConfig,
	gateway::GatewayCore,
	sign::QueryParams,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let view_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/x/v2/view").query_param_exists("sign");
			then.status(200).body("cb({\"code\":0,\"data\":{\"aid\":170001,\"title\":\"demo\"}})");
		})
		.await;
	let config = GatewayConfig::from_json(&format!(
		r#"{{
			"signing": {{ "access_key": "demo-access", "app_key": "demo-app", "secret": "demo-secret" }},
			"limit": {{ "enabled": true, "max_requests": 2, "interval_secs": 60 }},
			"retry": {{ "attempts": 3, "delay_ms": 50 }},
			"authorization": {{
				"enabled": true,
				"allowed": [{{ "username": "demo", "password": "hunter2" }}]
			}},
			"hosts": {{ "app": "{}" }}
		}}"#,
		server.base_url()
	))?;
	let core = GatewayCore::open_in_memory(&config)?;
	let header = BasicCredentials::new("demo", "hunter2").to_header();

	for attempt in 1..=3 {
		match core.admit("127.0.0.1", Some(&header)).await {
			Ok(user) => println!("request {attempt}: admitted as {user:?}"),
			Err(rejection) => println!(
				"request {attempt}: rejected with {} {}",
				rejection.status_code(),
				serde_json::to_string(&rejection.to_body())?
			),
		}
	}

	let endpoint = Endpoint::signed("x/v2/view");
	let params = QueryParams::new().with("aid", 170_001);

	println!("signed url: {}", core.client().url_for(&endpoint, params.clone())?);

	let value = core.client().call(&endpoint, params).await?;

	println!("upstream reply: {value}");

	view_mock.assert_async().await;

	let report = core.shutdown().await;

	println!("shutdown drained: {}", report.drained());

	Ok(())
}
