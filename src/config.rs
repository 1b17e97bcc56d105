//! Serde-backed gateway configuration with fail-fast validation.
//!
//! Every section has defaults, so an empty document (`{}`) is a valid configuration that signs
//! nothing, rate limits nothing, and lets every caller through. Typed accessors turn the raw
//! sections into validated runtime values and are the only place configuration errors surface.

// self
use crate::{
	_prelude::*,
	auth::{BasicAuthenticator, BasicCredentials, Secret},
	client::HostTable,
	error::{ConfigError, ErrorKindSet},
	http::{NetSettings, default_user_agent},
	invoke::RetryConfig,
	limit::RateLimitSettings,
	sign::SigningCredentials,
};

/// Root gateway configuration document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	/// Upstream signing keys; `None` disables signed endpoints.
	pub signing: Option<SigningCredentials>,
	/// Inbound rate limit.
	pub limit: LimitSection,
	/// Outbound retry policy.
	pub retry: RetrySection,
	/// Outbound HTTP settings.
	pub net: NetSection,
	/// Inbound HTTP Basic authorization.
	pub authorization: AuthorizationSection,
	/// Host overrides applied on top of the built-in host table, keyed by source tag.
	pub hosts: BTreeMap<String, String>,
}
impl GatewayConfig {
	/// Parses a JSON document, reporting the path of the first invalid field.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut de).map_err(|source| ConfigError::Parse { source })
	}

	/// Runs every accessor once so invalid settings abort startup.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.signing_credentials()?;
		self.rate_limit_settings()?;
		self.retry_config()?;
		self.host_table()?;

		Ok(())
	}

	/// Returns validated signing credentials, if signing is configured.
	pub fn signing_credentials(&self) -> Result<Option<&SigningCredentials>, ConfigError> {
		match &self.signing {
			Some(credentials) => {
				credentials.validate()?;

				Ok(Some(credentials))
			},
			None => Ok(None),
		}
	}

	/// Returns validated limiter settings.
	pub fn rate_limit_settings(&self) -> Result<RateLimitSettings, ConfigError> {
		if !self.limit.enabled {
			return Ok(RateLimitSettings::disabled());
		}

		let interval = Duration::seconds(i64::try_from(self.limit.interval_secs).unwrap_or(i64::MAX));

		RateLimitSettings::new(self.limit.max_requests, interval)
	}

	/// Returns the validated retry policy.
	pub fn retry_config(&self) -> Result<RetryConfig, ConfigError> {
		let delay = Duration::milliseconds(i64::try_from(self.retry.delay_ms).unwrap_or(i64::MAX));

		RetryConfig::new(self.retry.attempts, delay, self.retry.retryable)
	}

	/// Returns outbound HTTP settings.
	pub fn net_settings(&self) -> NetSettings {
		NetSettings {
			timeout: StdDuration::from_millis(self.net.timeout_ms),
			user_agent: self.net.user_agent.clone(),
			shutdown_grace: StdDuration::from_millis(self.net.shutdown_grace_ms),
			cookie: self.net.cookie.clone(),
			proxy: self.net.proxy.clone(),
		}
	}

	/// Returns the built-in host table with this document's overrides applied.
	pub fn host_table(&self) -> Result<HostTable, ConfigError> {
		self.hosts
			.iter()
			.try_fold(HostTable::bilibili()?, |table, (tag, host)| table.with_host(tag.clone(), host))
	}

	/// Returns the inbound authenticator.
	pub fn authenticator(&self) -> BasicAuthenticator {
		if self.authorization.enabled {
			BasicAuthenticator::new(self.authorization.allowed.clone())
		} else {
			BasicAuthenticator::disabled()
		}
	}
}

/// `limit` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSection {
	/// Whether inbound requests are counted.
	pub enabled: bool,
	/// Requests allowed per window.
	pub max_requests: u64,
	/// Window length in seconds.
	pub interval_secs: u64,
}
impl Default for LimitSection {
	fn default() -> Self {
		Self { enabled: false, max_requests: 60, interval_secs: 60 }
	}
}

/// `retry` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
	/// Maximum attempts per call, including the first.
	pub attempts: u32,
	/// Delay between attempts in milliseconds.
	pub delay_ms: u64,
	/// Error kinds that trigger another attempt.
	pub retryable: ErrorKindSet,
}
impl Default for RetrySection {
	fn default() -> Self {
		Self {
			attempts: RetryConfig::DEFAULT_ATTEMPTS,
			delay_ms: 100,
			retryable: ErrorKindSet::default(),
		}
	}
}

/// `net` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetSection {
	/// Per-request timeout in milliseconds.
	pub timeout_ms: u64,
	/// `User-Agent` header sent upstream.
	pub user_agent: String,
	/// Shutdown grace period in milliseconds.
	pub shutdown_grace_ms: u64,
	/// `Cookie` header sent upstream, such as a logged-in `SESSDATA`.
	pub cookie: Option<Secret>,
	/// Proxy URL for upstream traffic.
	pub proxy: Option<String>,
}
impl Default for NetSection {
	fn default() -> Self {
		Self {
			timeout_ms: 5_000,
			user_agent: default_user_agent(),
			shutdown_grace_ms: 5_000,
			cookie: None,
			proxy: None,
		}
	}
}

/// `authorization` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationSection {
	/// Whether inbound requests must present HTTP Basic credentials.
	pub enabled: bool,
	/// Accepted credential pairs.
	pub allowed: Vec<BasicCredentials>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ErrorKind;

	#[test]
	fn empty_document_uses_defaults() {
		let config = GatewayConfig::from_json("{}").expect("Empty config should parse.");

		config.validate().expect("Default config should validate.");

		assert!(config.signing_credentials().expect("No signing is valid.").is_none());
		assert!(!config.rate_limit_settings().expect("Disabled limit is valid.").enabled());
		assert_eq!(config.retry_config().expect("Default retry is valid."), RetryConfig::default());
		assert_eq!(config.net_settings(), NetSettings::default());
		assert!(!config.authenticator().is_enabled());
	}

	#[test]
	fn full_document_round_trips_into_runtime_values() {
		let config = GatewayConfig::from_json(
			r#"{
				"signing": {"access_key": "ak", "app_key": "appk", "secret": "s"},
				"limit": {"enabled": true, "max_requests": 3, "interval_secs": 60},
				"retry": {"attempts": 5, "delay_ms": 20, "retryable": ["network", "storage"]},
				"net": {"timeout_ms": 1500, "cookie": "SESSDATA=abc", "proxy": "http://127.0.0.1:7890"},
				"authorization": {"enabled": true, "allowed": [{"username": "u", "password": "p"}]},
				"hosts": {"app": "http://127.0.0.1:8080"}
			}"#,
		)
		.expect("Full config should parse.");
		let signing = config
			.signing_credentials()
			.expect("Signing should validate.")
			.expect("Signing should be configured.");
		let limit = config.rate_limit_settings().expect("Limit should validate.");
		let retry = config.retry_config().expect("Retry should validate.");
		let hosts = config.host_table().expect("Hosts should validate.");

		assert_eq!(signing.fixed_defaults.get("build"), Some("507000"));
		assert_eq!(format!("{:?}", signing.secret), "Secret(\"<redacted>\")");
		assert_eq!(limit.max_requests(), 3);
		assert_eq!(limit.interval(), Duration::seconds(60));
		assert_eq!(retry.max_attempts(), 5);
		assert!(retry.retryable().contains(ErrorKind::Storage));
		let net = config.net_settings();

		assert_eq!(net.timeout, StdDuration::from_millis(1_500));
		assert_eq!(net.cookie.as_ref().map(Secret::expose), Some("SESSDATA=abc"));
		assert_eq!(net.proxy.as_deref(), Some("http://127.0.0.1:7890"));
		assert!(!format!("{config:?}").contains("SESSDATA"));
		assert_eq!(
			hosts.resolve(None).expect("Default tag should resolve.").as_str(),
			"http://127.0.0.1:8080/"
		);
		assert!(config.authenticator().is_enabled());
	}

	#[test]
	fn invalid_values_fail_fast() {
		let err = GatewayConfig::from_json(r#"{"retry": {"attempts": "three"}}"#)
			.expect_err("Wrong type should fail.");

		match err {
			ConfigError::Parse { source } => assert_eq!(source.path().to_string(), "retry.attempts"),
			other => panic!("Unexpected error: {other:?}"),
		}

		let zero_attempts =
			GatewayConfig::from_json(r#"{"retry": {"attempts": 0}}"#).expect("Config should parse.");

		assert!(matches!(zero_attempts.validate(), Err(ConfigError::InvalidRetryAttempts { .. })));

		let blank_secret = GatewayConfig::from_json(
			r#"{"signing": {"access_key": "ak", "app_key": "appk", "secret": ""}}"#,
		)
		.expect("Config should parse.");

		assert!(matches!(
			blank_secret.validate(),
			Err(ConfigError::MissingSigningField { field: "secret" })
		));

		let zero_window = GatewayConfig::from_json(
			r#"{"limit": {"enabled": true, "max_requests": 1, "interval_secs": 0}}"#,
		)
		.expect("Config should parse.");

		assert!(matches!(zero_window.validate(), Err(ConfigError::NonPositiveWindow)));
	}

	#[test]
	fn out_of_range_durations_fail_validation() {
		let huge_window = GatewayConfig::from_json(
			r#"{"limit": {"enabled": true, "max_requests": 1, "interval_secs": 9223372036854775807}}"#,
		)
		.expect("Config should parse.");

		assert!(matches!(huge_window.validate(), Err(ConfigError::WindowTooLong { .. })));

		let huge_delay =
			GatewayConfig::from_json(r#"{"retry": {"delay_ms": 18446744073709551615}}"#)
				.expect("Config should parse.");

		assert!(matches!(huge_delay.retry_config(), Err(ConfigError::RetryDelayTooLong { .. })));
	}
}
