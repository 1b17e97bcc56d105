//! Process-level wiring: one owned client pool, the outbound client, and the inbound guards.

// self
use crate::{
	_prelude::*,
	auth::BasicAuthenticator,
	boundary::Rejection,
	client::OutboundClient,
	config::GatewayConfig,
	http::{ClientPool, ShutdownReport},
	limit::{CounterStore, MemoryCounterStore, RateLimitKey, RateLimiter},
	sign::RequestSigner,
};

/// Everything a route handler needs, built once at startup from a validated [`GatewayConfig`].
///
/// The core owns the [`ClientPool`]; call [`GatewayCore::shutdown`] before exiting so in-flight
/// upstream calls get their grace period.
#[derive(Debug)]
pub struct GatewayCore {
	pool: Arc<ClientPool>,
	client: OutboundClient,
	limiter: RateLimiter,
	authenticator: BasicAuthenticator,
}
impl GatewayCore {
	/// Validates `config` and opens the pool, using `store` for rate limit counters.
	pub fn open(config: &GatewayConfig, store: Arc<dyn CounterStore>) -> Result<Self> {
		config.validate()?;

		let pool = Arc::new(ClientPool::open(&config.net_settings())?);
		let mut client = OutboundClient::new(pool.clone(), config.host_table()?)
			.with_retry(config.retry_config()?);

		if let Some(credentials) = config.signing_credentials()? {
			client = client.with_signer(Arc::new(RequestSigner::new(credentials.clone())?));
		}

		Ok(Self {
			pool,
			client,
			limiter: RateLimiter::new(store, config.rate_limit_settings()?),
			authenticator: config.authenticator(),
		})
	}

	/// Like [`GatewayCore::open`] with an in-process counter store.
	pub fn open_in_memory(config: &GatewayConfig) -> Result<Self> {
		Self::open(config, Arc::new(MemoryCounterStore::new()))
	}

	/// Replaces the outbound client, keeping the pool and guards.
	pub fn with_client(mut self, client: OutboundClient) -> Self {
		self.client = client;

		self
	}

	/// Outbound client bound to the owned pool.
	pub fn client(&self) -> &OutboundClient {
		&self.client
	}

	/// Owned client pool.
	pub fn pool(&self) -> &Arc<ClientPool> {
		&self.pool
	}

	/// Inbound rate limiter.
	pub fn limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	/// Inbound authenticator.
	pub fn authenticator(&self) -> &BasicAuthenticator {
		&self.authenticator
	}

	/// Runs the inbound guards in order: Basic authorization first, then the rate limit.
	///
	/// Returns the authenticated username, if authorization is enabled.
	pub async fn admit(
		&self,
		client_host: &str,
		authorization: Option<&str>,
	) -> Result<Option<String>, Rejection> {
		let username = self.authenticator.authorize_header(authorization)?;
		let key = RateLimitKey::from_client(client_host);
		let decision = self.limiter.check(key.as_str()).await?;

		match Rejection::from_decision(decision) {
			Some(rejection) => Err(rejection),
			None => Ok(username),
		}
	}

	/// Stops the pool and waits for in-flight calls using the configured grace period.
	pub async fn shutdown(&self) -> ShutdownReport {
		self.pool.shutdown_graceful().await
	}
}
