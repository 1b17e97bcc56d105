//! Transport primitives for upstream GETs and the explicitly owned client pool.
//!
//! [`UpstreamTransport`] and [`BlockingTransport`] are the only seams between the outbound
//! clients and an HTTP stack. The reqwest-backed [`ClientPool`] replaces any process-global
//! client registry: the entry point opens it, hands `Arc<ClientPool>` to collaborators, and
//! shuts it down with a grace period that lets in-flight calls drain.

// std
#[cfg(feature = "reqwest")] use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
// crates.io
#[cfg(feature = "reqwest")] use reqwest::{
	Proxy,
	header::{COOKIE, HeaderMap, HeaderValue},
};
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::{_prelude::*, auth::Secret, error::TransportError, obs};

/// Boxed future returned by [`UpstreamTransport::get`].
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Asynchronous HTTP GET transport.
pub trait UpstreamTransport
where
	Self: 'static + Send + Sync,
{
	/// Issues one GET and returns the raw response, whatever its status.
	fn get<'a>(&'a self, url: &'a Url) -> TransportFuture<'a, UpstreamResponse>;
}

/// Blocking HTTP GET transport.
pub trait BlockingTransport
where
	Self: 'static + Send + Sync,
{
	/// Issues one GET on the current thread and returns the raw response.
	fn get(&self, url: &Url) -> Result<UpstreamResponse, TransportError>;
}

/// Status and body of one upstream response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamResponse {
	/// HTTP status code.
	pub status: u16,
	/// Decoded body text.
	pub body: String,
}
impl UpstreamResponse {
	/// Creates a response from its status and body.
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self { status, body: body.into() }
	}

	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Converts non-2xx responses into [`TransportError::Network`] carrying a body preview.
	pub fn ensure_success(self) -> Result<Self, TransportError> {
		if self.is_success() { Ok(self) } else { Err(TransportError::status(self.status, &self.body)) }
	}
}

/// Connection settings shared by the async and blocking transports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetSettings {
	/// Per-request timeout.
	pub timeout: StdDuration,
	/// `User-Agent` header sent upstream.
	pub user_agent: String,
	/// How long [`ClientPool::shutdown`] waits for in-flight calls.
	pub shutdown_grace: StdDuration,
	/// Sent as the `Cookie` header on every upstream request.
	pub cookie: Option<Secret>,
	/// Proxy URL every upstream request goes through.
	pub proxy: Option<String>,
}
impl NetSettings {
	/// Default per-request timeout.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(5);
	/// Default shutdown grace period.
	pub const DEFAULT_SHUTDOWN_GRACE: StdDuration = StdDuration::from_secs(5);

	/// Sends `cookie` with every request.
	pub fn with_cookie(mut self, cookie: impl Into<Secret>) -> Self {
		self.cookie = Some(cookie.into());

		self
	}

	/// Routes every request through `proxy`.
	pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
		self.proxy = Some(proxy.into());

		self
	}

	#[cfg(feature = "reqwest")]
	fn default_headers(&self) -> Result<HeaderMap, ConfigError> {
		let mut headers = HeaderMap::new();

		if let Some(cookie) = self.cookie.as_ref().filter(|cookie| !cookie.is_blank()) {
			let mut value = HeaderValue::from_str(cookie.expose())
				.map_err(ConfigError::http_client_build)?;

			value.set_sensitive(true);
			headers.insert(COOKIE, value);
		}

		Ok(headers)
	}

	#[cfg(feature = "reqwest")]
	fn proxy(&self) -> Result<Option<Proxy>, ConfigError> {
		Ok(self.proxy.as_deref().map(Proxy::all).transpose()?)
	}
}
impl Default for NetSettings {
	fn default() -> Self {
		Self {
			timeout: Self::DEFAULT_TIMEOUT,
			user_agent: default_user_agent(),
			shutdown_grace: Self::DEFAULT_SHUTDOWN_GRACE,
			cookie: None,
			proxy: None,
		}
	}
}

/// Summary returned by [`ClientPool::shutdown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
	/// Calls still in flight when the grace period elapsed.
	pub abandoned: usize,
}
impl ShutdownReport {
	/// Returns true if every call finished within the grace period.
	pub fn drained(&self) -> bool {
		self.abandoned == 0
	}
}

/// Owned pool around one shared reqwest client with an explicit shutdown lifecycle.
///
/// Every call holds a [`PoolLease`] for its whole duration. Once shutdown begins, new leases are
/// refused with [`TransportError::PoolClosed`].
#[cfg(feature = "reqwest")]
#[derive(Debug)]
pub struct ClientPool {
	client: ReqwestClient,
	gate: Arc<AsyncRwLock<()>>,
	closed: AtomicBool,
	in_flight: Arc<AtomicUsize>,
	shutdown_grace: StdDuration,
}
#[cfg(feature = "reqwest")]
impl ClientPool {
	/// Builds the shared client from `settings`.
	pub fn open(settings: &NetSettings) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.timeout(settings.timeout)
			.user_agent(settings.user_agent.as_str())
			.default_headers(settings.default_headers()?);

		if let Some(proxy) = settings.proxy()? {
			builder = builder.proxy(proxy);
		}

		Ok(Self::with_client(builder.build()?).with_shutdown_grace(settings.shutdown_grace))
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self {
			client,
			gate: Arc::new(AsyncRwLock::new(())),
			closed: AtomicBool::new(false),
			in_flight: Arc::new(AtomicUsize::new(0)),
			shutdown_grace: NetSettings::DEFAULT_SHUTDOWN_GRACE,
		}
	}

	/// Overrides the grace period used by [`ClientPool::shutdown_graceful`].
	pub fn with_shutdown_grace(mut self, grace: StdDuration) -> Self {
		self.shutdown_grace = grace;

		self
	}

	/// Returns the shared reqwest client.
	pub fn client(&self) -> &ReqwestClient {
		&self.client
	}

	/// Number of calls currently holding a lease.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Returns true once shutdown has begun.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Marks one call in flight until the returned lease drops.
	pub fn lease(&self) -> Result<PoolLease, TransportError> {
		if self.is_closed() {
			return Err(TransportError::PoolClosed);
		}

		let guard = self.gate.try_read_arc().ok_or(TransportError::PoolClosed)?;

		self.in_flight.fetch_add(1, Ordering::AcqRel);

		Ok(PoolLease { _guard: guard, in_flight: self.in_flight.clone() })
	}

	/// Stops new leases and waits up to `grace` for in-flight calls to finish.
	pub async fn shutdown(&self, grace: StdDuration) -> ShutdownReport {
		self.closed.store(true, Ordering::Release);

		obs::emit_shutdown(self.in_flight());

		match tokio::time::timeout(grace, self.gate.write()).await {
			Ok(_drained) => ShutdownReport { abandoned: 0 },
			Err(_) => {
				let abandoned = self.in_flight();

				obs::emit_abandoned(abandoned);

				ShutdownReport { abandoned }
			},
		}
	}

	/// Shuts down using the configured grace period.
	pub async fn shutdown_graceful(&self) -> ShutdownReport {
		self.shutdown(self.shutdown_grace).await
	}
}
#[cfg(feature = "reqwest")]
impl UpstreamTransport for ClientPool {
	fn get<'a>(&'a self, url: &'a Url) -> TransportFuture<'a, UpstreamResponse> {
		Box::pin(async move {
			let _lease = self.lease()?;

			obs::emit_request(url);

			let response = self.client.get(url.clone()).send().await?;
			let status = response.status().as_u16();
			let body = response.text().await?;

			obs::emit_response(url, status, body.len());

			Ok(UpstreamResponse { status, body })
		})
	}
}

/// In-flight marker held for the duration of one pooled call.
#[cfg(feature = "reqwest")]
pub struct PoolLease {
	_guard: async_lock::RwLockReadGuardArc<()>,
	in_flight: Arc<AtomicUsize>,
}
#[cfg(feature = "reqwest")]
impl Drop for PoolLease {
	fn drop(&mut self) {
		self.in_flight.fetch_sub(1, Ordering::AcqRel);
	}
}
#[cfg(feature = "reqwest")]
impl Debug for PoolLease {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("PoolLease(..)")
	}
}

/// Blocking twin of [`ClientPool`] built on `reqwest::blocking`.
///
/// Must not be created or dropped inside an async runtime.
#[cfg(feature = "blocking")]
#[derive(Clone, Debug)]
pub struct BlockingHttpClient(reqwest::blocking::Client);
#[cfg(feature = "blocking")]
impl BlockingHttpClient {
	/// Builds the client from `settings`.
	pub fn open(settings: &NetSettings) -> Result<Self, ConfigError> {
		let mut builder = reqwest::blocking::Client::builder()
			.timeout(settings.timeout)
			.user_agent(settings.user_agent.as_str())
			.default_headers(settings.default_headers()?);

		if let Some(proxy) = settings.proxy()? {
			builder = builder.proxy(proxy);
		}

		Ok(Self(builder.build()?))
	}

	/// Wraps an existing blocking client.
	pub fn with_client(client: reqwest::blocking::Client) -> Self {
		Self(client)
	}
}
#[cfg(feature = "blocking")]
impl BlockingTransport for BlockingHttpClient {
	fn get(&self, url: &Url) -> Result<UpstreamResponse, TransportError> {
		obs::emit_request(url);

		let response = self.0.get(url.clone()).send()?;
		let status = response.status().as_u16();
		let body = response.text()?;

		obs::emit_response(url, status, body.len());

		Ok(UpstreamResponse { status, body })
	}
}

/// Default `User-Agent` header value.
pub fn default_user_agent() -> String {
	concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned()
}
