//! Blocking twin of [`OutboundClient`](crate::client::OutboundClient).

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	client::{Endpoint, HostTable, UrlComposer, parse_as, parse_value},
	http::BlockingTransport,
	invoke::{Blocking, DispatchMode, RetryConfig, Timed},
	obs::{CallSpan, InvocationObserver},
	sign::{QueryParams, RequestSigner},
};

/// Outbound client that runs every attempt, and every retry delay, on the caller's thread.
#[derive(Clone)]
pub struct BlockingOutboundClient {
	transport: Arc<dyn BlockingTransport>,
	composer: UrlComposer,
	retry: RetryConfig,
	observer: Option<Arc<dyn InvocationObserver>>,
}
impl BlockingOutboundClient {
	/// Creates a client with the default retry policy and no signer.
	pub fn new(transport: Arc<dyn BlockingTransport>, hosts: HostTable) -> Self {
		Self {
			transport,
			composer: UrlComposer::new(hosts),
			retry: RetryConfig::default(),
			observer: None,
		}
	}

	/// Signs every signed endpoint with `signer`.
	pub fn with_signer(mut self, signer: Arc<RequestSigner>) -> Self {
		self.composer.set_signer(signer);

		self
	}

	/// Replaces the retry policy.
	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;

		self
	}

	/// Sends every invocation trace to `observer`.
	pub fn with_observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
		self.observer = Some(observer);

		self
	}

	/// Fetches `endpoint` and parses the body as JSON.
	pub fn call(&self, endpoint: &Endpoint, params: QueryParams) -> Result<Value> {
		let body = self.fetch(endpoint, params)?;

		Ok(parse_value(&body)?)
	}

	/// Fetches `endpoint` and deserializes the body into `T`.
	pub fn call_as<T>(&self, endpoint: &Endpoint, params: QueryParams) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.fetch(endpoint, params)?;

		Ok(parse_as(&body)?)
	}

	fn fetch(&self, endpoint: &Endpoint, params: QueryParams) -> Result<String> {
		let url = self.composer.compose(endpoint, params)?;
		let transport = &*self.transport;
		let url = &url;
		let mut timed = Timed::new(
			endpoint.template().to_owned(),
			Blocking(move || Ok::<_, Error>(transport.get(url)?.ensure_success()?.body)),
		);

		if let Some(observer) = &self.observer {
			timed = timed.with_observer(observer.clone());
		}

		let retrying = timed.retrying(self.retry.clone());

		CallSpan::new(endpoint.template(), DispatchMode::Sync).in_scope(|| retrying.call())
	}
}
impl Debug for BlockingOutboundClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BlockingOutboundClient")
			.field("composer", &self.composer)
			.field("retry", &self.retry)
			.finish_non_exhaustive()
	}
}
