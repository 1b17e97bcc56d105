//! Outbound upstream clients: signing, timed retries, and body parsing around one GET.
//!
//! [`OutboundClient`] composes the pieces in a fixed order for every call:
//!
//! 1. Resolve the endpoint's source tag in the [`HostTable`].
//! 2. Sign the parameters with the [`RequestSigner`], unless the endpoint is unsigned.
//! 3. Issue the GET through `Retrying(Timed(transport))`; non-2xx statuses count as network
//!    failures, so they are retried under the default policy.
//! 4. Parse the body as JSON, falling back to a callback envelope.
//!
//! The blocking twin lives in [`blocking`] and shares everything except the transport and the
//! delay suspension.

#[cfg(feature = "blocking")] pub mod blocking;
pub mod hosts;
pub mod parse;

#[cfg(feature = "blocking")] pub use blocking::BlockingOutboundClient;
pub use hosts::*;
pub use parse::*;

// std
use std::borrow::Cow;
// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant as TokioInstant;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::UpstreamTransport,
	invoke::{DispatchMode, RetryConfig, Retrying, Scheduled, Timed},
	obs::{CallSpan, InvocationObserver},
	sign::{self, QueryParams, RequestSigner},
};

/// Upstream endpoint: a path template, its source tag, and whether it must be signed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
	template: Cow<'static, str>,
	source: Option<Cow<'static, str>>,
	signed: bool,
}
impl Endpoint {
	/// Endpoint whose parameters are signed before sending.
	pub fn signed(template: impl Into<Cow<'static, str>>) -> Self {
		Self { template: template.into(), source: None, signed: true }
	}

	/// Endpoint sent with the caller's parameters only.
	pub fn unsigned(template: impl Into<Cow<'static, str>>) -> Self {
		Self { template: template.into(), source: None, signed: false }
	}

	/// Targets the host registered under `source` instead of the default tag.
	pub fn on(mut self, source: impl Into<Cow<'static, str>>) -> Self {
		self.source = Some(source.into());

		self
	}

	/// Path template with `{name}` placeholders.
	pub fn template(&self) -> &str {
		&self.template
	}

	/// Source tag, if one was set.
	pub fn source(&self) -> Option<&str> {
		self.source.as_deref()
	}

	/// Returns true if the parameters are signed.
	pub fn is_signed(&self) -> bool {
		self.signed
	}
}

// Shared by the async and blocking clients.
#[derive(Clone, Debug)]
pub(crate) struct UrlComposer {
	hosts: HostTable,
	signer: Option<Arc<RequestSigner>>,
}
impl UrlComposer {
	pub(crate) fn new(hosts: HostTable) -> Self {
		Self { hosts, signer: None }
	}

	pub(crate) fn set_signer(&mut self, signer: Arc<RequestSigner>) {
		self.signer = Some(signer);
	}

	pub(crate) fn compose(&self, endpoint: &Endpoint, params: QueryParams) -> Result<Url, ConfigError> {
		let base = self.hosts.resolve(endpoint.source())?;

		if !endpoint.is_signed() {
			return sign::join(base, endpoint.template(), &params);
		}

		let signer = self.signer.as_ref().ok_or_else(|| ConfigError::SignerNotConfigured {
			endpoint: endpoint.template().to_owned(),
		})?;

		signer.sign(base, endpoint.template(), params)?.url()
	}
}

/// Async outbound client built on an [`UpstreamTransport`].
#[derive(Clone)]
pub struct OutboundClient {
	transport: Arc<dyn UpstreamTransport>,
	composer: UrlComposer,
	retry: RetryConfig,
	observer: Option<Arc<dyn InvocationObserver>>,
}
impl OutboundClient {
	/// Creates a client with the default retry policy and no signer.
	pub fn new(transport: Arc<dyn UpstreamTransport>, hosts: HostTable) -> Self {
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

	/// Returns the active retry policy.
	pub fn retry(&self) -> &RetryConfig {
		&self.retry
	}

	/// Builds the final URL for `endpoint` without sending anything.
	pub fn url_for(&self, endpoint: &Endpoint, params: QueryParams) -> Result<Url> {
		Ok(self.composer.compose(endpoint, params)?)
	}

	/// Fetches `endpoint` and parses the body as JSON.
	pub async fn call(&self, endpoint: &Endpoint, params: QueryParams) -> Result<Value> {
		let body = self.fetch(endpoint, params, None).await?;

		Ok(parse_value(&body)?)
	}

	/// Fetches `endpoint` and deserializes the body into `T`.
	pub async fn call_as<T>(&self, endpoint: &Endpoint, params: QueryParams) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.fetch(endpoint, params, None).await?;

		Ok(parse_as(&body)?)
	}

	/// Like [`OutboundClient::call`], but aborts with [`Error::Cancelled`] once `deadline` passes.
	pub async fn call_until(
		&self,
		endpoint: &Endpoint,
		params: QueryParams,
		deadline: TokioInstant,
	) -> Result<Value> {
		let body = self.fetch(endpoint, params, Some(deadline)).await?;

		Ok(parse_value(&body)?)
	}

	async fn fetch(
		&self,
		endpoint: &Endpoint,
		params: QueryParams,
		deadline: Option<TokioInstant>,
	) -> Result<String> {
		let url = self.composer.compose(endpoint, params)?;
		let retrying = self.retrying(endpoint, &url);
		let span = CallSpan::new(endpoint.template(), DispatchMode::Scheduled);

		match deadline {
			Some(deadline) => span.instrument(retrying.call_until(deadline)).await,
			None => span.instrument(retrying.call()).await,
		}
	}

	fn retrying<'a>(
		&'a self,
		endpoint: &Endpoint,
		url: &'a Url,
	) -> Retrying<Scheduled<impl Fn() -> TransportAttempt<'a> + 'a>> {
		let transport = &*self.transport;
		let mut timed = Timed::new(
			endpoint.template().to_owned(),
			Scheduled(move || -> TransportAttempt<'a> {
				Box::pin(async move {
					Ok::<_, Error>(transport.get(url).await?.ensure_success()?.body)
				})
			}),
		);

		if let Some(observer) = &self.observer {
			timed = timed.with_observer(observer.clone());
		}

		timed.retrying(self.retry.clone())
	}
}
impl Debug for OutboundClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OutboundClient")
			.field("composer", &self.composer)
			.field("retry", &self.retry)
			.finish_non_exhaustive()
	}
}

type TransportAttempt<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a + Send>>;
