//! Gateway-level error types and the closed [`ErrorKind`] tag set used by retry policies.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Closed set of failure categories attached to every error value.
///
/// Retry policies compare these tags instead of concrete error types, so the allow-list stays
/// independent of how a given failure was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Local configuration problem (missing keys, invalid bounds, bad templates).
	Config,
	/// Connection failure, timeout, or non-2xx upstream status.
	Network,
	/// Upstream body is neither plain nor callback-wrapped JSON.
	ResponseParse,
	/// Shared counter store failure.
	Storage,
	/// Caller presented invalid credentials.
	Authentication,
	/// Enclosing deadline elapsed or the client pool is shutting down.
	Cancelled,
}
impl ErrorKind {
	const ALL: [ErrorKind; 6] = [
		ErrorKind::Config,
		ErrorKind::Network,
		ErrorKind::ResponseParse,
		ErrorKind::Storage,
		ErrorKind::Authentication,
		ErrorKind::Cancelled,
	];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Config => "config",
			ErrorKind::Network => "network",
			ErrorKind::ResponseParse => "response_parse",
			ErrorKind::Storage => "storage",
			ErrorKind::Authentication => "authentication",
			ErrorKind::Cancelled => "cancelled",
		}
	}

	const fn bit(self) -> u8 {
		1 << self as u8
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Compact set of [`ErrorKind`] tags.
///
/// The default set contains only [`ErrorKind::Network`], matching the retry behavior of the
/// outbound client. [`ErrorKind::Cancelled`] can never be inserted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<ErrorKind>", into = "Vec<ErrorKind>")]
pub struct ErrorKindSet(u8);
impl ErrorKindSet {
	/// Returns a set with no kinds.
	pub const fn empty() -> Self {
		Self(0)
	}

	/// Returns a set containing only `kind`.
	pub const fn only(kind: ErrorKind) -> Self {
		Self::empty().with(kind)
	}

	/// Adds a kind to the set. Cancellation is silently ignored because it must always propagate.
	pub const fn with(self, kind: ErrorKind) -> Self {
		match kind {
			ErrorKind::Cancelled => self,
			_ => Self(self.0 | kind.bit()),
		}
	}

	/// Removes a kind from the set.
	pub const fn without(self, kind: ErrorKind) -> Self {
		Self(self.0 & !kind.bit())
	}

	/// Returns true if the set contains `kind`.
	pub const fn contains(self, kind: ErrorKind) -> bool {
		self.0 & kind.bit() != 0
	}

	/// Returns true when no kinds are present.
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Iterates over the contained kinds in declaration order.
	pub fn iter(self) -> impl Iterator<Item = ErrorKind> {
		ErrorKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
	}
}
impl Default for ErrorKindSet {
	fn default() -> Self {
		Self::only(ErrorKind::Network)
	}
}
impl Debug for ErrorKindSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(self.iter()).finish()
	}
}
impl FromIterator<ErrorKind> for ErrorKindSet {
	fn from_iter<I: IntoIterator<Item = ErrorKind>>(iter: I) -> Self {
		iter.into_iter().fold(Self::empty(), Self::with)
	}
}
impl From<Vec<ErrorKind>> for ErrorKindSet {
	fn from(kinds: Vec<ErrorKind>) -> Self {
		kinds.into_iter().collect()
	}
}
impl From<ErrorKindSet> for Vec<ErrorKind> {
	fn from(set: ErrorKindSet) -> Self {
		set.iter().collect()
	}
}

/// Exposes the [`ErrorKind`] tag of an error so retry policies can filter on it.
pub trait Classify {
	/// Returns the category tag for this error value.
	fn kind(&self) -> ErrorKind;
}

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Counter store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::limit::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Upstream transport failure; retryable by default.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Upstream body could not be decoded.
	#[error(transparent)]
	Response(#[from] ResponseError),

	/// Caller credentials were rejected.
	#[error("Invalid credentials: {reason}.")]
	InvalidCredentials {
		/// Human-readable rejection reason.
		reason: String,
	},
	/// Enclosing deadline elapsed before the operation finished.
	#[error("Operation was cancelled before it completed.")]
	Cancelled,
}
impl Classify for Error {
	fn kind(&self) -> ErrorKind {
		match self {
			Self::Storage(_) => ErrorKind::Storage,
			Self::Config(_) => ErrorKind::Config,
			Self::Transport(err) => err.kind(),
			Self::Response(_) => ErrorKind::ResponseParse,
			Self::InvalidCredentials { .. } => ErrorKind::Authentication,
			Self::Cancelled => ErrorKind::Cancelled,
		}
	}
}

/// Configuration and validation failures. These are meant to abort startup, not a request.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration document could not be decoded.
	#[error("Configuration could not be parsed.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Upstream host cannot be parsed.
	#[error("Upstream host `{host}` is invalid.")]
	InvalidHost {
		/// Host string that failed to parse.
		host: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},

	/// A signing credential is missing or empty.
	#[error("Signing credential `{field}` is missing.")]
	MissingSigningField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// Endpoint requires signing but no signer was configured.
	#[error("Endpoint `{endpoint}` requires signing but no signer is configured.")]
	SignerNotConfigured {
		/// Endpoint template that required signing.
		endpoint: String,
	},
	/// Retry attempts must be at least one.
	#[error("Retry attempts must be at least 1, got {attempts}.")]
	InvalidRetryAttempts {
		/// Rejected attempt count.
		attempts: u32,
	},
	/// Retry delay must not be negative.
	#[error("Retry delay must not be negative.")]
	NegativeRetryDelay,
	/// Retry delay exceeds the supported maximum.
	#[error("Retry delay must not exceed {max_ms} ms.")]
	RetryDelayTooLong {
		/// Largest accepted delay in milliseconds.
		max_ms: u64,
	},
	/// Rate limit must allow at least one request per window.
	#[error("Rate limit must allow at least one request per window.")]
	ZeroRateLimit,
	/// Rate limit window must be positive.
	#[error("Rate limit window must be positive.")]
	NonPositiveWindow,
	/// Rate limit window exceeds the supported maximum.
	#[error("Rate limit window must not exceed {max_secs} seconds.")]
	WindowTooLong {
		/// Largest accepted window in seconds.
		max_secs: i64,
	},
	/// Source tag is not present in the host table.
	#[error("Unknown upstream source `{tag}`.")]
	UnknownSource {
		/// Rejected source tag.
		tag: String,
	},
	/// Endpoint template references a parameter that was not supplied.
	#[error("Endpoint template `{template}` references missing parameter `{placeholder}`.")]
	UnresolvedPlaceholder {
		/// Template that failed to render.
		template: String,
		/// Missing parameter name.
		placeholder: String,
	},
	/// Endpoint template has unbalanced braces.
	#[error("Endpoint template `{template}` is malformed.")]
	MalformedTemplate {
		/// Template that failed to render.
		template: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, status, pool lifecycle).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Upstream could not be reached or answered with a non-2xx status.
	#[error("Upstream API request failed: {detail}.")]
	Network {
		/// Failure summary or a preview of the upstream error body.
		detail: String,
		/// HTTP status code, when a response was received.
		status: Option<u16>,
		/// Transport-specific failure, when available.
		#[source]
		source: Option<BoxError>,
	},
	/// Upstream did not answer within the configured timeout.
	#[error("Upstream API request timed out.")]
	Timeout,
	/// The client pool has begun shutting down and no longer accepts calls.
	#[error("Client pool is shut down.")]
	PoolClosed,
}
impl TransportError {
	const DETAIL_PREVIEW_LIMIT: usize = 256;

	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { detail: src.to_string(), status: None, source: Some(Box::new(src)) }
	}

	/// Builds a status failure carrying a preview of the upstream body.
	pub fn status(status: u16, body: &str) -> Self {
		let detail = if body.trim().is_empty() {
			format!("upstream answered with status {status}")
		} else {
			preview(body, Self::DETAIL_PREVIEW_LIMIT)
		};

		Self::Network { detail, status: Some(status), source: None }
	}

	/// Returns the upstream HTTP status, if one was received.
	pub fn http_status(&self) -> Option<u16> {
		match self {
			Self::Network { status, .. } => *status,
			_ => None,
		}
	}
}
impl Classify for TransportError {
	fn kind(&self) -> ErrorKind {
		match self {
			Self::PoolClosed => ErrorKind::Cancelled,
			_ => ErrorKind::Network,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			return Self::Timeout;
		}

		let status = e.status().map(|code| code.as_u16());

		Self::Network { detail: e.to_string(), status, source: Some(Box::new(e)) }
	}
}

/// Upstream body decoding failures. Never retried.
#[derive(Debug, ThisError)]
pub enum ResponseError {
	/// Body is not valid JSON for the requested shape, plain or enveloped.
	#[error("Upstream returned malformed JSON: {preview}")]
	Json {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// Leading slice of the offending body.
		preview: String,
	},
	/// A JSON value was decoded but trailing characters followed it.
	#[error("Upstream returned trailing characters after JSON: {preview}")]
	Trailing {
		/// Underlying parser failure.
		#[source]
		source: serde_json::Error,
		/// Leading slice of the offending body.
		preview: String,
	},
}

pub(crate) fn preview(body: &str, limit: usize) -> String {
	match body.char_indices().nth(limit) {
		Some((idx, _)) => format!("{}...", &body[..idx]),
		None => body.to_owned(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kind_set_never_contains_cancelled() {
		let set = ErrorKindSet::empty().with(ErrorKind::Network).with(ErrorKind::Cancelled);

		assert!(set.contains(ErrorKind::Network));
		assert!(!set.contains(ErrorKind::Cancelled));
		assert_eq!(set.iter().collect::<Vec<_>>(), vec![ErrorKind::Network]);
	}

	#[test]
	fn kind_set_serializes_as_list() {
		let set: ErrorKindSet = [ErrorKind::Storage, ErrorKind::Network].into_iter().collect();
		let payload = serde_json::to_string(&set).expect("Kind set should serialize to JSON.");

		assert_eq!(payload, "[\"network\",\"storage\"]");

		let round_trip: ErrorKindSet =
			serde_json::from_str(&payload).expect("Kind set should deserialize from JSON.");

		assert_eq!(round_trip, set);
		assert_eq!(ErrorKindSet::default(), ErrorKindSet::only(ErrorKind::Network));
	}

	#[test]
	fn errors_carry_expected_kinds() {
		assert_eq!(Error::from(TransportError::Timeout).kind(), ErrorKind::Network);
		assert_eq!(Error::from(TransportError::PoolClosed).kind(), ErrorKind::Cancelled);
		assert_eq!(Error::from(ConfigError::NegativeRetryDelay).kind(), ErrorKind::Config);
		assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
		assert_eq!(
			Error::InvalidCredentials { reason: "nope".into() }.kind(),
			ErrorKind::Authentication
		);
	}

	#[test]
	fn status_errors_preview_long_bodies() {
		let body = "x".repeat(400);
		let err = TransportError::status(503, &body);

		assert_eq!(err.http_status(), Some(503));
		assert!(err.to_string().contains("..."));

		let empty = TransportError::status(500, "  ");

		assert!(empty.to_string().contains("status 500"));
	}
}
