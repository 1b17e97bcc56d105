//! Maps gateway failures and rate-limit denials onto HTTP status codes and JSON error bodies.
//!
//! The crate does not depend on a web framework; handlers copy [`ErrorBody::code`] and
//! [`ErrorBody::headers`] into whatever response type they use.

// self
use crate::{
	_prelude::*,
	auth::WWW_AUTHENTICATE_BASIC,
	error::{Classify, ErrorKind},
	limit::{RateLimitDecision, RetryDirective},
};

const RATE_LIMIT_DETAIL: &str = "Rate limit reached";

impl Error {
	/// HTTP status code a handler should answer with for this failure.
	pub fn status_code(&self) -> u16 {
		match self.kind() {
			ErrorKind::Network | ErrorKind::ResponseParse => 502,
			ErrorKind::Authentication => 401,
			ErrorKind::Config | ErrorKind::Storage => 500,
			ErrorKind::Cancelled => 504,
		}
	}
}

/// JSON error payload returned to gateway callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// HTTP status code, always in `400..=599`.
	pub code: u16,
	/// Human-readable failure summary.
	pub detail: String,
	/// Request URL, when the handler knows it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<Url>,
	/// Instant the failure was reported.
	#[serde(with = "time::serde::rfc3339")]
	pub time: OffsetDateTime,
	/// Headers the handler must add to the response.
	#[serde(default)]
	pub headers: BTreeMap<String, String>,
}
impl ErrorBody {
	/// Builds a body with an explicit code and detail.
	pub fn new(code: u16, detail: impl Into<String>) -> Self {
		Self {
			code,
			detail: detail.into(),
			url: None,
			time: OffsetDateTime::now_utc(),
			headers: BTreeMap::new(),
		}
	}

	/// Builds the body for `error`.
	///
	/// Configuration and storage failures are reported generically so internal details stay
	/// out of responses.
	pub fn from_error(error: &Error) -> Self {
		let code = error.status_code();
		let body = match error.kind() {
			ErrorKind::Config | ErrorKind::Storage => Self::new(code, "Internal Server Error"),
			_ => Self::new(code, error.to_string()),
		};

		match error {
			Error::InvalidCredentials { .. } =>
				body.with_header("WWW-Authenticate", WWW_AUTHENTICATE_BASIC),
			_ => body,
		}
	}

	/// Builds the `429` body for a rate-limit denial, with a `Retry-After` header in seconds.
	pub fn rate_limited(directive: &RetryDirective) -> Self {
		Self::new(429, RATE_LIMIT_DETAIL)
			.with_header("Retry-After", directive.retry_after_secs().to_string())
	}

	/// Adds a response header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Records the request URL.
	pub fn with_url(mut self, url: Url) -> Self {
		self.url = Some(url);

		self
	}

	/// Overrides the report time.
	pub fn with_time(mut self, time: OffsetDateTime) -> Self {
		self.time = time;

		self
	}
}
impl From<&Error> for ErrorBody {
	fn from(error: &Error) -> Self {
		Self::from_error(error)
	}
}

/// Reason an inbound request was turned away before reaching a handler.
#[derive(Debug, ThisError)]
pub enum Rejection {
	/// Authentication or counter store failure.
	#[error(transparent)]
	Error(#[from] Error),
	/// Caller exceeded the rate limit.
	#[error("Rate limit reached.")]
	RateLimited(RetryDirective),
}
impl Rejection {
	/// Returns the rejection for a denial, or `None` when the decision allows the request.
	pub fn from_decision(decision: RateLimitDecision) -> Option<Self> {
		match decision {
			RateLimitDecision::Allow => None,
			RateLimitDecision::Deny(directive) => Some(Self::RateLimited(directive)),
		}
	}

	/// HTTP status code a handler should answer with.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Error(error) => error.status_code(),
			Self::RateLimited(_) => 429,
		}
	}

	/// Builds the JSON body for this rejection.
	pub fn to_body(&self) -> ErrorBody {
		match self {
			Self::Error(error) => ErrorBody::from_error(error),
			Self::RateLimited(directive) => ErrorBody::rate_limited(directive),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		error::{ConfigError, TransportError},
		limit::StoreError,
	};

	#[test]
	fn status_codes_follow_error_kind() {
		assert_eq!(Error::from(TransportError::Timeout).status_code(), 502);
		assert_eq!(Error::from(ConfigError::ZeroRateLimit).status_code(), 500);
		assert_eq!(
			Error::from(StoreError::Backend { message: "down".into() }).status_code(),
			500
		);
		assert_eq!(Error::Cancelled.status_code(), 504);
		assert_eq!(Error::from(TransportError::PoolClosed).status_code(), 504);
	}

	#[test]
	fn invalid_credentials_ask_for_basic_auth() {
		let body = ErrorBody::from_error(&Error::InvalidCredentials { reason: "nope".into() });

		assert_eq!(body.code, 401);
		assert_eq!(body.headers.get("WWW-Authenticate").map(String::as_str), Some("Basic"));
	}

	#[test]
	fn internal_failures_hide_details() {
		let body = ErrorBody::from_error(&Error::from(StoreError::Backend {
			message: "redis://secret-host".into(),
		}));

		assert_eq!(body.detail, "Internal Server Error");
	}

	#[test]
	fn denial_maps_to_429_with_retry_after() {
		let directive = RetryDirective::new(OffsetDateTime::UNIX_EPOCH, Duration::seconds(42));
		let rejection = Rejection::from_decision(RateLimitDecision::Deny(directive))
			.expect("Denial should reject.");
		let body = rejection.to_body();

		assert_eq!(rejection.status_code(), 429);
		assert_eq!(body.detail, "Rate limit reached");
		assert_eq!(body.headers.get("Retry-After").map(String::as_str), Some("42"));
		assert!(Rejection::from_decision(RateLimitDecision::Allow).is_none());

		let json = serde_json::to_value(&body).expect("Error body should serialize.");

		assert_eq!(json["code"], 429);
		assert!(json.get("url").is_none());
	}
}
