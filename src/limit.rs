//! Fixed-window rate limiting over a shared counter store.
//!
//! Each client key owns a counter that the first request in a window creates with the window's
//! TTL. Requests beyond `max_requests` inside the window are denied with the time left until the
//! counter lapses.

pub mod store;

pub use store::*;

// std
use std::net::IpAddr;
// self
use crate::{_prelude::*, error::ConfigError, obs};

/// Prefix carried by every rate limit counter key.
pub const KEY_PREFIX: &str = "rate_limit:";

/// Validated limiter settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitSettings {
	enabled: bool,
	max_requests: u64,
	interval: Duration,
}
impl RateLimitSettings {
	/// Longest accepted window.
	pub const MAX_INTERVAL: Duration = Duration::days(366);

	/// Builds enabled settings. `max_requests` must be positive and `interval` must lie within
	/// `(0, MAX_INTERVAL]`.
	pub fn new(max_requests: u64, interval: Duration) -> Result<Self, ConfigError> {
		if max_requests == 0 {
			return Err(ConfigError::ZeroRateLimit);
		}
		if !interval.is_positive() {
			return Err(ConfigError::NonPositiveWindow);
		}
		if interval > Self::MAX_INTERVAL {
			return Err(ConfigError::WindowTooLong { max_secs: Self::MAX_INTERVAL.whole_seconds() });
		}

		Ok(Self { enabled: true, max_requests, interval })
	}

	/// Settings for a limiter that always allows.
	pub fn disabled() -> Self {
		Self { enabled: false, max_requests: u64::MAX, interval: Duration::seconds(1) }
	}

	/// Returns true if requests are counted.
	pub fn enabled(&self) -> bool {
		self.enabled
	}

	/// Requests allowed per window.
	pub fn max_requests(&self) -> u64 {
		self.max_requests
	}

	/// Window length.
	pub fn interval(&self) -> Duration {
		self.interval
	}
}

/// Store key derived from a client address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);
impl RateLimitKey {
	/// Derives `rate_limit:IPv{4|6}-{hex}` from a numeric address.
	pub fn from_addr(addr: IpAddr) -> Self {
		let (version, octets) = match addr {
			IpAddr::V4(v4) => (4, hex::encode(v4.octets())),
			IpAddr::V6(v6) => (6, hex::encode(v6.octets())),
		};

		Self(format!("{KEY_PREFIX}IPv{version}-{octets}"))
	}

	/// Derives a key from a client host string, falling back to `rate_limit:fallback-{raw}` when
	/// the host is not a numeric address.
	pub fn from_client(host: &str) -> Self {
		match host.parse::<IpAddr>() {
			Ok(addr) => Self::from_addr(addr),
			Err(_) => Self(format!("{KEY_PREFIX}fallback-{host}")),
		}
	}

	/// Returns the raw store key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for RateLimitKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Result of a rate limit check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request exceeded the window budget.
	Deny(RetryDirective),
}
impl RateLimitDecision {
	/// Returns true for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow)
	}

	/// Time left in the window for a denial.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Allow => None,
			Self::Deny(directive) => Some(directive.recommended_backoff),
		}
	}
}

/// Advises callers when to retry after a [`RateLimitDecision::Deny`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Remaining window duration.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}

	/// Backoff in whole seconds, rounded up, for a `Retry-After` header.
	pub fn retry_after_secs(&self) -> u64 {
		let backoff = self.recommended_backoff.max(Duration::ZERO);
		let whole = backoff.whole_seconds().unsigned_abs();

		if backoff.subsec_nanoseconds() > 0 { whole + 1 } else { whole }
	}
}

/// Gates client keys with an atomic counter per window.
#[derive(Clone)]
pub struct RateLimiter {
	store: Arc<dyn CounterStore>,
	settings: RateLimitSettings,
}
impl RateLimiter {
	/// Creates a limiter over `store`.
	pub fn new(store: Arc<dyn CounterStore>, settings: RateLimitSettings) -> Self {
		Self { store, settings }
	}

	/// Returns the active settings.
	pub fn settings(&self) -> &RateLimitSettings {
		&self.settings
	}

	/// Counts one request against `key` and decides whether it may proceed.
	pub async fn check(&self, key: &str) -> Result<RateLimitDecision> {
		if !self.settings.enabled {
			return Ok(RateLimitDecision::Allow);
		}

		let record = self.store.increment_with_expiry(key, self.settings.interval).await?;
		let allowed = record.count <= self.settings.max_requests;

		obs::emit_rate_limit(key, record.count, allowed);

		if allowed {
			Ok(RateLimitDecision::Allow)
		} else {
			Ok(RateLimitDecision::Deny(
				RetryDirective::new(record.expires_at, record.remaining())
					.with_reason("Rate limit reached"),
			))
		}
	}

	/// Derives the key for a client host and checks it.
	pub async fn check_client(&self, host: &str) -> Result<RateLimitDecision> {
		self.check(RateLimitKey::from_client(host).as_str()).await
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").field("settings", &self.settings).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::net::{Ipv4Addr, Ipv6Addr};
	// self
	use super::*;
	use crate::clock::ManualClock;

	#[test]
	fn keys_use_hex_octets_or_fallback() {
		assert_eq!(
			RateLimitKey::from_addr(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))).as_str(),
			"rate_limit:IPv4-7f000001"
		);
		assert_eq!(
			RateLimitKey::from_addr(IpAddr::V6(Ipv6Addr::LOCALHOST)).as_str(),
			"rate_limit:IPv6-00000000000000000000000000000001"
		);
		assert_eq!(RateLimitKey::from_client("10.0.0.255").as_str(), "rate_limit:IPv4-0a0000ff");
		assert_eq!(RateLimitKey::from_client("testclient").as_str(), "rate_limit:fallback-testclient");
	}

	#[test]
	fn settings_reject_empty_budgets() {
		assert!(matches!(
			RateLimitSettings::new(0, Duration::seconds(60)),
			Err(ConfigError::ZeroRateLimit)
		));
		assert!(matches!(
			RateLimitSettings::new(3, Duration::ZERO),
			Err(ConfigError::NonPositiveWindow)
		));
		assert!(matches!(
			RateLimitSettings::new(3, Duration::seconds(i64::MAX)),
			Err(ConfigError::WindowTooLong { max_secs }) if max_secs == 366 * 86_400
		));
		assert!(RateLimitSettings::new(3, RateLimitSettings::MAX_INTERVAL).is_ok());
	}

	#[test]
	fn retry_after_rounds_up() {
		let directive = RetryDirective::new(
			OffsetDateTime::UNIX_EPOCH,
			Duration::seconds(4) + Duration::milliseconds(1),
		);

		assert_eq!(directive.retry_after_secs(), 5);
		assert_eq!(
			RetryDirective::new(OffsetDateTime::UNIX_EPOCH, Duration::seconds(4)).retry_after_secs(),
			4
		);
	}

	#[tokio::test]
	async fn disabled_limiter_never_touches_the_store() {
		let store = Arc::new(MemoryCounterStore::with_clock(Arc::new(ManualClock::at_unix(0))));
		let limiter = RateLimiter::new(store.clone(), RateLimitSettings::disabled());

		for _ in 0..10 {
			assert!(limiter.check("k").await.expect("Check should succeed.").is_allowed());
		}

		assert!(store.is_empty());
	}
}
