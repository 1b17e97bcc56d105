//! Shared counter store contract and the built-in backends.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryCounterStore;
#[cfg(feature = "redis")] pub use self::redis::RedisCounterStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CounterStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Shared counter store used by the rate limiter.
///
/// The store exposes a single mutating primitive so increment and expiry can never be observed
/// apart. Implementations must make [`CounterStore::increment_with_expiry`] atomic with respect to
/// every other caller of the same store, including callers in other processes when the backend
/// is shared.
pub trait CounterStore
where
	Self: Send + Sync,
{
	/// Atomically increments `key`, creating it at 1 with a `window` TTL when absent or expired.
	///
	/// The expiry is only set by the increment that creates the counter; later increments inside
	/// the same window leave it untouched.
	fn increment_with_expiry<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> StoreFuture<'a, RateLimitRecord>;
}

/// Counter state observed by one increment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
	/// Counter key.
	pub key: String,
	/// Post-increment count.
	pub count: u64,
	/// Instant the counter lapses and is recreated on the next increment.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Instant the increment was observed.
	#[serde(with = "time::serde::rfc3339")]
	pub observed_at: OffsetDateTime,
}
impl RateLimitRecord {
	/// Time left in the current window, clamped at zero.
	pub fn remaining(&self) -> Duration {
		(self.expires_at - self.observed_at).max(Duration::ZERO)
	}
}

/// Error type produced by [`CounterStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend answered with a reply the store could not interpret.
	#[error("Unexpected backend reply: {message}.")]
	Protocol {
		/// Human-readable error payload.
		message: String,
	},
}
