//! Resilience and authentication core for API gateways: dual-mode timed retries, MD5-signed
//! upstream requests, and atomic shared-counter rate limiting in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod boundary;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
#[cfg(feature = "reqwest")] pub mod gateway;
pub mod http;
pub mod invoke;
pub mod limit;
pub mod obs;
pub mod sign;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures shared by unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		clock::ManualClock,
		client::HostTable,
		error::ErrorKindSet,
		invoke::RetryConfig,
		limit::{MemoryCounterStore, RateLimitSettings, RateLimiter},
		sign::{QueryParams, RequestSigner, SigningCredentials},
	};

	/// Unix timestamp every fixture clock starts at.
	pub const FIXTURE_UNIX: i64 = 1_700_000_000;

	/// Returns a manual clock frozen at [`FIXTURE_UNIX`].
	pub fn fixture_clock() -> ManualClock {
		ManualClock::at_unix(FIXTURE_UNIX)
	}

	/// Builds the built-in host table with every tag pointed at `base`.
	pub fn hosts_at(base: &str) -> HostTable {
		HostTable::bilibili()
			.and_then(|table| table.redirect_all(base))
			.expect("Fixture host table should build.")
	}

	/// Builds a signer with fixed keys, no default parameters, and the provided clock.
	pub fn fixture_signer(clock: ManualClock) -> RequestSigner {
		let credentials = SigningCredentials::new("fixture-access", "fixture-app", "fixture-secret")
			.expect("Fixture credentials should be valid.")
			.with_fixed_defaults(QueryParams::new());

		RequestSigner::new(credentials)
			.expect("Fixture signer should build.")
			.with_clock(Arc::new(clock))
	}

	/// Retry policy with a 1 ms delay so tests stay fast.
	pub fn fast_retry(attempts: u32) -> RetryConfig {
		RetryConfig::new(attempts, Duration::milliseconds(1), ErrorKindSet::default())
			.expect("Fixture retry config should be valid.")
	}

	/// Builds a limiter over an in-memory store driven by `clock`.
	pub fn memory_limiter(
		clock: ManualClock,
		max_requests: u64,
		interval: Duration,
	) -> (RateLimiter, Arc<MemoryCounterStore>) {
		let store = Arc::new(MemoryCounterStore::with_clock(Arc::new(clock)));
		let settings = RateLimitSettings::new(max_requests, interval)
			.expect("Fixture rate limit settings should be valid.");

		(RateLimiter::new(store.clone(), settings), store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::RwLock as AsyncRwLock;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "redis")] pub use redis;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
