//! Thread-safe in-process [`CounterStore`] for tests and single-process deployments.

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	limit::store::{CounterStore, RateLimitRecord, StoreError, StoreFuture},
};

#[derive(Clone, Copy, Debug)]
struct Counter {
	count: u64,
	expires_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Windows {
	counters: HashMap<String, Counter>,
	since_sweep: u32,
}
impl Windows {
	fn sweep(&mut self, now: OffsetDateTime) -> usize {
		let before = self.counters.len();

		self.counters.retain(|_, counter| counter.expires_at > now);
		self.since_sweep = 0;

		before - self.counters.len()
	}
}

/// Counter store that keeps windows in a mutex-guarded map.
///
/// Lapsed counters are recreated by the next increment on the same key. Counters nobody touches
/// any more are dropped by a sweep that runs under the same lock every
/// [`MemoryCounterStore::DEFAULT_SWEEP_EVERY`] increments, or on demand through
/// [`MemoryCounterStore::purge_expired`].
#[derive(Clone, Debug)]
pub struct MemoryCounterStore {
	windows: Arc<Mutex<Windows>>,
	clock: Arc<dyn Clock>,
	sweep_every: u32,
}
impl MemoryCounterStore {
	/// Increments between two sweeps of lapsed counters.
	pub const DEFAULT_SWEEP_EVERY: u32 = 1_024;

	/// Creates an empty store on the system clock.
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	/// Creates an empty store on the provided clock.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { windows: Default::default(), clock, sweep_every: Self::DEFAULT_SWEEP_EVERY }
	}

	/// Changes how many increments run between sweeps. Zero is treated as one.
	pub fn with_sweep_every(mut self, increments: u32) -> Self {
		self.sweep_every = increments.max(1);

		self
	}

	/// Removes every lapsed counter and returns how many were dropped.
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();

		self.windows.lock().sweep(now)
	}

	/// Number of counters currently held, lapsed ones included.
	pub fn len(&self) -> usize {
		self.windows.lock().counters.len()
	}

	/// Returns true when no counters are held.
	pub fn is_empty(&self) -> bool {
		self.windows.lock().counters.is_empty()
	}

	fn increment_now(&self, key: &str, window: Duration) -> Result<RateLimitRecord, StoreError> {
		let now = self.clock.now();
		let expires_at = now.checked_add(window).ok_or_else(|| StoreError::Backend {
			message: format!("window of {window} overflows the clock for key `{key}`"),
		})?;
		let mut windows = self.windows.lock();

		windows.since_sweep += 1;

		if windows.since_sweep >= self.sweep_every {
			windows.sweep(now);
		}

		let counter = windows
			.counters
			.entry(key.to_owned())
			.and_modify(|counter| {
				if counter.expires_at <= now {
					*counter = Counter { count: 0, expires_at };
				}
			})
			.or_insert(Counter { count: 0, expires_at });

		counter.count += 1;

		Ok(RateLimitRecord {
			key: key.to_owned(),
			count: counter.count,
			expires_at: counter.expires_at,
			observed_at: now,
		})
	}
}
impl Default for MemoryCounterStore {
	fn default() -> Self {
		Self::new()
	}
}
impl CounterStore for MemoryCounterStore {
	fn increment_with_expiry<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> StoreFuture<'a, RateLimitRecord> {
		Box::pin(async move { self.increment_now(key, window) })
	}
}
