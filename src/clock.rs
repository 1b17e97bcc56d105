//! Injectable wall-clock sources for signing timestamps and counter expiry.

// self
use crate::_prelude::*;

/// Source of the current UTC instant.
pub trait Clock
where
	Self: Debug + Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;

	/// Returns the current instant as whole Unix seconds.
	fn unix_seconds(&self) -> i64 {
		self.now().unix_timestamp()
	}
}

/// Clock backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same instant, so advancing one clone moves all of them.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Creates a clock frozen at the given Unix timestamp.
	pub fn at_unix(seconds: i64) -> Self {
		Self::new(OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH))
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Jumps the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn manual_clock_clones_share_time() {
		let clock = ManualClock::at_unix(1_700_000_000);
		let other = clock.clone();

		other.advance(Duration::seconds(61));

		assert_eq!(clock.unix_seconds(), 1_700_000_061);

		clock.set(OffsetDateTime::UNIX_EPOCH);

		assert_eq!(other.unix_seconds(), 0);
	}
}
