//! Redis-backed [`CounterStore`] shared across gateway processes.
//!
//! The increment, first-hit expiry, and TTL read run inside one Lua script, so Redis executes
//! them as a single atomic unit.

// crates.io
use redis::{Client, Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	limit::store::{CounterStore, RateLimitRecord, StoreError, StoreFuture},
};

// Returns `{count, ttl_ms}`. A key that lost its TTL is given the window again.
const INCREMENT_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
	redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
	redis.call('PEXPIRE', KEYS[1], ARGV[1])
	ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Counter store backed by a Redis connection manager.
#[derive(Clone)]
pub struct RedisCounterStore {
	conn: ConnectionManager,
	script: Arc<Script>,
	clock: Arc<dyn Clock>,
}
impl RedisCounterStore {
	/// Connects to `redis_url` (for example `redis://127.0.0.1:6379`).
	pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
		let client = Client::open(redis_url).map_err(backend)?;
		let conn = ConnectionManager::new(client).await.map_err(backend)?;

		Ok(Self::with_connection(conn))
	}

	/// Wraps an existing connection manager.
	pub fn with_connection(conn: ConnectionManager) -> Self {
		Self { conn, script: Arc::new(Script::new(INCREMENT_WITH_EXPIRY)), clock: Arc::new(SystemClock) }
	}

	/// Overrides the clock used to stamp `observed_at`; Redis remains the source of the TTL.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}
}
impl CounterStore for RedisCounterStore {
	fn increment_with_expiry<'a>(
		&'a self,
		key: &'a str,
		window: Duration,
	) -> StoreFuture<'a, RateLimitRecord> {
		Box::pin(async move {
			let window_ms = i64::try_from(window.whole_milliseconds()).unwrap_or(i64::MAX).max(1);
			let mut conn = self.conn.clone();
			let (count, ttl_ms): (i64, i64) = self
				.script
				.key(key)
				.arg(window_ms)
				.invoke_async(&mut conn)
				.await
				.map_err(backend)?;
			let count = u64::try_from(count).map_err(|_| StoreError::Protocol {
				message: format!("counter `{key}` returned negative count {count}"),
			})?;
			let observed_at = self.clock.now();

			Ok(RateLimitRecord {
				key: key.to_owned(),
				count,
				expires_at: observed_at + Duration::milliseconds(ttl_ms.max(0)),
				observed_at,
			})
		})
	}
}
impl Debug for RedisCounterStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisCounterStore").field("clock", &self.clock).finish_non_exhaustive()
	}
}

fn backend(e: redis::RedisError) -> StoreError {
	StoreError::Backend { message: e.to_string() }
}
