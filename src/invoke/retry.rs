// std
use std::thread;
// crates.io
use tokio::time::Instant as TokioInstant;
// self
use crate::{
	_prelude::*,
	error::{Classify, ConfigError, ErrorKindSet},
	invoke::{Blocking, Dispatch, DispatchMode, Scheduled, Timed},
	obs,
};

/// Immutable retry policy: attempt budget, fixed delay, and the retryable kind allow-list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RetryConfigRepr", into = "RetryConfigRepr")]
pub struct RetryConfig {
	max_attempts: u32,
	delay: StdDuration,
	retryable: ErrorKindSet,
}
impl RetryConfig {
	/// Attempt budget used by [`RetryConfig::default`].
	pub const DEFAULT_ATTEMPTS: u32 = 3;
	/// Delay used by [`RetryConfig::default`].
	pub const DEFAULT_DELAY: StdDuration = StdDuration::from_millis(100);
	/// Longest accepted delay between attempts.
	pub const MAX_DELAY: StdDuration = StdDuration::from_secs(3_600);

	/// Validates and builds a policy.
	///
	/// `max_attempts` must be at least 1 and `delay` must lie within `0..=MAX_DELAY`.
	pub fn new(
		max_attempts: u32,
		delay: Duration,
		retryable: ErrorKindSet,
	) -> Result<Self, ConfigError> {
		if max_attempts < 1 {
			return Err(ConfigError::InvalidRetryAttempts { attempts: max_attempts });
		}

		let delay = StdDuration::try_from(delay).map_err(|_| ConfigError::NegativeRetryDelay)?;

		if delay > Self::MAX_DELAY {
			return Err(ConfigError::RetryDelayTooLong {
				max_ms: u64::try_from(Self::MAX_DELAY.as_millis()).unwrap_or(u64::MAX),
			});
		}

		Ok(Self { max_attempts, delay, retryable })
	}

	/// Policy that attempts exactly once; wrapping with it is equivalent to a plain timed call.
	pub fn single() -> Self {
		Self { max_attempts: 1, delay: StdDuration::ZERO, retryable: ErrorKindSet::empty() }
	}

	/// Replaces the retryable kind allow-list.
	pub fn with_retryable(mut self, retryable: ErrorKindSet) -> Self {
		self.retryable = retryable;

		self
	}

	/// Maximum number of attempts, including the first.
	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	/// Pause between attempts.
	pub fn delay(&self) -> StdDuration {
		self.delay
	}

	/// Error kinds that trigger another attempt.
	pub fn retryable(&self) -> ErrorKindSet {
		self.retryable
	}
}
impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_ATTEMPTS,
			delay: Self::DEFAULT_DELAY,
			retryable: ErrorKindSet::default(),
		}
	}
}

#[derive(Serialize, Deserialize)]
struct RetryConfigRepr {
	max_attempts: u32,
	delay_ms: u64,
	#[serde(default)]
	retryable: ErrorKindSet,
}
impl TryFrom<RetryConfigRepr> for RetryConfig {
	type Error = ConfigError;

	fn try_from(repr: RetryConfigRepr) -> Result<Self, Self::Error> {
		let delay = Duration::milliseconds(i64::try_from(repr.delay_ms).unwrap_or(i64::MAX));

		Self::new(repr.max_attempts, delay, repr.retryable)
	}
}
impl From<RetryConfig> for RetryConfigRepr {
	fn from(config: RetryConfig) -> Self {
		Self {
			max_attempts: config.max_attempts,
			delay_ms: u64::try_from(config.delay.as_millis()).unwrap_or(u64::MAX),
			retryable: config.retryable,
		}
	}
}

/// Bounded retry wrapper around a [`Timed`] operation.
///
/// Every attempt is timed individually. Only the final attempt's error is returned; earlier
/// failures are logged at debug level.
#[derive(Debug)]
pub struct Retrying<D>
where
	D: Dispatch,
{
	timed: Timed<D>,
	config: RetryConfig,
}
impl<D> Retrying<D>
where
	D: Dispatch,
{
	/// Layers `config` over an existing timed invoker.
	pub fn new(timed: Timed<D>, config: RetryConfig) -> Self {
		Self { timed, config }
	}

	/// Returns the active policy.
	pub fn config(&self) -> &RetryConfig {
		&self.config
	}

	/// Returns the operation name used in traces.
	pub fn name(&self) -> &str {
		self.timed.name()
	}

	/// Returns the calling convention fixed at wrap time.
	pub fn mode(&self) -> DispatchMode {
		D::MODE
	}

	fn attempts(&self) -> Attempts<'_> {
		Attempts { config: &self.config, operation: self.timed.name(), made: 0 }
	}
}
impl<F, T, E> Retrying<Blocking<F>>
where
	F: Fn() -> Result<T, E>,
	E: Classify + Display,
{
	/// Runs the operation on the current thread, sleeping the thread between attempts.
	pub fn call(&self) -> Result<T, E> {
		let mut attempts = self.attempts();

		loop {
			let err = match self.timed.call() {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};

			match attempts.after_failure(&err) {
				Next::Retry(delay) =>
					if !delay.is_zero() {
						thread::sleep(delay);
					},
				Next::GiveUp => return Err(err),
			}
		}
	}
}
impl<F, Fut, T, E> Retrying<Scheduled<F>>
where
	F: Fn() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: Classify + Display,
{
	/// Runs the operation, suspending only the current task between attempts.
	///
	/// Dropping the returned future cancels the in-flight attempt and any pending delay.
	pub async fn call(&self) -> Result<T, E> {
		let mut attempts = self.attempts();

		loop {
			let err = match self.timed.call().await {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};

			match attempts.after_failure(&err) {
				Next::Retry(delay) =>
					if !delay.is_zero() {
						tokio::time::sleep(delay).await;
					},
				Next::GiveUp => return Err(err),
			}
		}
	}

	/// Like [`Retrying::call`], but aborts with [`Error::Cancelled`] once `deadline` passes.
	///
	/// The deadline covers the whole retry loop, including in-flight attempts and delays.
	pub async fn call_until(&self, deadline: TokioInstant) -> Result<T, E>
	where
		E: From<Error>,
	{
		match tokio::time::timeout_at(deadline, self.call()).await {
			Ok(result) => result,
			Err(_) => Err(Error::Cancelled.into()),
		}
	}

	/// Like [`Retrying::call_until`] with a deadline `budget` from now.
	pub async fn call_within(&self, budget: StdDuration) -> Result<T, E>
	where
		E: From<Error>,
	{
		self.call_until(TokioInstant::now() + budget).await
	}
}

enum Next {
	Retry(StdDuration),
	GiveUp,
}

// Retry bookkeeping shared by both calling conventions.
struct Attempts<'a> {
	config: &'a RetryConfig,
	operation: &'a str,
	made: u32,
}
impl Attempts<'_> {
	fn after_failure<E>(&mut self, err: &E) -> Next
	where
		E: Classify + Display,
	{
		self.made += 1;

		let kind = err.kind();

		if !self.config.retryable.contains(kind) {
			obs::emit_give_up(self.operation, self.made, kind, false);

			return Next::GiveUp;
		}
		if self.made >= self.config.max_attempts {
			obs::emit_give_up(self.operation, self.made, kind, true);

			return Next::GiveUp;
		}

		obs::emit_retry(self.operation, self.made, kind, err);

		Next::Retry(self.config.delay)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;
	use crate::{
		error::{ErrorKind, ResponseError, TransportError},
		invoke,
		obs::RecordingObserver,
	};

	fn network(attempt: u32) -> Error {
		TransportError::Network { detail: format!("attempt {attempt}"), status: None, source: None }
			.into()
	}

	fn fast(attempts: u32) -> RetryConfig {
		RetryConfig::new(attempts, Duration::milliseconds(1), ErrorKindSet::default())
			.expect("Retry config should be valid.")
	}

	#[test]
	fn config_rejects_invalid_bounds() {
		assert!(matches!(
			RetryConfig::new(0, Duration::ZERO, ErrorKindSet::default()),
			Err(ConfigError::InvalidRetryAttempts { attempts: 0 })
		));
		assert!(matches!(
			RetryConfig::new(2, Duration::milliseconds(-5), ErrorKindSet::default()),
			Err(ConfigError::NegativeRetryDelay)
		));
		assert!(matches!(
			RetryConfig::new(2, Duration::hours(2), ErrorKindSet::default()),
			Err(ConfigError::RetryDelayTooLong { max_ms: 3_600_000 })
		));
	}

	#[test]
	fn config_deserializes_from_millis() {
		let config: RetryConfig =
			serde_json::from_str(r#"{"max_attempts":4,"delay_ms":250,"retryable":["network","storage"]}"#)
				.expect("Retry config should deserialize.");

		assert_eq!(config.max_attempts(), 4);
		assert_eq!(config.delay(), StdDuration::from_millis(250));
		assert!(config.retryable().contains(ErrorKind::Storage));
		assert!(serde_json::from_str::<RetryConfig>(r#"{"max_attempts":0,"delay_ms":0}"#).is_err());
	}

	#[test]
	fn blocking_exhausts_budget_and_returns_last_error() {
		let calls = AtomicU32::new(0);
		let retrying = invoke::wrap(
			"always-fails",
			Blocking(|| Err::<(), _>(network(calls.fetch_add(1, Ordering::SeqCst) + 1))),
			fast(4),
		);
		let err = retrying.call().expect_err("Operation should fail after retries.");

		assert_eq!(calls.load(Ordering::SeqCst), 4);
		assert!(err.to_string().contains("attempt 4"));
	}

	#[test]
	fn blocking_non_retryable_runs_once() {
		let calls = AtomicU32::new(0);
		let retrying = invoke::wrap(
			"parse",
			Blocking(|| {
				calls.fetch_add(1, Ordering::SeqCst);

				let source = serde_path_to_error::deserialize::<_, u8>(
					&mut serde_json::Deserializer::from_str("nope"),
				)
				.expect_err("Invalid JSON should fail.");

				Err::<u8, _>(Error::from(ResponseError::Json { source, preview: "nope".into() }))
			}),
			fast(5),
		);
		let err = retrying.call().expect_err("Parse failure should propagate.");

		assert_eq!(err.kind(), ErrorKind::ResponseParse);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn single_attempt_acts_as_timed_call() {
		let observer = Arc::new(RecordingObserver::default());
		let calls = AtomicU32::new(0);
		let retrying = Timed::new(
			"once",
			Blocking(|| Err::<(), _>(network(calls.fetch_add(1, Ordering::SeqCst) + 1))),
		)
		.with_observer(observer.clone())
		.retrying(RetryConfig::single());

		assert!(retrying.call().is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(observer.len(), 1);
	}

	#[test]
	fn recovers_after_transient_failures() {
		let observer = Arc::new(RecordingObserver::default());
		let calls = AtomicU32::new(0);
		let retrying = Timed::new(
			"flaky",
			Blocking(|| {
				let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;

				if attempt < 3 { Err(network(attempt)) } else { Ok(attempt) }
			}),
		)
		.with_observer(observer.clone())
		.retrying(fast(3));

		assert_eq!(retrying.call().expect("Third attempt should succeed."), 3);
		assert_eq!(observer.len(), 3);
	}

	#[tokio::test]
	async fn scheduled_exhausts_budget() {
		let calls = AtomicU32::new(0);
		let calls = &calls;
		let retrying = invoke::wrap(
			"async-fails",
			Scheduled(move || async move {
				Err::<(), _>(network(calls.fetch_add(1, Ordering::SeqCst) + 1))
			}),
			fast(3),
		);
		let err = retrying.call().await.expect_err("Operation should fail after retries.");

		assert_eq!(retrying.mode(), DispatchMode::Scheduled);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert!(err.to_string().contains("attempt 3"));
	}

	#[tokio::test]
	async fn deadline_cancels_and_is_not_retried() {
		let calls = AtomicU32::new(0);
		let calls = &calls;
		let retrying = invoke::wrap(
			"slow",
			Scheduled(move || async move {
				calls.fetch_add(1, Ordering::SeqCst);
				tokio::time::sleep(StdDuration::from_millis(500)).await;

				Err::<(), _>(network(0))
			}),
			fast(10),
		);
		let err = retrying
			.call_within(StdDuration::from_millis(20))
			.await
			.expect_err("Deadline should cancel the call.");

		assert!(matches!(err, Error::Cancelled));
		assert_eq!(err.kind(), ErrorKind::Cancelled);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
