// std
use std::sync::atomic::{AtomicU32, Ordering};
// self
use upstream_guard::{
	_preludet::*,
	error::{Classify, ErrorKind, ErrorKindSet},
	invoke::{self, Blocking, DispatchMode, RetryConfig, Scheduled, Timed},
	obs::{InvocationOutcome, RecordingObserver},
};

// Caller-defined errors only need a kind tag to participate in retries.
#[derive(Debug, PartialEq, Eq)]
enum LookupError {
	Flaky(u32),
	Corrupt,
}
impl Display for LookupError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Flaky(attempt) => write!(f, "flaky attempt {attempt}"),
			Self::Corrupt => f.write_str("corrupt payload"),
		}
	}
}
impl Classify for LookupError {
	fn kind(&self) -> ErrorKind {
		match self {
			Self::Flaky(_) => ErrorKind::Network,
			Self::Corrupt => ErrorKind::ResponseParse,
		}
	}
}

#[test]
fn n_attempts_return_the_nth_error() {
	let calls = AtomicU32::new(0);
	let op = invoke::wrap(
		"lookup",
		Blocking(|| Err::<(), _>(LookupError::Flaky(calls.fetch_add(1, Ordering::SeqCst) + 1))),
		fast_retry(5),
	);

	assert_eq!(op.mode(), DispatchMode::Sync);
	assert_eq!(op.call(), Err(LookupError::Flaky(5)));
	assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[test]
fn kinds_outside_the_allow_list_run_once() {
	let calls = AtomicU32::new(0);
	let op = invoke::wrap(
		"lookup",
		Blocking(|| {
			calls.fetch_add(1, Ordering::SeqCst);

			Err::<(), _>(LookupError::Corrupt)
		}),
		fast_retry(5),
	);

	assert_eq!(op.call(), Err(LookupError::Corrupt));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn widened_allow_list_retries_other_kinds() {
	let calls = AtomicU32::new(0);
	let config = fast_retry(3).with_retryable(
		ErrorKindSet::default().with(ErrorKind::ResponseParse).with(ErrorKind::Cancelled),
	);
	let op = invoke::wrap(
		"lookup",
		Blocking(|| {
			calls.fetch_add(1, Ordering::SeqCst);

			Err::<(), _>(LookupError::Corrupt)
		}),
		config,
	);

	assert!(!op.config().retryable().contains(ErrorKind::Cancelled));
	assert_eq!(op.call(), Err(LookupError::Corrupt));
	assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn retry_delay_blocks_between_attempts() {
	let calls = AtomicU32::new(0);
	let config = RetryConfig::new(3, Duration::milliseconds(20), ErrorKindSet::default())
		.expect("Retry config should be valid.");
	let op = invoke::wrap(
		"lookup",
		Blocking(|| Err::<(), _>(LookupError::Flaky(calls.fetch_add(1, Ordering::SeqCst)))),
		config,
	);
	let started = std::time::Instant::now();

	assert!(op.call().is_err());
	assert!(started.elapsed() >= StdDuration::from_millis(40));
}

#[tokio::test]
async fn scheduled_mode_retries_and_traces_each_attempt() {
	let observer = Arc::new(RecordingObserver::default());
	let calls = AtomicU32::new(0);
	let calls = &calls;
	let op = Timed::new(
		"lookup",
		Scheduled(move || async move {
			let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;

			tokio::time::sleep(StdDuration::from_millis(2)).await;

			if attempt < 3 { Err(LookupError::Flaky(attempt)) } else { Ok(attempt) }
		}),
	)
	.with_observer(observer.clone())
	.retrying(fast_retry(3));

	assert_eq!(op.call().await, Ok(3));

	let traces = observer.traces();

	assert_eq!(traces.len(), 3);
	assert!(traces.iter().all(|trace| trace.mode == DispatchMode::Scheduled));
	assert_eq!(
		traces.iter().map(|trace| trace.outcome).collect::<Vec<_>>(),
		vec![InvocationOutcome::Failure, InvocationOutcome::Failure, InvocationOutcome::Success]
	);
}

#[tokio::test]
async fn scheduled_delay_does_not_block_other_tasks() {
	let config = RetryConfig::new(2, Duration::milliseconds(50), ErrorKindSet::default())
		.expect("Retry config should be valid.");
	let op = invoke::wrap(
		"lookup",
		Scheduled(|| async { Err::<(), _>(LookupError::Flaky(0)) }),
		config,
	);
	let ticks = AtomicU32::new(0);
	let ticker = async {
		for _ in 0..5 {
			tokio::time::sleep(StdDuration::from_millis(5)).await;
			ticks.fetch_add(1, Ordering::SeqCst);
		}
	};
	let (result, _) = tokio::join!(op.call(), ticker);

	assert!(result.is_err());
	assert_eq!(ticks.load(Ordering::SeqCst), 5);
}
