//! Optional observability helpers for timed invocations, retries, and rate limiting.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `upstream_guard.call` with the `operation`
//!   and `mode` fields, plus a `trace!` record for every finished invocation.
//! - Enable `metrics` to record the `upstream_guard_invocation_duration_ms` histogram, the
//!   `upstream_guard_retry_total` counter, and the `upstream_guard_rate_limit_total` counter.
//!
//! [`InvocationObserver`] is always available and lets callers collect traces in-process.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::{_prelude::*, error::ErrorKind, invoke::DispatchMode};

/// How a timed invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
	/// Operation returned `Ok`.
	Success,
	/// Operation returned `Err`.
	Failure,
	/// Operation was dropped (cancelled or panicked) before returning.
	Abandoned,
}
impl InvocationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			InvocationOutcome::Success => "success",
			InvocationOutcome::Failure => "failure",
			InvocationOutcome::Abandoned => "abandoned",
		}
	}
}
impl Display for InvocationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Ephemeral record emitted once per timed invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationTrace {
	/// Name the operation was wrapped under.
	pub operation: String,
	/// Wall-clock duration of the invocation in milliseconds.
	pub duration_millis: f64,
	/// Calling convention fixed at wrap time.
	pub mode: DispatchMode,
	/// How the invocation ended.
	pub outcome: InvocationOutcome,
}

/// In-process sink for [`InvocationTrace`] records.
pub trait InvocationObserver
where
	Self: Send + Sync,
{
	/// Receives a finished trace. Implementations must not block.
	fn observe(&self, trace: &InvocationTrace);
}

/// Observer that keeps every trace in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver(Mutex<Vec<InvocationTrace>>);
impl RecordingObserver {
	/// Returns a snapshot of the recorded traces.
	pub fn traces(&self) -> Vec<InvocationTrace> {
		self.0.lock().clone()
	}

	/// Returns how many traces were recorded.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns true if nothing was recorded.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}
impl InvocationObserver for RecordingObserver {
	fn observe(&self, trace: &InvocationTrace) {
		self.0.lock().push(trace.clone());
	}
}

pub(crate) fn emit_invocation(trace: &InvocationTrace, observer: Option<&dyn InvocationObserver>) {
	#[cfg(feature = "tracing")]
	::tracing::trace!(
		operation = %trace.operation,
		duration_ms = trace.duration_millis,
		mode = trace.mode.as_str(),
		outcome = trace.outcome.as_str(),
		"Invocation finished."
	);

	record_invocation(trace);

	if let Some(observer) = observer {
		observer.observe(trace);
	}
}

pub(crate) fn emit_retry(operation: &str, attempt: u32, kind: ErrorKind, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	::tracing::debug!(operation, attempt, kind = kind.as_str(), %error, "Retrying after failure.");
	#[cfg(not(feature = "tracing"))]
	let _ = (attempt, error);

	record_retry(operation, kind);
}

pub(crate) fn emit_request(url: &Url) {
	#[cfg(feature = "tracing")]
	::tracing::debug!(method = "GET", url = %url, "Network request sent.");
	#[cfg(not(feature = "tracing"))]
	let _ = url;
}

pub(crate) fn emit_response(url: &Url, status: u16, length: usize) {
	#[cfg(feature = "tracing")]
	::tracing::debug!(method = "GET", url = %url, status, length, "Network request finished.");
	#[cfg(not(feature = "tracing"))]
	let _ = (url, status, length);
}

pub(crate) fn emit_shutdown(in_flight: usize) {
	#[cfg(feature = "tracing")]
	::tracing::info!(in_flight, "Client pool shutting down.");
	#[cfg(not(feature = "tracing"))]
	let _ = in_flight;
}

pub(crate) fn emit_abandoned(abandoned: usize) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(abandoned, "Client pool grace period elapsed with calls in flight.");
	#[cfg(not(feature = "tracing"))]
	let _ = abandoned;
}

pub(crate) fn emit_rate_limit(key: &str, count: u64, allowed: bool) {
	#[cfg(feature = "tracing")]
	{
		if !allowed {
			::tracing::debug!(key, count, "Rate limit reached.");
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (key, count);

	record_rate_limit(allowed);
}

pub(crate) fn emit_give_up(operation: &str, attempt: u32, kind: ErrorKind, exhausted: bool) {
	#[cfg(feature = "tracing")]
	{
		if exhausted {
			::tracing::debug!(operation, attempt, kind = kind.as_str(), "Retry budget exhausted.");
		} else {
			::tracing::debug!(operation, attempt, kind = kind.as_str(), "Failure is not retryable.");
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (operation, attempt, kind, exhausted);
}
