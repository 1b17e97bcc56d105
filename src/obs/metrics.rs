// self
use crate::{error::ErrorKind, obs::InvocationTrace};

/// Records an invocation duration via the global metrics recorder (when enabled).
pub fn record_invocation(trace: &InvocationTrace) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!(
			"upstream_guard_invocation_duration_ms",
			"operation" => trace.operation.clone(),
			"mode" => trace.mode.as_str(),
			"outcome" => trace.outcome.as_str()
		)
		.record(trace.duration_millis);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = trace;
	}
}

/// Records a scheduled retry, labeled by the failure kind that triggered it.
pub fn record_retry(operation: &str, kind: ErrorKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"upstream_guard_retry_total",
			"operation" => operation.to_owned(),
			"kind" => kind.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, kind);
	}
}

/// Records a rate limit decision (`allow` or `deny`).
pub fn record_rate_limit(allowed: bool) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"upstream_guard_rate_limit_total",
			"decision" => if allowed { "allow" } else { "deny" }
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = allowed;
	}
}
