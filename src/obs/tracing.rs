// self
use crate::{_prelude::*, invoke::DispatchMode};

/// Span covering one outbound call, retries included.
///
/// The span opens with `operation` and `mode` and records `outcome` once the call settles. Without
/// the `tracing` feature every method is a passthrough.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Opens a span for `operation` running under `mode`.
	pub fn new(operation: &str, mode: DispatchMode) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!(
					"upstream_guard.call",
					operation,
					mode = mode.as_str(),
					outcome = tracing::field::Empty,
				),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, mode);

			Self {}
		}
	}

	/// Runs a blocking call with the span entered.
	pub fn in_scope<T, E>(&self, call: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
		#[cfg(feature = "tracing")]
		let result = self.span.in_scope(call);
		#[cfg(not(feature = "tracing"))]
		let result = call();

		self.settle(result.is_ok());

		result
	}

	/// Drives an async call inside the span; the span is only entered while the call is polled.
	pub async fn instrument<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> Result<T, E> {
		#[cfg(feature = "tracing")]
		let result = {
			use tracing::Instrument;

			call.instrument(self.span.clone()).await
		};
		#[cfg(not(feature = "tracing"))]
		let result = call.await;

		self.settle(result.is_ok());

		result
	}

	fn settle(&self, ok: bool) {
		#[cfg(feature = "tracing")]
		self.span.record("outcome", if ok { "success" } else { "failure" });
		#[cfg(not(feature = "tracing"))]
		let _ = ok;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn in_scope_passes_results_through() {
		let span = CallSpan::new("x/v2/view", DispatchMode::Sync);

		assert_eq!(span.in_scope(|| Ok::<_, ()>(7)), Ok(7));
		assert_eq!(span.in_scope(|| Err::<(), _>("boom")), Err("boom"));
	}

	#[tokio::test]
	async fn instrument_passes_results_through() {
		let span = CallSpan::new("x/v2/search", DispatchMode::Scheduled);

		assert_eq!(span.instrument(async { Ok::<_, ()>(42) }).await, Ok(42));
	}
}
