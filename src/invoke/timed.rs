// std
use std::{borrow::Cow, time::Instant};
// self
use crate::{
	_prelude::*,
	invoke::{Blocking, Dispatch, DispatchMode, RetryConfig, Retrying, Scheduled},
	obs::{self, InvocationObserver, InvocationOutcome, InvocationTrace},
};

/// Wraps a dispatch-tagged operation and emits one [`InvocationTrace`] per invocation.
///
/// Results and errors pass through untouched. A trace is emitted even when the invocation is
/// abandoned mid-flight (its future dropped or the operation panicking), in which case the
/// outcome is [`InvocationOutcome::Abandoned`].
pub struct Timed<D> {
	name: Cow<'static, str>,
	operation: D,
	observer: Option<Arc<dyn InvocationObserver>>,
}
impl<D> Timed<D>
where
	D: Dispatch,
{
	/// Wraps `operation` under `name`.
	pub fn new(name: impl Into<Cow<'static, str>>, operation: D) -> Self {
		Self { name: name.into(), operation, observer: None }
	}

	/// Sends every trace to `observer` in addition to the tracing and metrics sinks.
	pub fn with_observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
		self.observer = Some(observer);

		self
	}

	/// Returns the operation name used in traces.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns the calling convention fixed at wrap time.
	pub fn mode(&self) -> DispatchMode {
		D::MODE
	}

	/// Layers a retry policy on top of this timed invoker.
	pub fn retrying(self, config: RetryConfig) -> Retrying<D> {
		Retrying::new(self, config)
	}

	fn stopwatch(&self) -> Stopwatch<'_> {
		Stopwatch {
			operation: &self.name,
			mode: D::MODE,
			observer: self.observer.as_deref(),
			started: Instant::now(),
			outcome: InvocationOutcome::Abandoned,
		}
	}
}
impl<F, T, E> Timed<Blocking<F>>
where
	F: Fn() -> Result<T, E>,
{
	/// Invokes the operation on the current thread.
	pub fn call(&self) -> Result<T, E> {
		let watch = self.stopwatch();
		let result = self.operation.invoke();

		watch.finish(result.is_ok());

		result
	}
}
impl<F, Fut, T, E> Timed<Scheduled<F>>
where
	F: Fn() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	/// Builds and awaits one future from the operation.
	pub async fn call(&self) -> Result<T, E> {
		let watch = self.stopwatch();
		let result = self.operation.invoke().await;

		watch.finish(result.is_ok());

		result
	}
}
impl<D> Debug for Timed<D>
where
	D: Dispatch,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Timed")
			.field("name", &self.name)
			.field("mode", &D::MODE)
			.field("observed", &self.observer.is_some())
			.finish()
	}
}

// Emits on drop so abandoned invocations are still measured.
struct Stopwatch<'a> {
	operation: &'a str,
	mode: DispatchMode,
	observer: Option<&'a dyn InvocationObserver>,
	started: Instant,
	outcome: InvocationOutcome,
}
impl Stopwatch<'_> {
	fn finish(mut self, ok: bool) {
		self.outcome = if ok { InvocationOutcome::Success } else { InvocationOutcome::Failure };
	}
}
impl Drop for Stopwatch<'_> {
	fn drop(&mut self) {
		let trace = InvocationTrace {
			operation: self.operation.to_owned(),
			duration_millis: self.started.elapsed().as_secs_f64() * 1_000.,
			mode: self.mode,
			outcome: self.outcome,
		};

		obs::emit_invocation(&trace, self.observer);
	}
}
