// self
use crate::_prelude::*;

/// Calling convention of a wrapped operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
	/// Invoked on the caller's thread; delays block that thread.
	Sync,
	/// Invoked as a future; delays suspend only the current task.
	Scheduled,
}
impl DispatchMode {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DispatchMode::Sync => "sync",
			DispatchMode::Scheduled => "scheduled",
		}
	}
}
impl Display for DispatchMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Operation tagged with a calling convention that can never change after wrapping.
pub trait Dispatch {
	/// Mode shared by every invocation of the tagged operation.
	const MODE: DispatchMode;

	/// Returns [`Self::MODE`].
	fn mode(&self) -> DispatchMode {
		Self::MODE
	}
}

/// Tags a synchronous operation: `Fn() -> Result<T, E>`.
#[derive(Clone, Copy)]
pub struct Blocking<F>(pub F);
impl<F> Blocking<F> {
	pub(crate) fn invoke<T, E>(&self) -> Result<T, E>
	where
		F: Fn() -> Result<T, E>,
	{
		(self.0)()
	}
}
impl<F> Dispatch for Blocking<F> {
	const MODE: DispatchMode = DispatchMode::Sync;
}
impl<F> Debug for Blocking<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Blocking(..)")
	}
}

/// Tags an asynchronously scheduled operation: `Fn() -> impl Future<Output = Result<T, E>>`.
///
/// The closure is called once per attempt, so it must build a fresh future every time.
#[derive(Clone, Copy)]
pub struct Scheduled<F>(pub F);
impl<F> Scheduled<F> {
	pub(crate) fn invoke<Fut, T, E>(&self) -> Fut
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		(self.0)()
	}
}
impl<F> Dispatch for Scheduled<F> {
	const MODE: DispatchMode = DispatchMode::Scheduled;
}
impl<F> Debug for Scheduled<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Scheduled(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn tags_fix_mode_in_type() {
		let blocking = Blocking(|| Ok::<_, ()>(1));
		let scheduled = Scheduled(|| async { Ok::<_, ()>(1) });

		assert_eq!(blocking.mode(), DispatchMode::Sync);
		assert_eq!(scheduled.mode(), DispatchMode::Scheduled);
		assert_eq!(<Blocking<fn()> as Dispatch>::MODE, DispatchMode::Sync);
		assert_eq!(DispatchMode::Scheduled.to_string(), "scheduled");
	}
}
