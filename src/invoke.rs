//! Dual-mode invocation wrappers: dispatch tagging, wall-clock timing, and bounded retries.
//!
//! An operation is tagged once, at wrap time, as either [`Blocking`] or [`Scheduled`]. The tag
//! fixes the calling convention in the type, so [`Timed::call`] and [`Retrying::call`] return a
//! plain `Result` for blocking operations and a future for scheduled ones. The retry decision
//! logic is shared by both conventions; only the delay suspension differs (thread sleep versus
//! `tokio::time::sleep`).
//!
//! ```
//! use upstream_guard::{
//! 	error::{Error, TransportError},
//! 	invoke::{self, Blocking, RetryConfig},
//! };
//!
//! let op = invoke::wrap("ping", Blocking(|| Ok::<_, Error>(7)), RetryConfig::default());
//!
//! assert_eq!(op.call().unwrap(), 7);
//! ```

mod dispatch;
mod retry;
mod timed;

pub use dispatch::*;
pub use retry::*;
pub use timed::*;

// std
use std::borrow::Cow;

/// Wraps `operation` in a [`Timed`] invoker and a [`Retrying`] policy in one step.
pub fn wrap<D>(
	name: impl Into<Cow<'static, str>>,
	operation: D,
	config: RetryConfig,
) -> Retrying<D>
where
	D: Dispatch,
{
	Timed::new(name, operation).retrying(config)
}
