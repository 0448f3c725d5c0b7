//! # errchain - Error chains with lazily resolved stack traces
//!
//! Wrap a root error, add context as it propagates, and keep the call stack
//! from the moment it was first wrapped. Capturing only records instruction
//! pointers; symbol lookup and source-line reading happen on first use and are
//! cached.
//!
//! ```text
//! loading user 42: connection reset; src/db.rs:88 app::db::query: return Err(errorf!("connection reset")); src/api.rs:31 app::api::load_user: ...
//! ```
//!
//! ## Try It Now
//!
//! ```rust
//! use errchain::{errorf, wrapf, Chain};
//!
//! fn query(id: u64) -> Result<(), Chain> {
//!     Err(errorf!("no row for id {}", id))
//! }
//!
//! fn load_user(id: u64) -> Result<(), Chain> {
//!     wrapf!(query(id), "loading user {}", id)
//! }
//!
//! let err = load_user(42).unwrap_err();
//! assert_eq!(err.message(), "loading user 42: no row for id 42");
//! assert_eq!(err.cause_count(), 2);
//! ```
//!
//! ## Starting a Chain
//!
//! | Call | Effect |
//! |------|--------|
//! | [`wrap(err)`](wrap()) | New chain rooted at `err`, stack captured here |
//! | [`wrap_context(err, msg)`](wrap_context()) | Same, plus one context message |
//! | [`errorf!("fmt", ..)`](errorf!) | New chain rooted at a formatted [`Message`] |
//! | [`result.wrap()`](ResultChainExt::wrap) | `wrap` on the `Err` path only |
//! | [`wrapf!(result, "fmt", ..)`](wrapf!) | Context on the `Err` path only; formats lazily |
//!
//! ## Merge, Don't Nest
//!
//! Every entry point checks whether the error already is a [`Chain`]. If it
//! is, the chain is returned as-is (plus any new context message appended in
//! place). The stack captured at creation stays authoritative, since it points
//! at the root cause.
//!
//! ```rust
//! use errchain::{wrap, wrap_context, Chain};
//!
//! let root = wrap("disk full");
//! let frames = root.raw_stack().len();
//!
//! let outer = wrap_context(root.clone(), "saving draft");
//! assert!(Chain::ptr_eq(&root, &outer));
//! assert_eq!(outer.raw_stack().len(), frames);
//! assert_eq!(outer.message(), "saving draft: disk full");
//! ```
//!
//! ## Formatting
//!
//! `Display` renders the combined message, `"; "`, and the resolved stack.
//! By default it also emits a multi-line report to the `log` facade. Both are
//! process-wide switches in [`policy`]; use [`Chain::display_with`] to choose
//! explicitly per call.

#![deny(unsafe_code)]

mod chain;
mod context;
mod ext;
pub mod policy;
pub mod prelude;
mod stack;

use std::error::Error;

pub use chain::Chain;
pub use context::{Cause, MESSAGE_SEPARATOR, Message};
pub use ext::ResultChainExt;
pub use policy::{LogSink, Policy, ReportSink};
pub use stack::{LineContents, RawStack, STACK_SEPARATOR, StackFrame};

use context::split;

/// Wrap an error into a [`Chain`], capturing the caller's stack.
///
/// If `err` already is a `Chain` it is returned unchanged: nothing is
/// allocated and no stack is captured.
///
/// ## Example
///
/// ```rust
/// use std::io;
/// use errchain::wrap;
///
/// let err = wrap(io::Error::other("broken pipe"));
/// assert_eq!(err.cause_count(), 1);
/// assert_eq!(err.first().to_string(), "broken pipe");
/// ```
#[inline(never)]
pub fn wrap<E>(err: E) -> Chain
where
    E: Into<Box<dyn Error + Send + Sync + 'static>>,
{
    match split(err.into()) {
        Ok(chain) => chain,
        Err(root) => Chain::fresh(root, None),
    }
}

/// Wrap an error and add a context message.
///
/// A `Chain` gets the message appended in place; any other error becomes the
/// root of a new chain with the message as its second cause.
///
/// For the maybe-absent case with lazy formatting, use [`wrapf!`] or
/// [`ResultChainExt::wrap_with`].
#[inline(never)]
pub fn wrap_context<E>(err: E, text: impl Into<String>) -> Chain
where
    E: Into<Box<dyn Error + Send + Sync + 'static>>,
{
    let context = Message::new(text);
    match split(err.into()) {
        Ok(chain) => {
            chain.push(context);
            chain
        }
        Err(root) => Chain::fresh(root, Some(context)),
    }
}

/// Create a new [`Chain`] from a formatted message.
///
/// Takes the same arguments as [`format!`]. Always creates a new chain.
///
/// ```rust
/// use errchain::errorf;
///
/// let err = errorf!("err {} {} {}", 1, 2, 4);
/// assert_eq!(err.message(), "err 1 2 4");
/// ```
#[macro_export]
#[collapse_debuginfo(yes)]
macro_rules! errorf {
    ($($arg:tt)+) => {
        $crate::Chain::msg(::std::format!($($arg)+))
    };
}

/// Wrap the error of a `Result` with a formatted context message.
///
/// On `Ok` the result passes through and the message is never formatted.
/// Expands to [`ResultChainExt::wrap_with`].
///
/// ```rust
/// use errchain::{wrapf, Chain};
///
/// let ok: Result<u32, std::io::Error> = Ok(7);
/// let wrapped: Result<u32, Chain> = wrapf!(ok, "never formatted {}", 1);
/// assert_eq!(wrapped.unwrap(), 7);
/// ```
#[macro_export]
#[collapse_debuginfo(yes)]
macro_rules! wrapf {
    ($result:expr, $($arg:tt)+) => {
        $crate::ResultChainExt::wrap_with($result, || ::std::format!($($arg)+))
    };
}

#[cfg(test)]
mod tests;
