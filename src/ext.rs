//! Extension trait for wrapping errors directly on `Result`s.
//!
//! `Ok` is the "no error" case: nothing is allocated, no stack is captured,
//! and no context message is built.

use std::error::Error;

use crate::chain::Chain;
use crate::context::{Message, split};

// ============================================================================
// ResultChainExt Trait - for calling .wrap() on Results
// ============================================================================

/// Extension trait for wrapping the error of a `Result` into a [`Chain`].
///
/// Works for any error convertible into `Box<dyn Error + Send + Sync>`,
/// including `Chain` itself (which is extended rather than nested).
///
/// ## Example
///
/// ```rust
/// use std::fs;
/// use errchain::{Chain, ResultChainExt};
///
/// fn read_config(path: &str) -> Result<String, Chain> {
///     fs::read_to_string(path).wrap_with(|| format!("reading {path}"))
/// }
///
/// let err = read_config("/definitely/missing.toml").unwrap_err();
/// assert!(err.message().starts_with("reading /definitely/missing.toml: "));
/// ```
pub trait ResultChainExt<T> {
    /// Wrap the error, capturing the stack if it is not already a chain.
    fn wrap(self) -> Result<T, Chain>;

    /// Wrap the error and add a context message.
    ///
    /// `f` runs only on the `Err` path. If the error is already a chain the
    /// message is appended in place and no new stack is captured.
    fn wrap_with<S, F>(self, f: F) -> Result<T, Chain>
    where
        S: Into<String>,
        F: FnOnce() -> S;
}

impl<T, E> ResultChainExt<T> for Result<T, E>
where
    E: Into<Box<dyn Error + Send + Sync + 'static>>,
{
    #[inline(never)]
    fn wrap(self) -> Result<T, Chain> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(match split(e.into()) {
                Ok(chain) => chain,
                Err(root) => Chain::fresh(root, None),
            }),
        }
    }

    #[inline(never)]
    fn wrap_with<S, F>(self, f: F) -> Result<T, Chain>
    where
        S: Into<String>,
        F: FnOnce() -> S,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => {
                let context = Message::new(f());
                Err(match split(e.into()) {
                    Ok(chain) => {
                        chain.push(context);
                        chain
                    }
                    Err(root) => Chain::fresh(root, Some(context)),
                })
            }
        }
    }
}
