//! Cause values stored in a chain.
//!
//! A chain holds its root error plus any context messages added later. All of
//! them are stored as [`Cause`] trait objects; context added through
//! `wrap_with`/`wrapf!`/`annotate` is a [`Message`].

use std::error::Error;
use std::sync::Arc;

/// One underlying error in a chain.
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// Separator between cause messages in [`Chain::message`](crate::Chain::message).
pub const MESSAGE_SEPARATOR: &str = ": ";

/// A formatted context message added to a chain.
///
/// ```rust
/// use errchain::Message;
///
/// let msg = Message::new(format!("retry {} of {}", 2, 3));
/// assert_eq!(msg.to_string(), "retry 2 of 3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{text}")]
pub struct Message {
    text: String,
}

impl Message {
    /// Create a message from already formatted text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The message text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Convert a boxed error into a cause, unless it already is a chain.
///
/// This is the capability check behind merge-on-rewrap: chains are extended,
/// everything else becomes the root of a new chain.
pub(crate) fn split(err: Box<dyn Error + Send + Sync + 'static>) -> Result<crate::Chain, Cause> {
    match err.downcast::<crate::Chain>() {
        Ok(chain) => Ok(*chain),
        Err(other) => Err(Arc::from(other)),
    }
}
