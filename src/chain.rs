//! The [`Chain`] error type.
//!
//! A chain is a root error plus context messages added as it propagates, and
//! one stack captured when the chain was first created. It's the primary API
//! surface for errchain.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard};

use crate::context::{Cause, MESSAGE_SEPARATOR, Message};
use crate::policy::{LogSink, Policy, ReportSink};
use crate::stack::{RawStack, STACK_SEPARATOR, StackFrame};

// ============================================================================
// Cause storage
// ============================================================================

/// Context causes appended after the root (default: heap Vec).
#[cfg(not(feature = "smallvec-causes"))]
type ContextVec = Vec<Cause>;

/// Context causes appended after the root, 4 inline slots.
#[cfg(feature = "smallvec-causes")]
type ContextVec = smallvec::SmallVec<[Cause; 4]>;

// ============================================================================
// Chain - Core error type
// ============================================================================

/// An error chain: root cause, added context, and the stack at creation.
///
/// ## Sharing
///
/// `Chain` is a handle. Clones share the same causes and stack, so context
/// added through one clone is visible through all of them. Use
/// [`ptr_eq`](Self::ptr_eq) to check whether two handles are the same chain.
///
/// ## Rewrapping
///
/// Wrapping a chain again never nests it and never captures a second stack:
///
/// ```rust
/// use errchain::{wrap, Chain};
///
/// let first = wrap("connection reset");
/// let again = wrap(first.clone());
/// assert!(Chain::ptr_eq(&first, &again));
/// assert_eq!(again.cause_count(), 1);
/// ```
///
/// ## Formatting
///
/// `Display` renders [`message`](Self::message), then `"; "` and the
/// resolved [`stack`](Self::stack). With the default process-wide settings it
/// also emits [`report`](Self::report) to the log. See [`crate::policy`].
#[derive(Clone)]
pub struct Chain {
    inner: Arc<ChainInner>,
}

struct ChainInner {
    root: Cause,
    context: RwLock<ContextVec>,
    stack: RawStack,
    frames: OnceLock<Vec<StackFrame>>,
}

// ============================================================================
// Chain Implementation
// ============================================================================

impl Chain {
    /// Create a new chain and capture the stack.
    ///
    /// Skips this frame and the public entry point that called it, so the
    /// first captured frame is the user's call site. Every entry point must
    /// call this directly.
    #[inline(never)]
    pub(crate) fn fresh(root: Cause, context: Option<Message>) -> Chain {
        let mut causes = ContextVec::new();
        if let Some(message) = context {
            causes.push(Arc::new(message) as Cause);
        }
        Chain {
            inner: Arc::new(ChainInner {
                root,
                context: RwLock::new(causes),
                stack: RawStack::capture(2),
                frames: OnceLock::new(),
            }),
        }
    }

    /// Create a chain whose root cause is a [`Message`].
    ///
    /// This is what [`errorf!`](crate::errorf!) expands to. Always creates a
    /// new chain and captures the caller's stack.
    ///
    /// ```rust
    /// use errchain::Chain;
    ///
    /// let err = Chain::msg("config missing");
    /// assert_eq!(err.message(), "config missing");
    /// ```
    #[inline(never)]
    pub fn msg(text: impl Into<String>) -> Chain {
        Chain::fresh(Arc::new(Message::new(text)), None)
    }

    /// Append a context message to this chain in place.
    ///
    /// The stack is not captured again. All clones of this chain observe the
    /// new message.
    pub fn annotate(&self, text: impl Into<String>) {
        self.push(Message::new(text));
    }

    pub(crate) fn push(&self, message: Message) {
        self.inner
            .context
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(message));
    }

    fn context(&self) -> RwLockReadGuard<'_, ContextVec> {
        self.inner
            .context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if two handles refer to the same chain.
    #[inline]
    pub fn ptr_eq(a: &Chain, b: &Chain) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    // ========================================================================
    // Causes
    // ========================================================================

    /// All causes, oldest (root) first.
    ///
    /// This is a snapshot; causes appended later through any clone are not
    /// reflected in the returned `Vec`.
    pub fn causes(&self) -> Vec<Cause> {
        let context = self.context();
        let mut causes = Vec::with_capacity(context.len() + 1);
        causes.push(self.inner.root.clone());
        causes.extend(context.iter().cloned());
        causes
    }

    /// Number of causes, including the root.
    pub fn cause_count(&self) -> usize {
        self.context().len() + 1
    }

    /// The root cause: the error this chain was created from.
    #[inline]
    pub fn first(&self) -> Cause {
        self.inner.root.clone()
    }

    /// The most recently added cause (the root if nothing was added).
    pub fn last(&self) -> Cause {
        self.context()
            .last()
            .cloned()
            .unwrap_or_else(|| self.inner.root.clone())
    }

    /// Get the root cause as a concrete type, if it is one.
    ///
    /// ```rust
    /// use std::io;
    /// use errchain::wrap;
    ///
    /// let err = wrap(io::Error::new(io::ErrorKind::NotFound, "no such file"));
    /// let io_err = err.root_as::<io::Error>().unwrap();
    /// assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    /// ```
    pub fn root_as<T: Error + 'static>(&self) -> Option<&T> {
        self.inner.root.downcast_ref::<T>()
    }

    /// Combined message, most recent cause first, joined with `": "`.
    pub fn message(&self) -> String {
        // Snapshot first: a cause's Display must not run under our lock.
        let causes = self.causes();
        let mut out = String::new();
        for cause in causes.iter().rev() {
            if !out.is_empty() {
                out.push_str(MESSAGE_SEPARATOR);
            }
            out.push_str(&cause.to_string());
        }
        out
    }

    // ========================================================================
    // Stack
    // ========================================================================

    /// The unresolved stack captured when this chain was created.
    #[inline]
    pub fn raw_stack(&self) -> &RawStack {
        &self.inner.stack
    }

    /// Resolved frames, innermost first.
    ///
    /// Resolution runs once per chain on first access; later calls (from any
    /// clone or thread) return the cached frames.
    pub fn frames(&self) -> &[StackFrame] {
        self.inner.frames.get_or_init(|| self.inner.stack.resolve())
    }

    /// Resolved stack rendered as `file:line function: source` frames joined
    /// with `"; "`.
    pub fn stack(&self) -> String {
        let mut out = String::new();
        for frame in self.frames() {
            if !out.is_empty() {
                out.push_str(STACK_SEPARATOR);
            }
            out.push_str(&frame.to_string());
        }
        out
    }

    /// Multi-line report: the message, then two indented lines per frame.
    ///
    /// ```text
    /// opening config: no such file
    ///   src/config.rs:42
    ///     app::config::load: let file = File::open(path)?;
    /// ```
    pub fn report(&self) -> String {
        use fmt::Write;

        let mut out = self.message();
        out.push('\n');
        for frame in self.frames() {
            let _ = write!(
                out,
                "  {}:{}\n    {}: {}\n",
                frame.file().display(),
                frame.line(),
                frame.function(),
                frame.contents()
            );
        }
        out
    }

    /// Emit [`report`](Self::report) through [`LogSink`].
    pub fn log(&self) {
        LogSink.emit(&self.report());
    }

    /// Render with an explicit policy instead of the process-wide switches.
    ///
    /// The sink in `policy`, if any, receives a report each time the returned
    /// value is formatted.
    pub fn display_with<'a>(&'a self, policy: Policy<'a>) -> impl fmt::Display + 'a {
        ChainDisplay {
            chain: self,
            policy,
        }
    }
}

struct ChainDisplay<'a> {
    chain: &'a Chain,
    policy: Policy<'a>,
}

impl fmt::Display for ChainDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sink) = self.policy.report_sink() {
            sink.emit(&self.chain.report());
        }
        f.write_str(&self.chain.message())?;
        if self.policy.stack_included() {
            f.write_str(STACK_SEPARATOR)?;
            f.write_str(&self.chain.stack())?;
        }
        Ok(())
    }
}

// ============================================================================
// Display impl for Chain
// ============================================================================

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.display_with(Policy::global()), f)
    }
}

// ============================================================================
// Debug impl for Chain (no log side effect)
// ============================================================================

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.message())?;

        let frames = self.frames();
        if frames.is_empty() {
            return Ok(());
        }

        writeln!(f)?;
        for frame in frames {
            writeln!(f, "    at {}:{}", frame.file().display(), frame.line())?;
            writeln!(f, "       ╰─ {}: {}", frame.function(), frame.contents())?;
        }
        Ok(())
    }
}

// ============================================================================
// Error impl for Chain
// ============================================================================

/// `source()` is `None`: the message already includes every cause.
impl Error for Chain {}
