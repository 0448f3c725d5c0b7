//! Raw stack capture and lazy frame resolution.
//!
//! This module provides [`RawStack`], an address-only snapshot of the call
//! stack taken when a chain is created, and [`StackFrame`], the resolved
//! `file:line function: source` form produced on demand.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Separator between rendered stack frames.
pub const STACK_SEPARATOR: &str = "; ";

/// Number of addresses fetched per stack walk.
const CHUNK_LEN: usize = 32;

/// Symbol marking the runtime entry boundary (thread start, test harness).
/// Frames at and beyond it are dropped when skip-past-runtime is enabled.
const RUNTIME_BOUNDARY: &str = "__rust_begin_short_backtrace";

const UNKNOWN_FUNCTION: &str = "<unknown>";

// ============================================================================
// RawStack - address-only capture
// ============================================================================

/// Unresolved call stack: instruction pointers only, innermost first.
///
/// Capturing is cheap compared to resolution. No symbol lookup or file I/O
/// happens until [`resolve`](Self::resolve) is called.
#[derive(Clone, PartialEq, Eq)]
pub struct RawStack {
    addresses: Vec<usize>,
}

impl RawStack {
    /// Capture the current call stack, omitting the `skip` most recent callers.
    ///
    /// `capture(0)` starts at the function that called `capture`. The stack is
    /// read in fixed-size chunks, re-walking with a growing offset until a
    /// short read, so depth is unbounded.
    #[inline(never)]
    pub fn capture(skip: usize) -> RawStack {
        let mut addresses = Vec::new();
        let mut chunk = [0usize; CHUNK_LEN];
        // +1 for this frame
        let mut offset = skip + 1;
        loop {
            let read = callers(offset, &mut chunk);
            addresses.extend_from_slice(&chunk[..read]);
            if read < CHUNK_LEN {
                break;
            }
            offset += read;
        }
        RawStack { addresses }
    }

    /// Captured instruction pointers, innermost first.
    #[inline]
    pub fn addresses(&self) -> &[usize] {
        &self.addresses
    }

    /// Number of captured addresses.
    #[inline]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Check if nothing was captured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Resolve every address into a [`StackFrame`], preserving capture order.
    ///
    /// Uses the process-wide skip-past-runtime switch. Addresses without any
    /// symbol information are omitted.
    pub fn resolve(&self) -> Vec<StackFrame> {
        self.resolve_with(crate::policy::skip_past_runtime())
    }

    /// Like [`resolve`](Self::resolve) with an explicit runtime-boundary choice.
    pub fn resolve_with(&self, skip_past_runtime: bool) -> Vec<StackFrame> {
        let mut sources = SourceCache::default();
        let mut frames = Vec::with_capacity(self.addresses.len());
        for &ip in &self.addresses {
            if ip == 0 {
                continue;
            }
            let Some(symbol) = lookup(ip) else {
                continue;
            };
            if skip_past_runtime && symbol.function.contains(RUNTIME_BOUNDARY) {
                break;
            }
            let contents = match &symbol.file {
                Some(path) => sources.line(path, symbol.line),
                None => LineContents::FileNotFound,
            };
            frames.push(StackFrame {
                function: symbol.function,
                file: symbol.file.unwrap_or_default(),
                line: symbol.line,
                contents,
            });
        }
        log_resolved(self.addresses.len(), frames.len());
        frames
    }
}

impl fmt::Debug for RawStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawStack")
            .field("len", &self.addresses.len())
            .finish()
    }
}

#[cfg(feature = "log")]
fn log_resolved(captured: usize, resolved: usize) {
    log::trace!(target: "errchain", "resolved {resolved} of {captured} captured frames");
}

#[cfg(not(feature = "log"))]
fn log_resolved(_captured: usize, _resolved: usize) {}

// ============================================================================
// Stack walking
// ============================================================================

/// Fill `buf` with caller addresses, skipping `skip` frames after this one.
///
/// Returns the number of addresses written. A result shorter than `buf`
/// means the walk reached the outermost frame.
#[inline(never)]
fn callers(skip: usize, buf: &mut [usize]) -> usize {
    // Frames up to and including this one are dropped by matching its address.
    let this: fn(usize, &mut [usize]) -> usize = callers;
    match walk(Some(this as usize), skip, buf) {
        Some(read) => read,
        // No symbol addresses on this platform: count from the top instead
        None => walk(None, skip, buf).unwrap_or(0),
    }
}

/// Walk the stack once. Returns `None` if `anchor` was given but never seen.
fn walk(anchor: Option<usize>, skip: usize, buf: &mut [usize]) -> Option<usize> {
    let mut anchored = anchor.is_none();
    let mut skipped = 0;
    let mut read = 0;
    if buf.is_empty() {
        return Some(0);
    }
    backtrace::trace(|frame| {
        if !anchored {
            anchored = Some(frame.symbol_address() as usize) == anchor;
            return true;
        }
        if skipped < skip {
            skipped += 1;
            return true;
        }
        buf[read] = frame.ip() as usize;
        read += 1;
        read < buf.len()
    });
    anchored.then_some(read)
}

// ============================================================================
// Symbol lookup
// ============================================================================

struct Symbol {
    function: String,
    file: Option<PathBuf>,
    line: u32,
}

/// Resolve one address using its innermost (possibly inlined) symbol.
fn lookup(ip: usize) -> Option<Symbol> {
    let mut found = None;
    backtrace::resolve(ip as *mut c_void, |symbol| {
        if found.is_some() {
            return;
        }
        found = Some(Symbol {
            // {:#} drops the trailing ::h<hash>
            function: symbol
                .name()
                .map(|name| format!("{name:#}"))
                .unwrap_or_else(|| UNKNOWN_FUNCTION.into()),
            file: symbol.filename().map(Path::to_path_buf),
            line: symbol.lineno().unwrap_or(0),
        });
    });
    found
}

// ============================================================================
// Source lines
// ============================================================================

/// Source text for a frame, or why it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineContents {
    /// The source line with surrounding spaces and tabs trimmed.
    Text(String),
    /// The source file could not be read.
    FileNotFound,
    /// The file was read but has no such line.
    LineNotFound,
}

impl LineContents {
    /// Read a 1-based line from `file`.
    ///
    /// Never fails: an unreadable file or out-of-range line yields
    /// [`FileNotFound`](Self::FileNotFound) or [`LineNotFound`](Self::LineNotFound).
    pub fn read(file: &Path, line: u32) -> LineContents {
        match fs::read_to_string(file) {
            Ok(text) => line_of(&text, line),
            Err(_) => LineContents::FileNotFound,
        }
    }

    /// Get the source text, if it was found.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            LineContents::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for LineContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineContents::Text(text) => f.write_str(text),
            LineContents::FileNotFound => f.write_str("[file not found]"),
            LineContents::LineNotFound => f.write_str("[line not found]"),
        }
    }
}


fn line_of(text: &str, line: u32) -> LineContents {
    let Some(index) = (line as usize).checked_sub(1) else {
        return LineContents::LineNotFound;
    };
    match text.lines().nth(index) {
        Some(raw) => LineContents::Text(raw.trim_matches([' ', '\t']).into()),
        None => LineContents::LineNotFound,
    }
}

/// Per-resolution file cache so each source file is read once.
#[derive(Default)]
struct SourceCache {
    files: HashMap<PathBuf, Option<String>>,
}

impl SourceCache {
    fn line(&mut self, file: &Path, line: u32) -> LineContents {
        let text = self
            .files
            .entry(file.to_path_buf())
            .or_insert_with(|| fs::read_to_string(file).ok());
        match text {
            Some(text) => line_of(text, line),
            None => LineContents::FileNotFound,
        }
    }
}

// ============================================================================
// StackFrame - resolved location
// ============================================================================

/// A resolved call site: function, file, line, and source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    function: String,
    file: PathBuf,
    line: u32,
    contents: LineContents,
}

impl StackFrame {
    /// Demangled function name, without the symbol hash.
    #[inline]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Source file path as recorded in debug info.
    #[inline]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// 1-based line number, or 0 if unknown.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Source text at the line, or a not-found marker.
    #[inline]
    pub fn contents(&self) -> &LineContents {
        &self.contents
    }
}

/// Renders as `file:line function: contents`.
impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}: {}",
            self.file.display(),
            self.line,
            self.function,
            self.contents
        )
    }
}
