//! Unit tests for errchain.
//!
//! These tests live in `src/` to reach `pub(crate)` items like `Chain::push`
//! and `context::split`.

use crate::context::split;
use crate::{
    Chain, LineContents, Message, Policy, RawStack, ResultChainExt, STACK_SEPARATOR, errorf, wrap,
    wrap_context, wrapf,
};
use core::fmt;
use std::cell::Cell;
use std::error::Error;
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug, PartialEq, Eq)]
enum TestError {
    NotFound,
    InvalidInput,
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::NotFound => write!(f, "not found"),
            TestError::InvalidInput => write!(f, "invalid input"),
        }
    }
}

impl Error for TestError {}

static_assertions::assert_impl_all!(Chain: Send, Sync, Clone, Error);
static_assertions::assert_impl_all!(Message: Send, Sync, Clone, Error);

fn messages(chain: &Chain) -> Vec<String> {
    chain.causes().iter().map(|c| c.to_string()).collect()
}

// ============================================================================
// Wrapping
// ============================================================================

#[test]
fn wrap_plain_error_has_single_cause() {
    let err = wrap(TestError::NotFound);
    assert_eq!(messages(&err), vec!["not found"]);
    assert_eq!(
        err.first().downcast_ref::<TestError>(),
        Some(&TestError::NotFound)
    );
    assert_eq!(err.message(), "not found");
}

#[test]
fn wrap_of_chain_is_identity() {
    let err = wrap(TestError::NotFound);
    let again = wrap(err.clone());
    assert!(Chain::ptr_eq(&err, &again));
    assert_eq!(again.cause_count(), 1);
    assert_eq!(again.raw_stack(), err.raw_stack());
}

#[test]
fn wrap_context_appends_after_root() {
    let err = wrap_context(TestError::InvalidInput, "err 1 2 4");
    assert_eq!(messages(&err), vec!["invalid input", "err 1 2 4"]);
    assert_eq!(err.first().to_string(), "invalid input");
    assert_eq!(err.last().to_string(), "err 1 2 4");
    assert!(err.last().downcast_ref::<Message>().is_some());
}

#[test]
fn message_joins_newest_first() {
    let err = wrap_context(TestError::NotFound, "reading user");
    err.annotate("handling request");
    assert_eq!(
        err.message(),
        "handling request: reading user: not found"
    );
}

#[test]
fn rewrap_with_context_extends_in_place() {
    let err = wrap(TestError::NotFound);
    let stack = err.raw_stack().clone();

    let extended = wrap_context(err.clone(), "step one");
    let extended = wrap_context(extended, "step two");

    assert!(Chain::ptr_eq(&err, &extended));
    assert_eq!(err.cause_count(), 3);
    assert_eq!(extended.raw_stack(), &stack);
    assert_eq!(err.message(), "step two: step one: not found");
}

#[test]
fn errorf_formats_root_message() {
    let err = errorf!("err {} {} {}", 1, 2, 4);
    assert_eq!(messages(&err), vec!["err 1 2 4"]);
    assert_eq!(
        err.first().downcast_ref::<Message>().map(Message::as_str),
        Some("err 1 2 4")
    );
}

#[test]
fn errorf_always_creates_new_chain() {
    let a = errorf!("same");
    let b = errorf!("same");
    assert!(!Chain::ptr_eq(&a, &b));
}

#[test]
fn last_is_root_without_context() {
    let err = wrap(TestError::NotFound);
    assert_eq!(err.last().to_string(), "not found");
}

#[test]
fn root_as_downcasts_root_only() {
    let err = wrap_context(TestError::NotFound, "context");
    assert_eq!(err.root_as::<TestError>(), Some(&TestError::NotFound));
    assert!(err.root_as::<Message>().is_none());
}

#[test]
fn split_detects_chain_through_box() {
    let err = errorf!("boxed");
    let boxed: Box<dyn Error + Send + Sync> = Box::new(err.clone());
    let back = split(boxed).expect("chain should be recognized");
    assert!(Chain::ptr_eq(&err, &back));

    let plain: Box<dyn Error + Send + Sync> = Box::new(TestError::NotFound);
    assert!(split(plain).is_err());
}

#[test]
fn wraps_strings() {
    let err = wrap("plain text");
    assert_eq!(err.message(), "plain text");
    let err = wrap(String::from("owned text"));
    assert_eq!(err.message(), "owned text");
}

// ============================================================================
// Result extension
// ============================================================================

#[test]
fn ok_passes_through_wrap() {
    let ok: Result<u32, TestError> = Ok(5);
    assert_eq!(ok.wrap().unwrap(), 5);
}

#[test]
fn ok_skips_message_formatting() {
    let calls = Cell::new(0);
    let bump = || {
        calls.set(calls.get() + 1);
        "x"
    };

    let ok: Result<(), TestError> = Ok(());
    let result = wrapf!(ok, "message {}", bump());
    assert!(result.is_ok());
    assert_eq!(calls.get(), 0);

    let err: Result<(), TestError> = Err(TestError::NotFound);
    let result = wrapf!(err, "message {}", bump());
    assert_eq!(calls.get(), 1);
    assert_eq!(result.unwrap_err().message(), "message x: not found");
}

#[test]
fn wrapf_formats_context() {
    let err: Result<(), TestError> = Err(TestError::InvalidInput);
    let chain = wrapf!(err, "err {} {} {}", 1, 2, 4).unwrap_err();
    assert_eq!(messages(&chain), vec!["invalid input", "err 1 2 4"]);
    assert!(chain.message().starts_with("err 1 2 4: invalid input"));
}

#[test]
fn result_wrap_of_chain_is_identity() {
    let err = errorf!("root");
    let result: Result<(), Chain> = Err(err.clone());
    let wrapped = result.wrap().unwrap_err();
    assert!(Chain::ptr_eq(&err, &wrapped));
}

#[test]
fn wrap_with_on_chain_appends() {
    let err = errorf!("root");
    let result: Result<(), Chain> = Err(err.clone());
    let wrapped = result.wrap_with(|| "outer").unwrap_err();
    assert!(Chain::ptr_eq(&err, &wrapped));
    assert_eq!(err.message(), "outer: root");
}

// ============================================================================
// Stack capture
// ============================================================================

#[test]
fn stack_starts_at_caller() {
    let err = wrap(TestError::NotFound);
    let stack = err.stack();
    let parts: Vec<&str> = stack.split(STACK_SEPARATOR).collect();
    assert!(!parts.is_empty());
    assert!(parts.iter().all(|p| !p.is_empty()), "empty frame in {stack}");
    assert!(
        parts[0].contains("stack_starts_at_caller: "),
        "first frame should be this test, got {}",
        parts[0]
    );
    assert!(!parts[0].contains("errchain::wrap"));
}

#[test]
fn every_entry_point_starts_at_caller() {
    let ok_err: Result<(), TestError> = Err(TestError::NotFound);
    let chains = [
        wrap(TestError::NotFound),
        wrap_context(TestError::NotFound, "ctx"),
        errorf!("formatted"),
        Chain::msg("plain"),
        ok_err.wrap().unwrap_err(),
        wrapf!(Err::<(), _>(TestError::NotFound), "ctx").unwrap_err(),
    ];
    for chain in &chains {
        let first = chain.frames().first().expect("frames should be captured");
        assert!(
            first.function().contains("every_entry_point_starts_at_caller"),
            "got {}",
            first
        );
        assert!(first.file().ends_with("tests.rs"), "got {}", first);
    }
}

#[test]
fn frame_source_line_is_trimmed_call_site() {
    let err = errorf!("source line");
    let first = &err.frames()[0];
    assert_eq!(
        first.contents().as_text(),
        Some(r#"let err = errorf!("source line");"#)
    );
}

#[inline(never)]
fn nested(calls: u32) -> Chain {
    if calls == 0 {
        return errorf!("nested");
    }
    let chain = nested(calls - 1);
    std::hint::black_box(chain)
}

#[test]
fn deep_recursion_captures_every_frame() {
    const CALLS: usize = 200;
    let err = nested(CALLS as u32);
    assert!(err.raw_stack().len() > CALLS);
    let parts: Vec<String> = err.stack().split(STACK_SEPARATOR).map(String::from).collect();
    assert!(
        parts.len() >= CALLS,
        "expected at least {CALLS} frames, got {}",
        parts.len()
    );
    let nested_frames = err
        .frames()
        .iter()
        .filter(|f| f.function().ends_with("::nested"))
        .count();
    assert_eq!(nested_frames, CALLS + 1);
}

#[inline(never)]
fn make_root() -> Chain {
    wrap(TestError::NotFound)
}

#[inline(never)]
fn rewrap(err: Chain) -> Chain {
    let result: Result<(), Chain> = Err(err);
    wrapf!(result, "rewrapped in {}", "rewrap").unwrap_err()
}

#[test]
fn rewrap_keeps_original_stack() {
    let err = make_root();
    let count = err.frames().len();

    let again = rewrap(err.clone());
    assert_eq!(again.frames().len(), count);
    assert!(again.frames()[0].function().ends_with("make_root"));
    assert_eq!(again.message(), "rewrapped in rewrap: not found");
}

#[test]
fn frames_are_resolved_once() {
    let err = wrap(TestError::NotFound);
    let first = err.frames().as_ptr();
    let second = err.clone().frames().as_ptr();
    assert!(core::ptr::eq(first, second));
}

#[test]
fn runtime_boundary_truncates_resolution() {
    let stack = RawStack::capture(0);
    let bounded = stack.resolve_with(true);
    let full = stack.resolve_with(false);
    assert!(full.len() >= bounded.len());
    assert!(
        bounded
            .iter()
            .all(|f| !f.function().contains("__rust_begin_short_backtrace"))
    );
    assert!(bounded[0].function().ends_with("runtime_boundary_truncates_resolution"));
}

#[test]
fn capture_skip_drops_callers() {
    #[inline(never)]
    fn helper() -> RawStack {
        RawStack::capture(1)
    }
    let frames = helper().resolve_with(true);
    assert!(
        frames[0]
            .function()
            .ends_with("capture_skip_drops_callers")
    );
}

// ============================================================================
// Source lines
// ============================================================================

#[test]
fn line_contents_reads_and_trims() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "first\n\t  second line \t\nthird").unwrap();

    let path = file.path();
    assert_eq!(
        LineContents::read(path, 2),
        LineContents::Text("second line".into())
    );
    assert_eq!(LineContents::read(path, 3).as_text(), Some("third"));
    assert_eq!(LineContents::read(path, 4), LineContents::LineNotFound);
    assert_eq!(LineContents::read(path, 0), LineContents::LineNotFound);
}

#[test]
fn missing_file_is_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.rs");
    let contents = LineContents::read(&missing, 1);
    assert_eq!(contents, LineContents::FileNotFound);
    assert_eq!(contents.to_string(), "[file not found]");
    assert_eq!(LineContents::LineNotFound.to_string(), "[line not found]");
}

// ============================================================================
// Formatting
// ============================================================================

#[test]
fn display_without_stack_is_message() {
    let err = wrap_context(TestError::NotFound, "loading");
    let out = err.display_with(Policy::new().include_stack(false)).to_string();
    assert_eq!(out, "loading: not found");
}

#[test]
fn display_with_stack_appends_separator_and_stack() {
    let err = wrap(TestError::NotFound);
    let out = err.display_with(Policy::new()).to_string();
    assert_eq!(out, format!("not found{}{}", STACK_SEPARATOR, err.stack()));
}

#[test]
fn sink_receives_report_per_format() {
    let seen = Mutex::new(Vec::new());
    let sink = |report: &str| seen.lock().unwrap().push(report.to_owned());

    let err = wrap_context(TestError::NotFound, "ctx");
    let policy = Policy::new().include_stack(false).sink(&sink);
    let _ = err.display_with(policy).to_string();
    let _ = err.display_with(policy).to_string();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], err.report());
}

#[test]
fn report_lists_frames_indented() {
    let err = errorf!("report me");
    let report = err.report();
    let mut lines = report.lines();
    assert_eq!(lines.next(), Some("report me"));

    let location = lines.next().unwrap();
    assert!(location.starts_with("  ") && !location.starts_with("   "));
    assert!(location.contains("tests.rs:"));

    let function = lines.next().unwrap();
    assert!(function.starts_with("    "));
    assert!(function.contains("report_lists_frames_indented: "));
    assert_eq!(report.lines().count(), 1 + 2 * err.frames().len());
}

#[test]
fn debug_output_has_header_and_locations() {
    let err = errorf!("debug me");
    let out = format!("{:?}", err);
    assert!(out.starts_with("Error: debug me\n"), "got:\n{out}");
    assert!(out.contains("    at "), "got:\n{out}");
    assert!(out.contains("       ╰─ "), "got:\n{out}");
}

#[test]
fn frame_display_format() {
    let err = errorf!("frame");
    let frame = &err.frames()[0];
    let expected = format!(
        "{}:{} {}: {}",
        frame.file().display(),
        frame.line(),
        frame.function(),
        frame.contents()
    );
    assert_eq!(frame.to_string(), expected);
}

#[test]
fn source_is_none() {
    let err = wrap(TestError::NotFound);
    assert!(err.source().is_none());
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn concurrent_annotate_and_resolve() {
    let err = errorf!("shared");
    std::thread::scope(|s| {
        for i in 0..8 {
            let err = err.clone();
            s.spawn(move || {
                err.annotate(format!("thread {i}"));
                assert!(!err.frames().is_empty());
            });
        }
    });
    assert_eq!(err.cause_count(), 9);
    assert_eq!(err.first().to_string(), "shared");
}
