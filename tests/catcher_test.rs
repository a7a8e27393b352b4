//! Integration tests for the catch boundary.
//!
//! The crate's panic hook is never installed in this binary, so locations
//! are always absent here.

use exception_catcher::error::{Error, Result};
use exception_catcher::outcome::UNKNOWN_PANIC_MESSAGE;
use exception_catcher::{ExceptionCatcher, Outcome, catch, execute, execute_with_error, run};
use std::sync::{Arc, Barrier};
use std::thread;

// ---------------------------------------------------------------------------
// Basic outcomes
// ---------------------------------------------------------------------------

#[test]
fn normal_return_reports_success() {
    let mut total = 0;
    assert!(execute(|| total += 5));
    assert_eq!(total, 5);

    assert_eq!(execute_with_error(|| {}), Ok(()));
    assert_eq!(run(|| {}), Outcome::Success);
}

#[test]
fn panic_with_message_reports_failure() {
    assert!(!execute(|| panic!("boom")));

    let err = execute_with_error(|| panic!("boom")).unwrap_err();
    assert_eq!(err.message, "boom");
    assert!(err.location.is_none());

    match run(|| panic!("boom")) {
        Outcome::Failure(err) => assert_eq!(err.message, "boom"),
        Outcome::Success => panic!("expected Failure, got Success"),
    }
}

#[test]
fn panic_without_message_reports_placeholder() {
    let err = execute_with_error(|| std::panic::panic_any(())).unwrap_err();
    assert_eq!(err.message, UNKNOWN_PANIC_MESSAGE);

    let err = execute_with_error(|| panic!("")).unwrap_err();
    assert_eq!(err.message, UNKNOWN_PANIC_MESSAGE);
}

#[test]
fn runtime_panics_are_intercepted() {
    let values: Vec<u32> = vec![1, 2, 3];
    let index = values.len();
    let err = execute_with_error(|| {
        let value = values[index];
        assert!(value > 0);
    })
    .unwrap_err();
    assert!(err.message.contains("index out of bounds"));

    let none: Option<u8> = None;
    assert!(!execute(|| {
        none.unwrap();
    }));
}

#[test]
fn work_that_handles_its_own_errors_succeeds() {
    assert!(execute(|| {
        let parsed: std::result::Result<u8, _> = "not a number".parse::<u8>();
        assert!(parsed.is_err());
    }));
}

// ---------------------------------------------------------------------------
// Nesting and independence
// ---------------------------------------------------------------------------

#[test]
fn nested_inner_panic_does_not_escape() {
    let mut inner_result = None;
    let outer = execute(|| {
        inner_result = Some(execute(|| panic!("inner")));
    });
    assert!(outer);
    assert_eq!(inner_result, Some(false));
}

#[test]
fn nested_outer_panic_after_inner_success() {
    let err = execute_with_error(|| {
        assert!(execute(|| {}));
        panic!("outer");
    })
    .unwrap_err();
    assert_eq!(err.message, "outer");
}

#[test]
fn sequential_calls_do_not_leak_state() {
    let catcher = ExceptionCatcher::new();
    assert!(!catcher.execute(|| panic!("first")));
    assert!(catcher.execute(|| {}));
    assert_eq!(
        catcher.execute_with_error(|| panic!("third")).unwrap_err().message,
        "third"
    );
    assert_eq!(catcher.execute_with_error(|| {}), Ok(()));
}

#[test]
fn concurrent_calls_report_their_own_outcome() {
    const THREADS: usize = 8;
    let catcher = ExceptionCatcher::labeled("concurrent");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                catcher.execute_with_error(|| {
                    if i % 2 == 1 {
                        panic!("thread {i} failed");
                    }
                })
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.join().expect("catcher must not let panics escape");
        if i % 2 == 1 {
            assert_eq!(result.unwrap_err().message, format!("thread {i} failed"));
        } else {
            assert_eq!(result, Ok(()));
        }
    }
}

// ---------------------------------------------------------------------------
// Value-returning form and error conversion
// ---------------------------------------------------------------------------

#[test]
fn catch_passes_values_through() {
    let name = String::from("helium");
    assert_eq!(catch(|| name.len()), Ok(6));
}

fn checked_divide(a: u32, b: u32) -> Result<u32> {
    Ok(catch(|| a / b)?)
}

#[test]
fn caught_panic_converts_into_crate_error() {
    assert_eq!(checked_divide(10, 2).unwrap(), 5);

    let err = checked_divide(1, 0).unwrap_err();
    assert!(matches!(&err, Error::Caught(caught) if caught.message.contains("divide by zero")));
    assert!(err.to_string().starts_with("work item panicked: "));
}

// ---------------------------------------------------------------------------
// Reporting shape
// ---------------------------------------------------------------------------

#[test]
fn outcome_serializes_as_success_flag_and_error() {
    let json = serde_json::to_value(run(|| {})).unwrap();
    assert_eq!(json, serde_json::json!({"success": true, "error": null}));

    let json = serde_json::to_value(run(|| panic!("boom"))).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"success": false, "error": {"message": "boom"}})
    );

    let back: Outcome = serde_json::from_value(json).unwrap();
    assert_eq!(back.error().map(|e| e.message.as_str()), Some("boom"));
}

// ---------------------------------------------------------------------------
// Payloads that panic on drop
// ---------------------------------------------------------------------------

struct PanicsOnDrop;

impl Drop for PanicsOnDrop {
    fn drop(&mut self) {
        panic!("payload dropped");
    }
}

#[test]
fn payload_panicking_on_drop_stays_inside_the_boundary() {
    let escaped = std::panic::catch_unwind(|| {
        assert!(!execute(|| std::panic::panic_any(PanicsOnDrop)));
        execute_with_error(|| std::panic::panic_any(PanicsOnDrop)).unwrap_err()
    });

    let err = escaped.expect("panic escaped the catch boundary");
    assert_eq!(err.message, UNKNOWN_PANIC_MESSAGE);
}
