//! The catch boundary.
//!
//! [`ExceptionCatcher`] runs a work item once, synchronously, on the calling
//! thread. A panic that unwinds out of the work item is intercepted here and
//! turned into a value; it never propagates past the boundary.
//!
//! Work items are taken by value without a `'static` bound. They may borrow
//! from the caller and are consumed by the call, so nothing can hold on to
//! them afterwards.
//!
//! Interception relies on unwinding. A binary built with `panic = "abort"`
//! terminates before any catch can happen.

use crate::hook::Scope;
use crate::outcome::{CaughtPanic, Outcome};
use crate::telemetry::catch::{record_outcome, start_catch_span};
use std::panic::{self, AssertUnwindSafe};

const DEFAULT_LABEL: &str = "anonymous";

/// Runs work items behind a panic boundary.
///
/// Holds no state between calls beyond a label used in log output, so one
/// catcher can be shared freely across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionCatcher {
    label: &'static str,
}

impl Default for ExceptionCatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ExceptionCatcher {
    pub const fn new() -> Self {
        Self {
            label: DEFAULT_LABEL,
        }
    }

    /// A catcher whose spans and events carry `label`, to tell call sites
    /// apart in logs.
    pub const fn labeled(label: &'static str) -> Self {
        Self { label }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Run `work` and hand back its value, or the panic that interrupted it.
    pub fn catch<T>(&self, work: impl FnOnce() -> T) -> Result<T, CaughtPanic> {
        let span = start_catch_span(self.label);

        let scope = Scope::enter();
        // The work item is consumed here; whatever state it touched stays
        // with the caller to judge.
        let result = span.in_scope(|| panic::catch_unwind(AssertUnwindSafe(work)));
        let result = result.map_err(|payload| {
            // Claim the hook's record before the payload is dropped; that
            // drop may panic and be seen by the hook as well.
            let recorded = scope.take_recorded();
            let caught = CaughtPanic::from_payload(payload);
            let location = recorded.and_then(|r| r.location_for(&caught.message));
            caught.with_location(location)
        });
        drop(scope);

        record_outcome(&span, result.as_ref().err());
        result
    }

    /// Run `work`, reporting `Err` with the panic's description if it
    /// panicked.
    ///
    /// Callers that only need the boolean can use [`execute`](Self::execute)
    /// or call `.is_ok()` on the result.
    pub fn execute_with_error(&self, work: impl FnOnce()) -> Result<(), CaughtPanic> {
        self.catch(work)
    }

    /// Run `work`; `true` if it returned normally, `false` if it panicked.
    pub fn execute(&self, work: impl FnOnce()) -> bool {
        self.execute_with_error(work).is_ok()
    }

    /// Run `work` and report the tagged [`Outcome`].
    pub fn run(&self, work: impl FnOnce()) -> Outcome {
        self.execute_with_error(work).into()
    }
}

/// [`ExceptionCatcher::execute`] with the default catcher.
pub fn execute(work: impl FnOnce()) -> bool {
    ExceptionCatcher::new().execute(work)
}

/// [`ExceptionCatcher::execute_with_error`] with the default catcher.
pub fn execute_with_error(work: impl FnOnce()) -> Result<(), CaughtPanic> {
    ExceptionCatcher::new().execute_with_error(work)
}

/// [`ExceptionCatcher::catch`] with the default catcher.
pub fn catch<T>(work: impl FnOnce() -> T) -> Result<T, CaughtPanic> {
    ExceptionCatcher::new().catch(work)
}

/// [`ExceptionCatcher::run`] with the default catcher.
pub fn run(work: impl FnOnce()) -> Outcome {
    ExceptionCatcher::new().run(work)
}
