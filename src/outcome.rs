//! Outcome data model.
//!
//! A catch produces exactly one [`Outcome`]: the work item either ran to
//! completion or a panic unwound out of it and was intercepted. The panic is
//! described by a [`CaughtPanic`].

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Message used when a panic payload carries no readable text.
pub const UNKNOWN_PANIC_MESSAGE: &str = "unknown exception";

// ---------------------------------------------------------------------------
// Caught panic
// ---------------------------------------------------------------------------

/// Description of a panic intercepted at a catch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct CaughtPanic {
    /// The panic's message, passed through verbatim.
    pub message: String,

    /// Where the panic was raised. Only known when the crate's panic hook
    /// is installed (see [`crate::hook`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PanicLocation>,
}

impl CaughtPanic {
    /// Build a descriptor with a message and no location.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            UNKNOWN_PANIC_MESSAGE.to_string()
        } else {
            message
        };
        Self {
            message,
            location: None,
        }
    }

    /// Extract a descriptor from the payload handed back by `catch_unwind`.
    ///
    /// `panic!` produces either a `&'static str` or a `String`. Payloads
    /// raised with `std::panic::panic_any` may be anything; boxed errors are
    /// rendered through `Display`, everything else gets
    /// [`UNKNOWN_PANIC_MESSAGE`].
    ///
    /// The payload is dropped behind its own catch, since a payload type may
    /// panic in `Drop`.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload_message(payload.as_ref());
        drop_payload(payload);
        Self::new(message)
    }

    pub fn with_location(mut self, location: Option<PanicLocation>) -> Self {
        self.location = location;
        self
    }
}

/// Source position of a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl From<&std::panic::Location<'_>> for PanicLocation {
    fn from(loc: &std::panic::Location<'_>) -> Self {
        Self {
            file: loc.file().to_string(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for PanicLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Readable text of a panic payload, or [`UNKNOWN_PANIC_MESSAGE`].
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(err) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        err.to_string()
    } else {
        String::new()
    };
    if message.is_empty() {
        UNKNOWN_PANIC_MESSAGE.to_string()
    } else {
        message
    }
}

fn drop_payload(payload: Box<dyn Any + Send>) {
    if let Err(nested) = panic::catch_unwind(AssertUnwindSafe(move || drop(payload))) {
        // Its payload could panic on drop as well.
        std::mem::forget(nested);
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of running one work item behind a catch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeRecord", into = "OutcomeRecord")]
pub enum Outcome {
    Success,
    Failure(CaughtPanic),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// The intercepted panic, if the work item failed.
    pub fn error(&self) -> Option<&CaughtPanic> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<(), CaughtPanic> {
        self.into()
    }
}

impl From<Result<(), CaughtPanic>> for Outcome {
    fn from(result: Result<(), CaughtPanic>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(err) => Outcome::Failure(err),
        }
    }
}

impl From<Outcome> for Result<(), CaughtPanic> {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failure(err) => Err(err),
        }
    }
}

/// Flat wire shape: `{"success": bool, "error": {...} | null}`.
///
/// A success carrying an error is rejected. A failure without one gets the
/// placeholder message.
#[derive(Serialize, Deserialize)]
struct OutcomeRecord {
    success: bool,
    #[serde(default)]
    error: Option<CaughtPanic>,
}

impl From<Outcome> for OutcomeRecord {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self {
                success: true,
                error: None,
            },
            Outcome::Failure(err) => Self {
                success: false,
                error: Some(err),
            },
        }
    }
}

impl TryFrom<OutcomeRecord> for Outcome {
    type Error = String;

    fn try_from(record: OutcomeRecord) -> Result<Self, Self::Error> {
        match (record.success, record.error) {
            (true, None) => Ok(Outcome::Success),
            (true, Some(err)) => Err(format!(
                "outcome marked successful but carries error '{}'",
                err.message
            )),
            (false, Some(err)) => Ok(Outcome::Failure(err)),
            (false, None) => Ok(Outcome::Failure(CaughtPanic::new(UNKNOWN_PANIC_MESSAGE))),
        }
    }
}
