//! # exception-catcher
//!
//! Run a closure and turn any panic it raises into an ordinary value.
//!
//! ```
//! use exception_catcher::{execute, execute_with_error};
//!
//! assert!(execute(|| {}));
//!
//! let err = execute_with_error(|| panic!("boom")).unwrap_err();
//! assert_eq!(err.message, "boom");
//! ```
//!
//! Optional pieces: a panic hook that silences and locates panics inside
//! catch scopes ([`hook`]), env/TOML configuration ([`config`]), and a
//! tracing subscriber setup ([`telemetry`]).

pub mod catcher;
pub mod config;
pub mod error;
pub mod hook;
pub mod outcome;
pub mod telemetry;

pub use catcher::{ExceptionCatcher, catch, execute, execute_with_error, run};
pub use outcome::{CaughtPanic, Outcome, PanicLocation};
