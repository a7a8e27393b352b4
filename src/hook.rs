//! Process-wide panic hook for catch scopes.
//!
//! Rust's default hook prints every panic to stderr, including panics that a
//! catch boundary is about to absorb. Installing this hook lets catch scopes
//! keep that output quiet and record where the panic was raised. Panics
//! outside a catch scope still go to the previously installed hook.
//!
//! A panic raised while an earlier panic in the same scope is still
//! unwinding (a destructor panicking during cleanup) aborts the process, so
//! the hook never silences it: the earlier panic is written to stderr and
//! the new one goes to the previous hook.
//!
//! Installation is opt-in and happens at most once per process. Scope
//! bookkeeping is per thread.

use crate::error::Error;
use crate::outcome::{PanicLocation, payload_message};
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::io::Write as _;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

static INSTALL: Once = Once::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);
static QUIET: AtomicBool = AtomicBool::new(true);

thread_local! {
    static SCOPE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static IN_FLIGHT: RefCell<Option<RecordedPanic>> = const { RefCell::new(None) };
}

/// What the hook does with panics raised inside a catch scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookMode {
    /// Record the location, print nothing.
    #[default]
    Quiet,
    /// Record the location and forward to the previous hook.
    Passthrough,
}

impl FromStr for HookMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(HookMode::Quiet),
            "passthrough" => Ok(HookMode::Passthrough),
            other => Err(Error::Config(format!(
                "invalid hook mode '{other}' (expected 'quiet' or 'passthrough')"
            ))),
        }
    }
}

/// Install the catch-scope hook, or update its mode if already installed.
///
/// The hook that was active at first install is kept and still receives
/// every panic raised outside a catch scope.
pub fn install(mode: HookMode) {
    QUIET.store(mode == HookMode::Quiet, Ordering::SeqCst);

    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if in_scope() {
                let recorded = RecordedPanic {
                    message: payload_message(info.payload()),
                    location: info.location().map(PanicLocation::from),
                };
                match record(recorded) {
                    None if QUIET.load(Ordering::SeqCst) => return,
                    None => {}
                    Some(earlier) => report_fatal(&earlier),
                }
            }
            previous(info);
        }));
        INSTALLED.store(true, Ordering::SeqCst);
        tracing::debug!(?mode, "catch-scope panic hook installed");
    });
}

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

fn in_scope() -> bool {
    // try_with: the hook may run while thread-locals are being torn down.
    SCOPE_DEPTH.try_with(|depth| depth.get() > 0).unwrap_or(false)
}

/// A panic the hook saw inside a catch scope, not yet claimed by its catch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedPanic {
    message: String,
    location: Option<PanicLocation>,
}

impl RecordedPanic {
    /// The location, if this record belongs to the panic that was caught.
    ///
    /// `resume_unwind` skips the hook, so a caught payload can differ from
    /// the last panic the hook saw.
    pub(crate) fn location_for(self, message: &str) -> Option<PanicLocation> {
        if self.message == message {
            self.location
        } else {
            None
        }
    }
}

/// Store `recorded` as the in-flight panic. If one is already in flight,
/// keep it and hand it back.
fn record(recorded: RecordedPanic) -> Option<RecordedPanic> {
    IN_FLIGHT
        .try_with(|slot| {
            let mut slot = slot.try_borrow_mut().ok()?;
            match slot.as_ref() {
                Some(earlier) => Some(earlier.clone()),
                None => {
                    *slot = Some(recorded);
                    None
                }
            }
        })
        .ok()
        .flatten()
}

fn report_fatal(earlier: &RecordedPanic) {
    let location = earlier
        .location
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown location".to_string());
    let _ = writeln!(
        std::io::stderr(),
        "panic while unwinding from earlier panic '{}' at {location}; it cannot be caught",
        earlier.message
    );
}

/// Marks the current thread as inside a catch scope until dropped.
pub(crate) struct Scope {
    // The enclosing scope's in-flight panic, put back on exit.
    saved: Option<RecordedPanic>,
    // Tied to the thread whose counters it bumped.
    _not_send: PhantomData<*const ()>,
}

impl Scope {
    pub(crate) fn enter() -> Self {
        let outer_depth = SCOPE_DEPTH.with(|depth| {
            let outer = depth.get();
            depth.set(outer + 1);
            outer
        });
        let saved = IN_FLIGHT.with(|slot| slot.borrow_mut().take());
        Self {
            saved: if outer_depth > 0 { saved } else { None },
            _not_send: PhantomData,
        }
    }

    /// Claim the panic the hook recorded in this scope, if any.
    pub(crate) fn take_recorded(&self) -> Option<RecordedPanic> {
        IN_FLIGHT.with(|slot| slot.borrow_mut().take())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let saved = self.saved.take();
        let _ = IN_FLIGHT.try_with(|slot| {
            if let Ok(mut slot) = slot.try_borrow_mut() {
                *slot = saved;
            }
        });
        let _ = SCOPE_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_mode_parses_case_insensitively() {
        assert_eq!("quiet".parse::<HookMode>().unwrap(), HookMode::Quiet);
        assert_eq!(
            " Passthrough ".parse::<HookMode>().unwrap(),
            HookMode::Passthrough
        );
    }

    #[test]
    fn hook_mode_rejects_unknown_values() {
        let err = "loud".parse::<HookMode>().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("loud")));
    }

    #[test]
    fn scopes_nest_and_unwind() {
        assert!(!in_scope());
        {
            let _outer = Scope::enter();
            assert!(in_scope());
            {
                let _inner = Scope::enter();
                assert!(in_scope());
            }
            assert!(in_scope());
        }
        assert!(!in_scope());
    }

    fn recorded(message: &str, line: u32) -> RecordedPanic {
        RecordedPanic {
            message: message.to_string(),
            location: Some(PanicLocation {
                file: "src/work.rs".to_string(),
                line,
                column: 1,
            }),
        }
    }

    #[test]
    fn entering_a_scope_clears_stale_record() {
        {
            let _scope = Scope::enter();
            assert_eq!(record(recorded("stale", 1)), None);
        }
        let scope = Scope::enter();
        assert!(scope.take_recorded().is_none());
    }

    #[test]
    fn second_record_keeps_the_in_flight_panic() {
        let scope = Scope::enter();
        assert_eq!(record(recorded("first", 1)), None);
        assert_eq!(record(recorded("second", 2)), Some(recorded("first", 1)));
        assert_eq!(scope.take_recorded(), Some(recorded("first", 1)));
    }

    #[test]
    fn inner_scope_restores_the_outer_record() {
        let outer = Scope::enter();
        assert_eq!(record(recorded("outer", 1)), None);
        {
            let inner = Scope::enter();
            assert!(inner.take_recorded().is_none());
            assert_eq!(record(recorded("inner", 2)), None);
        }
        assert_eq!(outer.take_recorded(), Some(recorded("outer", 1)));
    }

    #[test]
    fn location_requires_matching_message() {
        assert_eq!(recorded("boom", 7).location_for("boom").map(|l| l.line), Some(7));
        assert!(recorded("swallowed", 7).location_for("resumed").is_none());
    }
}
