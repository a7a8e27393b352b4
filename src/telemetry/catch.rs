//! Catch-boundary span helpers.
//!
//! Every catch runs inside a `catcher.execute` span. The `catcher.outcome`
//! field is declared empty and filled in by [`record_outcome`].

use crate::outcome::CaughtPanic;
use tracing::Span;

/// Start a span for one catch boundary.
pub fn start_catch_span(label: &str) -> Span {
    tracing::debug_span!(
        "catcher.execute",
        "catcher.label" = label,
        "catcher.outcome" = tracing::field::Empty,
    )
}

/// Record how the work item ended.
///
/// An intercepted panic also emits a `warn` event scoped to the span.
pub fn record_outcome(span: &Span, error: Option<&CaughtPanic>) {
    match error {
        None => {
            span.record("catcher.outcome", "success");
        }
        Some(err) => {
            span.record("catcher.outcome", "failure");
            let location = err
                .location
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string());
            span.in_scope(|| {
                tracing::warn!(
                    panic.message = %err.message,
                    panic.location = %location,
                    "panic intercepted"
                );
            });
        }
    }
}
