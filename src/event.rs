//! Runtime events for monitoring stream health.
//!
//! Events are non-fatal notifications. Audio continues on the remaining
//! healthy sinks after any event is emitted - they exist for logging and
//! metrics, not error handling.

use std::sync::Arc;

use crate::sink::SinkId;

/// Runtime events emitted by the output engine.
///
/// These are informational: the stream keeps running after every one of
/// them. Register an [`EventCallback`] via
/// [`AudioDeviceBuilder::on_event()`](crate::AudioDeviceBuilder::on_event)
/// to log them or update metrics.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A sink refused to open during reconciliation.
    ///
    /// The sink stays dark until the next reconciliation; audio continues
    /// on the sinks that did open.
    SinkOpenFailed {
        /// Index of the sink that failed.
        sink: SinkId,
        /// Driver name, for logging.
        sink_name: String,
        /// Description of the failure.
        error: String,
    },

    /// A write to an open sink failed.
    ///
    /// The handle is left open and retried next period; a persistently
    /// broken sink is cleaned up by the next reconciliation or standby.
    SinkWriteFailed {
        /// Index of the sink that failed.
        sink: SinkId,
        /// Driver name, for logging.
        sink_name: String,
        /// Description of the failure.
        error: String,
    },

    /// A sink enablement change was applied to the stream.
    ///
    /// Emitted after the stream re-reconciled its handles in response to
    /// the change counter advancing.
    EnablementApplied {
        /// The change-counter value the stream caught up to.
        counter: u64,
    },

    /// Pacing was abandoned for one write because the reference sink's
    /// play pointer could not be read.
    ///
    /// Better to risk a glitch than to hang on a dead sink.
    PacingSkipped {
        /// Index of the reference sink.
        sink: SinkId,
    },
}

/// Callback type for receiving runtime events.
pub type EventCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use fanout_audio::{event_callback, StreamEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(StreamEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_debug() {
        let event = StreamEvent::EnablementApplied { counter: 3 };
        let debug = format!("{event:?}");
        assert!(debug.contains("EnablementApplied"));
        assert!(debug.contains('3'));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(StreamEvent::EnablementApplied { counter: 0 });
        assert!(called.load(Ordering::SeqCst));
    }
}
