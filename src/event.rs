//! Runtime events for monitoring the engine.
//!
//! Events are non-fatal notifications. The engine keeps running after any of
//! them; they exist for logging and UI status, not error handling.

use std::sync::Arc;

use crate::config::Destination;
use crate::error::{StreamError, StreamRole};

/// Runtime events emitted by the [`AudioEngine`](crate::AudioEngine).
///
/// # Example
///
/// ```
/// use split_audio::EngineEvent;
///
/// fn handle_event(event: EngineEvent) {
///     match event {
///         EngineEvent::Started => eprintln!("engine running"),
///         EngineEvent::Stopped => eprintln!("engine stopped"),
///         EngineEvent::BlockDropped { destination, error } => {
///             eprintln!("{destination}: lost a block ({error})");
///         }
///         EngineEvent::StopFailed { role, error } => {
///             eprintln!("{role} did not shut down cleanly: {error}");
///         }
///         EngineEvent::DelayResized { destination, from_blocks, to_blocks } => {
///             eprintln!("{destination}: delay {from_blocks} -> {to_blocks} blocks");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// All three streams are open and started.
    Started,

    /// The engine stopped; every stream has been stopped and closed (or
    /// reported through [`StopFailed`](EngineEvent::StopFailed)).
    Stopped,

    /// A render stream rejected a block. That block is lost for this
    /// destination only; the other destination is unaffected.
    ///
    /// Raised on the audio thread.
    BlockDropped {
        /// Destination that lost the block.
        destination: Destination,
        /// Why the write failed.
        error: StreamError,
    },

    /// A stream failed to stop or close during shutdown.
    StopFailed {
        /// Stream that failed.
        role: StreamRole,
        /// What went wrong.
        error: StreamError,
    },

    /// A delay line was rebuilt for a new depth, discarding its queued audio.
    DelayResized {
        /// Destination whose line changed.
        destination: Destination,
        /// Previous depth in blocks.
        from_blocks: usize,
        /// New depth in blocks.
        to_blocks: usize,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one with [`AudioEngine::on_event()`]. Some events are raised on
/// the audio thread, so the callback must return quickly.
///
/// [`AudioEngine::on_event()`]: crate::AudioEngine::on_event
pub type EventCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use split_audio::{event_callback, EngineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(EngineEvent::Started);
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
