//! Audio pipeline components.
//!
//! Every captured block takes the same path:
//!
//! ```text
//! Capture → split channels → gain → Delay Line (per destination) → Render
//! ```
//!
//! - **Parameters**: Delay, gain and mapping, plus the delay-depth rule
//! - **Delay Line**: Fixed-depth FIFO of whole blocks, prefilled with silence
//! - **Router**: Owns both delay lines and the live parameters behind one lock
//!
//! The router is shared between the audio thread and control calls; neither
//! side holds its lock across allocation or I/O.

mod delay_line;
mod parameters;
mod router;

pub use delay_line::DelayLine;
pub use parameters::{
    clamp_delay_ms, delay_depth, sanitize_gain, ParameterSet, DEFAULT_DELAY_MS, DEFAULT_GAIN,
    MAX_DELAY_MS,
};
pub(crate) use router::Router;
