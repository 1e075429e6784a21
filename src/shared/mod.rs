//! Shared state and messaging between the operator input and the scan loop
//!
//! The scan loop owns the pipeline; the input thread only touches the
//! operator controls (behind a lock) and sends commands over a channel.

pub mod messages;
pub mod state;

pub use messages::OperatorCommand;
pub use state::{clamp_threshold, OperatorControls, Rotation, RuntimeState};
