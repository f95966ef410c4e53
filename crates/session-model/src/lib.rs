//! Touchset Session Model
//!
//! Defines the core data contracts for a recording session:
//! - **Events:** Timestamped stylus/touch samples (position, pressure, tilt)
//! - **Pointer log:** The sorted, de-duplicated event stream with nearest-timestamp lookup
//! - **Calibration:** The anchor pair relating the video clock to the pointer clock
//! - **State log:** The run-length-encoded touch/no-touch label per frame
//! - **Session:** Top-level metadata tying the video and event files together
//!
//! Pointer timestamps are microseconds on the capture device's monotonic clock.

pub mod calibration;
pub mod event;
pub mod pointer_log;
pub mod session;
pub mod state_log;

pub use calibration::*;
pub use event::*;
pub use pointer_log::*;
pub use session::*;
pub use state_log::*;
