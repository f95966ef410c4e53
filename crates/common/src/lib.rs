//! Touchset Common Utilities
//!
//! Shared infrastructure for all Touchset crates:
//! - Error types and result aliases
//! - Frame-clock math relating video frames to pointer timestamps
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
