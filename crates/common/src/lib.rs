//! HandGuide Common Utilities
//!
//! Shared infrastructure for all HandGuide crates:
//! - Error types and result aliases
//! - Session clock (monotonic milliseconds plus wall-clock anchor)
//! - Tracing/logging initialization
//! - Configuration loading and the observable config store

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
