//! sysdemo library
//!
//! Standalone demonstrations of POSIX facilities: process creation, signals,
//! semaphores, memory mapping, sockets and threading primitives. Each
//! demonstration lives in its own module under [`demos`] and is independent
//! of the others.

pub mod commands;
pub mod config;
pub mod core;
pub mod demos;
pub mod error;
pub mod platform;
pub mod signal;
pub mod utils;

// Re-export commonly used types for convenience
pub use error::{DemoError, DemoResult, ErrorCategory};
pub use utils::Settings;
