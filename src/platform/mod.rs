//! Platform layer
//!
//! Thin wrappers over the process-level system calls the demonstrations
//! share: identity, fork/wait, liveness probing and termination.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::*;
