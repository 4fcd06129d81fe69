//! Shared-memory building blocks used by the fork-based demonstrations

pub mod mapping;
pub mod semaphore;
pub mod shared_counter;

pub use mapping::{Mapping, Sharing};
pub use semaphore::ProcessSemaphore;
pub use shared_counter::{segment_name, SharedCounter};
