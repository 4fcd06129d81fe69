//! One module per demonstration
//!
//! Demonstrations are independent of each other. Each `run` prints what it
//! observes to stdout and returns a report for tests to check.

pub mod count;
pub mod fork;
pub mod mmap;
pub mod mutex;
pub mod semaphore;
pub mod shm;
pub mod signals;
pub mod socket;

/// Subcommand name and one-line description of every demonstration
pub const CATALOG: &[(&str, &str)] = &[
    ("fork", "fork a child, wait for it, and show the parent's memory is untouched"),
    ("count", "busy counting loop to interrupt under a debugger"),
    ("signal", "sigaction handler counting raised signals, kill(pid, 0) probing"),
    ("semaphore", "process-shared semaphore in an mmap page: child reports its pid"),
    ("mmap", "file-backed MAP_SHARED write, MAP_SHARED vs MAP_PRIVATE across fork"),
    ("mutex", "worker threads incrementing one mutex-protected counter"),
    ("socket", "echo over TCP loopback or a Unix socket pair"),
    ("shm", "named shared memory segment with a process-shared mutex"),
];
