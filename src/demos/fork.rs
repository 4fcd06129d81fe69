//! fork + wait
//!
//! Makes a copy of this process. Possible output:
//!
//! ```text
//! before fork pid=16026 ppid=14381
//! after fork pid=16031 ppid=16026
//! inside (pid == 0) pid=16031 ppid=16026
//! after fork pid=16026 ppid=14381
//! after (pid == 0) pid=16026 ppid=14381
//! after wait pid=16026 ppid=14381
//! fork() return = 16031
//! ```
//!
//! The child's lines may interleave with the parent's: both write to the same
//! terminal asynchronously. Streams are flushed before forking, otherwise
//! unflushed buffers would be copied into the child and printed twice.

use crate::error::{ensure, DemoResult};
use crate::platform::{self, print_pid};
use nix::unistd::{getpid, ForkResult, Pid};
use tracing::info;

/// What the parent observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkReport {
    pub parent_pid: Pid,
    /// Value `fork()` returned in the parent
    pub child_pid: Pid,
    pub child_exit_code: i32,
    /// Parent's copy of the counter the child incremented
    pub counter: u32,
}

pub fn run() -> DemoResult<ForkReport> {
    info!("fork demo starting");

    // Duplicated into the child, not shared with it
    let mut counter: u32 = 0;
    let parent_pid = getpid();

    // Parent only: the child does not exist yet
    print_pid("before fork");

    let result = platform::fork_process()?;

    // Both processes
    print_pid("after fork");

    let child_pid = match result {
        ForkResult::Child => {
            print_pid("inside (pid == 0)");
            platform::run_child(|| {
                let pid = getpid();
                ensure(pid != parent_pid, || {
                    format!("child pid {pid} equals parent pid {parent_pid}")
                })?;
                // Only the child's copy changes
                counter += 1;
                Ok(())
            })
        }
        ForkResult::Parent { child } => child,
    };

    // Parent only; may run before or after the child
    print_pid("after (pid == 0)");

    platform::wait_for_success(child_pid)?;

    print_pid("after wait");
    println!("fork() return = {}", child_pid.as_raw());

    ensure(counter == 0, || {
        format!("parent counter changed to {counter} after child increment")
    })?;

    info!(child = child_pid.as_raw(), "fork demo finished");
    Ok(ForkReport {
        parent_pid,
        child_pid,
        child_exit_code: 0,
        counter,
    })
}
