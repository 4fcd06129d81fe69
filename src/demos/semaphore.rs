//! mmap + semaphore: child-to-parent handoff
//!
//! `fork()` hands the child's pid to the parent, but the parent cannot learn
//! from that alone what pid the child saw for itself. Here the child writes
//! `getpid()` into a shared page and posts a process-shared semaphore; the
//! parent waits, reads the page and compares it with the fork return value.

use crate::config::SEMAPHORE_WAIT_TIMEOUT;
use crate::core::{Mapping, ProcessSemaphore, Sharing};
use crate::error::{ensure, DemoError, DemoResult};
use crate::platform;
use nix::unistd::{getpid, ForkResult, Pid};
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreReport {
    pub fork_return: Pid,
    pub reported_by_child: Pid,
}

pub fn run() -> DemoResult<SemaphoreReport> {
    info!("semaphore demo starting");

    let ready = ProcessSemaphore::new(0)?;
    let slot_mapping = Mapping::anonymous(std::mem::size_of::<AtomicI32>(), Sharing::Shared)?;
    // SAFETY: zeroed, aligned, and lives as long as `slot_mapping`
    let slot: &AtomicI32 = unsafe { &*slot_mapping.typed::<AtomicI32>()? };

    let child = match platform::fork_process()? {
        ForkResult::Child => platform::run_child(|| {
            let pid = getpid();
            println!("child: writing pid={} and posting", pid.as_raw());
            slot.store(pid.as_raw(), Ordering::SeqCst);
            ready.post()
        }),
        ForkResult::Parent { child } => child,
    };

    println!("parent: waiting on semaphore");
    if !ready.wait_timeout(SEMAPHORE_WAIT_TIMEOUT)? {
        return Err(child_never_posted(child));
    }
    let reported_by_child = Pid::from_raw(slot.load(Ordering::SeqCst));
    println!(
        "parent: child reported pid={}, fork() returned {}",
        reported_by_child.as_raw(),
        child.as_raw()
    );

    platform::wait_for_success(child)?;

    ensure(reported_by_child == child, || {
        format!("fork() returned {child} but the child reported {reported_by_child}")
    })?;

    info!(child = child.as_raw(), "semaphore demo finished");
    Ok(SemaphoreReport {
        fork_return: child,
        reported_by_child,
    })
}

/// The child did not post in time: reap it and report how it ended
fn child_never_posted(child: Pid) -> DemoError {
    warn!(child = child.as_raw(), timeout = ?SEMAPHORE_WAIT_TIMEOUT, "no post from child");
    match platform::wait_for_exit(child) {
        Ok(code) => DemoError::ChildFailed {
            pid: child.as_raw(),
            status: format!("exited with status {code} without posting"),
        },
        Err(err) => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_silent_child_is_reaped_and_reported() {
        let child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        let err = child_never_posted(pid);
        match err {
            DemoError::ChildFailed { pid: reported, status } => {
                assert_eq!(reported, pid.as_raw());
                assert!(status.contains("status 3"), "{status}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
