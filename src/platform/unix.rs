use crate::error::{DemoError, DemoResult, SysContext};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, getpid, getppid, ForkResult, Pid};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Pid and parent pid of the calling process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub pid: Pid,
    pub ppid: Pid,
}

impl Identity {
    pub fn current() -> Self {
        Self {
            pid: getpid(),
            ppid: getppid(),
        }
    }

    /// `pid=<pid> ppid=<ppid>`
    pub fn describe(&self) -> String {
        format!("pid={} ppid={}", self.pid.as_raw(), self.ppid.as_raw())
    }
}

/// Print `<msg> pid=.. ppid=..` for the calling process
pub fn print_pid(msg: &str) {
    println!("{} {}", msg, Identity::current().describe());
}

/// Flush stdout and stderr so a fork does not duplicate pending output
pub fn flush_std_streams() -> DemoResult<()> {
    io::stdout()
        .flush()
        .map_err(|err| DemoError::io("flush stdout", err))?;
    io::stderr()
        .flush()
        .map_err(|err| DemoError::io("flush stderr", err))
}

/// Flush the standard streams and fork
///
/// The caller must keep the child branch short: it may only touch state it
/// owns and must leave through [`exit_child`] or [`run_child`].
pub fn fork_process() -> DemoResult<ForkResult> {
    flush_std_streams()?;
    // SAFETY: the demonstrations fork before spawning threads or runtimes,
    // and every child branch terminates through `_exit`.
    let result = unsafe { fork() }.sys("fork")?;
    if let ForkResult::Parent { child } = result {
        debug!(child = child.as_raw(), "forked");
    }
    Ok(result)
}

/// Terminate a forked child without running the parent's cleanup
pub fn exit_child(code: i32) -> ! {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    // SAFETY: `_exit` skips atexit handlers and destructors, which belong to
    // the parent's copy of the process state
    unsafe { libc::_exit(code) }
}

/// Run `body` in a forked child and exit with 0 on success, 1 otherwise
///
/// Panics are caught so the child never unwinds into the parent's frames.
pub fn run_child<F>(body: F) -> !
where
    F: FnOnce() -> DemoResult<()>,
{
    let code = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            eprintln!("child {}: {}", getpid().as_raw(), err);
            1
        }
        Err(_) => 1,
    };
    exit_child(code)
}

/// Block until `child` terminates and return its exit code
///
/// Anything but a normal exit (signal, stop) is reported as
/// [`DemoError::ChildFailed`].
pub fn wait_for_exit(child: Pid) -> DemoResult<i32> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(pid, code)) => {
                debug!(pid = pid.as_raw(), code, "child exited");
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(pid, signal, core_dumped)) => {
                return Err(DemoError::ChildFailed {
                    pid: pid.as_raw(),
                    status: format!("killed by {signal} (core dumped: {core_dumped})"),
                });
            }
            Ok(other) => {
                return Err(DemoError::ChildFailed {
                    pid: child.as_raw(),
                    status: format!("{other:?}"),
                });
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(DemoError::sys("waitpid", errno)),
        }
    }
}

/// Like [`wait_for_exit`] but also requires exit status 0
pub fn wait_for_success(child: Pid) -> DemoResult<()> {
    match wait_for_exit(child)? {
        0 => Ok(()),
        code => Err(DemoError::ChildFailed {
            pid: child.as_raw(),
            status: format!("exit status {code}"),
        }),
    }
}

/// Check if process is alive
///
/// Signal 0 performs the permission and existence checks without sending
/// anything; EPERM means the process exists but belongs to someone else.
pub fn process_alive(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) => true,
        Err(errno) => errno == Errno::EPERM,
    }
}
