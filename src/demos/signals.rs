//! Signal handlers and liveness probing
//!
//! Installs a handler with `sigaction`, delivers the signal to ourselves with
//! `raise`, and shows the handler ran once per delivery. Then probes a child
//! with `kill(pid, 0)` before and after reaping it.

use crate::error::{ensure, DemoResult, SysContext};
use crate::platform::{self, process_alive};
use crate::signal;
use clap::ValueEnum;
use nix::sys::signal::{raise, Signal};
use nix::unistd::{getpid, ForkResult, Pid};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UserSignal {
    Usr1,
    Usr2,
}

impl From<UserSignal> for Signal {
    fn from(value: UserSignal) -> Self {
        match value {
            UserSignal::Usr1 => Signal::SIGUSR1,
            UserSignal::Usr2 => Signal::SIGUSR2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalReport {
    pub signal: Signal,
    pub raised: usize,
    pub delivered: usize,
    pub self_alive: bool,
    /// Liveness of an exited child before `wait` (a zombie still exists)
    pub zombie_alive: bool,
    pub reaped_alive: bool,
}

pub fn run(which: UserSignal, count: usize) -> DemoResult<SignalReport> {
    let signal = Signal::from(which);
    info!(%signal, count, "signal demo starting");

    let delivered = {
        let _guard = signal::install_counting_handler(signal)?;
        for n in 1..=count {
            raise(signal).sys("raise")?;
            println!("raised {signal} ({n}/{count}), handler ran {} times", signal::delivered());
        }
        signal::delivered()
    };
    ensure(delivered == count, || {
        format!("handler ran {delivered} times for {count} deliveries")
    })?;

    let self_alive = process_alive(getpid());
    println!("kill(self, 0): alive={self_alive}");

    let child = match platform::fork_process()? {
        ForkResult::Child => platform::exit_child(0),
        ForkResult::Parent { child } => child,
    };

    // The exited child stays in the process table until reaped
    let zombie_alive = wait_until_exited(child)?;
    println!("kill(child {}, 0) before wait: alive={zombie_alive}", child.as_raw());

    platform::wait_for_success(child)?;
    let reaped_alive = process_alive(child);
    println!("kill(child {}, 0) after wait: alive={reaped_alive}", child.as_raw());
    ensure(!reaped_alive, || format!("reaped child {child} still answers signals"))?;

    Ok(SignalReport {
        signal,
        raised: count,
        delivered,
        self_alive,
        zombie_alive,
        reaped_alive,
    })
}

/// Wait for the child to exit without reaping it, then probe it
#[cfg(any(target_os = "linux", target_os = "android"))]
fn wait_until_exited(child: Pid) -> DemoResult<bool> {
    use nix::sys::wait::{waitid, Id, WaitPidFlag};

    waitid(Id::Pid(child), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT).sys("waitid")?;
    Ok(process_alive(child))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn wait_until_exited(child: Pid) -> DemoResult<bool> {
    // No WNOWAIT here; give the child time to reach _exit
    std::thread::sleep(std::time::Duration::from_millis(100));
    Ok(process_alive(child))
}
