//! Signal disposition helpers
//!
//! Two handlers are provided: a counting handler for the signal
//! demonstration and a stop-flag handler used by the counting loop to leave
//! cleanly on SIGINT/SIGTERM. Both only touch atomics, which keeps them
//! async-signal-safe.

use crate::error::{DemoResult, SysContext};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use tracing::debug;

static COUNTED_SIGNAL: AtomicI32 = AtomicI32::new(0);
static DELIVERED: AtomicUsize = AtomicUsize::new(0);
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn counting_handler(signum: libc::c_int) {
    if signum == COUNTED_SIGNAL.load(Ordering::SeqCst) {
        DELIVERED.fetch_add(1, Ordering::SeqCst);
    }
}

extern "C" fn stop_handler(_signum: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Restores the previous dispositions when dropped
pub struct SignalGuard {
    previous: Vec<(Signal, SigAction)>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for (signal, action) in self.previous.drain(..).rev() {
            // SAFETY: restoring a disposition obtained from sigaction itself
            if let Err(errno) = unsafe { sigaction(signal, &action) } {
                debug!(%signal, %errno, "failed to restore signal disposition");
            }
        }
    }
}

fn install(signals: &[Signal], handler: SigHandler) -> DemoResult<SignalGuard> {
    // SA_RESTART keeps blocking calls from failing with EINTR
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
    let mut guard = SignalGuard {
        previous: Vec::with_capacity(signals.len()),
    };
    for &signal in signals {
        // SAFETY: both handlers only perform atomic operations
        let previous = unsafe { sigaction(signal, &action) }.sys("sigaction")?;
        guard.previous.push((signal, previous));
        debug!(%signal, "handler installed");
    }
    Ok(guard)
}

/// Count deliveries of `signal` until the guard is dropped
///
/// The delivery counter is reset on installation.
pub fn install_counting_handler(signal: Signal) -> DemoResult<SignalGuard> {
    COUNTED_SIGNAL.store(signal as i32, Ordering::SeqCst);
    DELIVERED.store(0, Ordering::SeqCst);
    install(&[signal], SigHandler::Handler(counting_handler))
}

/// Number of deliveries seen by the counting handler
pub fn delivered() -> usize {
    DELIVERED.load(Ordering::SeqCst)
}

/// Raise the stop flag on SIGINT or SIGTERM
pub fn install_stop_handler() -> DemoResult<SignalGuard> {
    STOP_REQUESTED.store(false, Ordering::SeqCst);
    install(
        &[Signal::SIGINT, Signal::SIGTERM],
        SigHandler::Handler(stop_handler),
    )
}

pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::Relaxed)
}
