//! Busy counting loop
//!
//! A target to interrupt under a debugger: run `gdb --args sysdemo count`,
//! then press Ctrl + C to pause inside the loop. Outside a debugger SIGINT or
//! SIGTERM ends the loop.

use crate::error::{DemoError, DemoResult};
use crate::signal;
use std::hint::black_box;
use std::io::{self, Write};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountOptions {
    pub period: u64,
    /// Stop after this many printed ticks; `None` loops until signaled
    pub ticks: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountReport {
    pub ticks: u64,
    pub interrupted: bool,
}

pub fn run(options: CountOptions) -> DemoResult<CountReport> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _guard = signal::install_stop_handler()?;
    count_into(options, &mut out, signal::stop_requested)
}

/// Counting loop writing one line per tick to `out`
///
/// `should_stop` is polled after every increment.
pub fn count_into<W, F>(options: CountOptions, out: &mut W, should_stop: F) -> DemoResult<CountReport>
where
    W: Write,
    F: Fn() -> bool,
{
    if options.period == 0 {
        return Err(DemoError::validation("period", "must be greater than zero"));
    }
    if options.ticks == Some(0) {
        return Ok(CountReport {
            ticks: 0,
            interrupted: false,
        });
    }

    info!(period = options.period, ticks = ?options.ticks, "counting");

    let mut i: u64 = 0;
    let mut ticks: u64 = 0;
    loop {
        i = black_box(i.wrapping_add(1));
        if i % options.period == 0 {
            writeln!(out, "{}", i / options.period)
                .and_then(|_| out.flush())
                .map_err(|err| DemoError::io("write tick", err))?;
            ticks += 1;

            if options.ticks.is_some_and(|limit| ticks >= limit) {
                return Ok(CountReport {
                    ticks,
                    interrupted: false,
                });
            }
        }
        if should_stop() {
            return Ok(CountReport {
                ticks,
                interrupted: true,
            });
        }
    }
}
