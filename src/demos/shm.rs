//! Named shared memory across forked children
//!
//! The parent creates a segment holding a process-shared mutex and a
//! counter. Each child attaches to the segment by name, increments the
//! counter under the mutex and exits.

use crate::config::SHM_SEGMENT_SIZE;
use crate::core::{segment_name, SharedCounter};
use crate::error::{ensure, DemoError, DemoResult};
use crate::platform;
use nix::unistd::{getpid, ForkResult};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmOptions {
    pub children: usize,
    pub iterations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmReport {
    pub segment: String,
    pub children: Vec<i32>,
    pub expected: u64,
    pub total: u64,
}

pub fn run(options: ShmOptions) -> DemoResult<ShmReport> {
    if options.children == 0 {
        return Err(DemoError::validation("children", "must be at least 1"));
    }
    if options.iterations == 0 {
        return Err(DemoError::validation("iterations", "must be at least 1"));
    }
    let expected = (options.children as u64)
        .checked_mul(options.iterations)
        .ok_or_else(|| DemoError::validation("iterations", "children * iterations overflows"))?;

    let name = segment_name(std::process::id());
    let counter = SharedCounter::create(&name, SHM_SEGMENT_SIZE)?;
    info!(segment = counter.name(), children = options.children, "shm demo starting");
    println!("segment {} created by pid={}", counter.name(), getpid().as_raw());

    let mut children = Vec::with_capacity(options.children);
    let mut spawn_error = None;
    for _ in 0..options.children {
        match platform::fork_process() {
            Ok(ForkResult::Child) => platform::run_child(|| {
                let attached = SharedCounter::open(&name, SHM_SEGMENT_SIZE)?;
                for _ in 0..options.iterations {
                    attached.increment()?;
                }
                println!(
                    "child pid={} added {} to {}",
                    getpid().as_raw(),
                    options.iterations,
                    attached.name()
                );
                Ok(())
            }),
            Ok(ForkResult::Parent { child }) => children.push(child),
            Err(err) => {
                spawn_error = Some(err);
                break;
            }
        }
    }

    // Reap everything that was started, even when a later fork failed
    let mut first_failure = spawn_error;
    for &child in &children {
        if let Err(err) = platform::wait_for_success(child) {
            first_failure.get_or_insert(err);
        }
    }
    if let Some(err) = first_failure {
        return Err(err);
    }

    let total = counter.get()?;
    println!("counter = {total} (expected {expected})");
    ensure(total == expected, || format!("counter is {total}, expected {expected}"))?;

    Ok(ShmReport {
        segment: name,
        children: children.iter().map(|pid| pid.as_raw()).collect(),
        expected,
        total,
    })
}
