//! Mutex-protected counter shared by worker threads
//!
//! Each worker takes the lock once per increment. Without the lock the
//! read-modify-write steps of different threads could interleave and lose
//! updates; with it the total is exact.

use crate::error::{ensure, DemoError, DemoResult};
use crossbeam::channel;
use parking_lot::Mutex;
use std::thread;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexOptions {
    pub threads: usize,
    pub iterations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutexReport {
    pub expected: u64,
    pub total: u64,
    /// Increments per worker, indexed by worker number
    pub per_thread: Vec<u64>,
}

pub fn run(options: MutexOptions) -> DemoResult<MutexReport> {
    if options.threads == 0 {
        return Err(DemoError::validation("threads", "must be at least 1"));
    }
    if options.iterations == 0 {
        return Err(DemoError::validation("iterations", "must be at least 1"));
    }
    let expected = (options.threads as u64)
        .checked_mul(options.iterations)
        .ok_or_else(|| DemoError::validation("iterations", "threads * iterations overflows"))?;

    info!(threads = options.threads, iterations = options.iterations, "mutex demo starting");

    let counter = Mutex::new(0u64);
    let (tx, rx) = channel::unbounded::<(usize, u64)>();

    thread::scope(|scope| {
        for worker in 0..options.threads {
            let tx = tx.clone();
            let counter = &counter;
            scope.spawn(move || {
                let mut done = 0u64;
                for _ in 0..options.iterations {
                    *counter.lock() += 1;
                    done += 1;
                }
                debug!(worker, done, "worker finished");
                // Receiver outlives the scope
                let _ = tx.send((worker, done));
            });
        }
    });
    drop(tx);

    let mut per_thread = vec![0u64; options.threads];
    for (worker, done) in rx.iter() {
        per_thread[worker] = done;
    }
    for (worker, done) in per_thread.iter().enumerate() {
        println!("thread {worker}: {done} increments");
    }

    let total = counter.into_inner();
    println!("final counter = {total} (expected {expected})");
    ensure(total == expected, || format!("lost updates: {total} != {expected}"))?;

    Ok(MutexReport {
        expected,
        total,
        per_thread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_total_is_exact() {
        let report = run(MutexOptions {
            threads: 8,
            iterations: 10_000,
        })
        .unwrap();
        assert_eq!(report.total, 80_000);
        assert_eq!(report.per_thread, vec![10_000; 8]);
    }

    #[test]
    fn test_single_thread() {
        let report = run(MutexOptions {
            threads: 1,
            iterations: 5,
        })
        .unwrap();
        assert_eq!(
            report,
            MutexReport {
                expected: 5,
                total: 5,
                per_thread: vec![5],
            }
        );
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = run(MutexOptions {
            threads: 0,
            iterations: 1,
        })
        .unwrap_err();
        assert!(matches!(err, DemoError::Validation { .. }));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = run(MutexOptions {
            threads: 2,
            iterations: 0,
        })
        .unwrap_err();
        assert!(matches!(err, DemoError::Validation { .. }));
    }
}
