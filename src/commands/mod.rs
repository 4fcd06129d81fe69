//! Subcommand dispatch
//!
//! Resolves each subcommand's options against the loaded settings and runs
//! the matching demonstration.

pub mod parser;

pub use parser::*;

use crate::demos::{self, count::CountOptions, mutex::MutexOptions, shm::ShmOptions};
use crate::error::{DemoError, DemoResult};
use crate::utils::Settings;
use std::io::{self, Write};

pub fn execute(command: Commands, settings: &Settings) -> DemoResult<()> {
    match command {
        Commands::Fork => demos::fork::run().map(drop),
        Commands::Count { period, ticks } => {
            let report = demos::count::run(CountOptions {
                period: period.unwrap_or(settings.count.period),
                ticks,
            })?;
            if report.interrupted {
                println!("interrupted after {} ticks", report.ticks);
            }
            Ok(())
        }
        Commands::Signal { signal, count } => demos::signals::run(signal, count).map(drop),
        Commands::Semaphore => demos::semaphore::run().map(drop),
        Commands::Mmap { message } => {
            let message = message.unwrap_or_else(|| settings.mmap.message.clone());
            demos::mmap::run(&message).map(drop)
        }
        Commands::Mutex {
            threads,
            iterations,
        } => demos::mutex::run(MutexOptions {
            threads: threads.unwrap_or(settings.mutex.threads),
            iterations: iterations.unwrap_or(settings.mutex.iterations),
        })
        .map(drop),
        Commands::Socket { domain, message } => {
            let message = message.unwrap_or_else(|| settings.socket.message.clone());
            demos::socket::run(domain, &message).map(drop)
        }
        Commands::Shm {
            children,
            iterations,
        } => demos::shm::run(ShmOptions {
            children: children.unwrap_or(settings.shm.children),
            iterations: iterations.unwrap_or(settings.shm.iterations),
        })
        .map(drop),
        Commands::List => {
            let stdout = io::stdout();
            print_catalog(&mut stdout.lock()).map_err(|err| DemoError::io("write catalog", err))
        }
    }
}

/// One line per demonstration: name, then description
pub fn print_catalog<W: Write>(out: &mut W) -> io::Result<()> {
    let width = demos::CATALOG
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    for (name, description) in demos::CATALOG {
        writeln!(out, "{name:<width$}  {description}")?;
    }
    Ok(())
}
