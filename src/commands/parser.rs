//! Command line parsing
//!
//! Every demo option is optional on the command line and falls back to
//! [`Settings`](crate::utils::Settings).

use crate::demos::signals::UserSignal;
use crate::demos::socket::SocketDomain;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// sysdemo - standalone demonstrations of POSIX facilities
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sysdemo",
    about = "Standalone demonstrations of POSIX process, signal, memory and socket facilities",
    version
)]
pub struct Cli {
    /// Log filter (trace, debug, info, warn, error or an EnvFilter string)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fork a child, wait for it, and show memory is copied
    Fork,

    /// Busy counting loop, a target to interrupt under gdb
    Count {
        /// Increments per printed tick
        #[arg(long)]
        period: Option<u64>,
        /// Stop after this many ticks (default: until SIGINT/SIGTERM)
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Count raised signals in a sigaction handler, probe liveness with kill(pid, 0)
    Signal {
        /// Signal to raise
        #[arg(long, value_enum, default_value = "usr1")]
        signal: UserSignal,
        /// Number of deliveries
        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Child reports its pid through an mmap page and a process-shared semaphore
    Semaphore,

    /// File-backed and anonymous memory mappings
    Mmap {
        /// Text written to the file through the mapping
        #[arg(long)]
        message: Option<String>,
    },

    /// Worker threads incrementing a mutex-protected counter
    Mutex {
        #[arg(long)]
        threads: Option<usize>,
        /// Increments per thread
        #[arg(long)]
        iterations: Option<u64>,
    },

    /// Echo a message over a socket
    Socket {
        #[arg(long, value_enum, default_value = "inet")]
        domain: SocketDomain,
        #[arg(long)]
        message: Option<String>,
    },

    /// Forked children incrementing a counter in named shared memory
    Shm {
        #[arg(long)]
        children: Option<usize>,
        /// Increments per child
        #[arg(long)]
        iterations: Option<u64>,
    },

    /// List all demonstrations
    List,
}

impl Cli {
    /// Parse from a custom argv (tests)
    pub fn try_parse_args_from<I, T>(iter: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(iter)
    }

    /// Parse `std::env::args`; clap prints the error and exits on failure
    pub fn parse_args() -> Cli {
        match Self::try_parse_args_from(std::env::args_os()) {
            Ok(cli) => cli,
            Err(err) => err.exit(),
        }
    }
}
