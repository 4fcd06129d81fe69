//! mmap: file-backed and anonymous mappings
//!
//! Part one writes a message into a file through a `MAP_SHARED` mapping and
//! reads it back with ordinary I/O. Part two forks with two anonymous
//! counters mapped, one `MAP_SHARED` and one `MAP_PRIVATE`, and lets the
//! child increment both: only the shared increment reaches the parent.

use crate::core::{Mapping, Sharing};
use crate::error::{ensure, DemoError, DemoResult, IoContext};
use crate::platform;
use nix::unistd::ForkResult;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmapReport {
    pub file_contents: String,
    pub shared_after_child: u64,
    pub private_after_child: u64,
}

pub fn run(message: &str) -> DemoResult<MmapReport> {
    info!(len = message.len(), "mmap demo starting");

    let mut scratch = scratch_file()?;
    let file_contents = file_roundtrip(&mut scratch, message)?;
    println!("file via mmap: {file_contents:?}");

    let (shared_after_child, private_after_child) = fork_counters()?;
    println!("MAP_SHARED counter after child increment: {shared_after_child}");
    println!("MAP_PRIVATE counter after child increment: {private_after_child}");

    Ok(MmapReport {
        file_contents,
        shared_after_child,
        private_after_child,
    })
}

/// Unlinked temporary file; nothing on disk names it, and it is gone on close
fn scratch_file() -> DemoResult<File> {
    let file = tempfile::tempfile().io_context("create scratch file")?;
    debug!("scratch file created");
    Ok(file)
}

/// Write `message` into `file` through a shared mapping, then read it back
/// with ordinary I/O
pub fn file_roundtrip(file: &mut File, message: &str) -> DemoResult<String> {
    if message.is_empty() {
        return Err(DemoError::validation("message", "must not be empty"));
    }

    // A mapping cannot extend a file; size it first
    file.set_len(message.len() as u64)
        .io_context("size scratch file")?;

    {
        let mut mapping = Mapping::file(&*file, message.len())?;
        mapping.as_mut_slice().copy_from_slice(message.as_bytes());
        mapping.sync()?;
    }

    let mut contents = String::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut contents))
        .io_context("read scratch file")?;
    ensure(contents == message, || {
        format!("file holds {contents:?} after writing {message:?} through the mapping")
    })?;
    Ok(contents)
}

/// Fork with one shared and one private counter; child increments both
fn fork_counters() -> DemoResult<(u64, u64)> {
    let shared_mapping = Mapping::anonymous(std::mem::size_of::<AtomicU64>(), Sharing::Shared)?;
    let private_mapping = Mapping::anonymous(std::mem::size_of::<AtomicU64>(), Sharing::Private)?;
    // SAFETY: zeroed, aligned, and outlive the references
    let shared: &AtomicU64 = unsafe { &*shared_mapping.typed::<AtomicU64>()? };
    let private: &AtomicU64 = unsafe { &*private_mapping.typed::<AtomicU64>()? };

    let child = match platform::fork_process()? {
        ForkResult::Child => platform::run_child(|| {
            shared.fetch_add(1, Ordering::SeqCst);
            private.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
        ForkResult::Parent { child } => child,
    };
    platform::wait_for_success(child)?;

    let shared_value = shared.load(Ordering::SeqCst);
    let private_value = private.load(Ordering::SeqCst);
    ensure(shared_value == 1, || {
        format!("shared counter is {shared_value}, expected the child's increment")
    })?;
    ensure(private_value == 0, || {
        format!("private counter is {private_value}, child write leaked into parent")
    })?;
    Ok((shared_value, private_value))
}
