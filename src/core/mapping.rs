//! Memory mappings with unmap-on-drop
//!
//! A forked child inherits the parent's mappings. `MAP_SHARED` pages stay
//! shared between the two processes, `MAP_PRIVATE` pages become copy-on-write
//! copies.

use crate::error::{DemoError, DemoResult, SysContext};
use nix::sys::mman::{mmap, mmap_anonymous, msync, munmap, MapFlags, MsFlags, ProtFlags};
use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::os::fd::AsFd;
use std::ptr::NonNull;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// Writes are visible to every process mapping the pages
    Shared,
    /// Writes after a fork stay in the writing process
    Private,
}

impl Sharing {
    fn flags(self) -> MapFlags {
        match self {
            Sharing::Shared => MapFlags::MAP_SHARED,
            Sharing::Private => MapFlags::MAP_PRIVATE,
        }
    }
}

#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<c_void>,
    len: usize,
}

fn non_zero(len: usize) -> DemoResult<NonZeroUsize> {
    NonZeroUsize::new(len).ok_or_else(|| DemoError::validation("length", "mapping length must be non-zero"))
}

impl Mapping {
    /// Anonymous read/write mapping, zero-filled
    pub fn anonymous(len: usize, sharing: Sharing) -> DemoResult<Self> {
        let length = non_zero(len)?;
        // SAFETY: a fresh anonymous mapping aliases no existing memory
        let ptr = unsafe {
            mmap_anonymous(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                sharing.flags(),
            )
        }
        .sys("mmap")?;
        debug!(len, ?sharing, "anonymous mapping created");
        Ok(Self { ptr, len })
    }

    /// Shared read/write mapping of the first `len` bytes of a file
    ///
    /// The file must already be at least `len` bytes long.
    pub fn file<F: AsFd>(fd: F, len: usize) -> DemoResult<Self> {
        let length = non_zero(len)?;
        // SAFETY: the file is owned by the caller for the mapping's lifetime
        // and no other Rust reference points into the new pages
        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                0,
            )
        }
        .sys("mmap")?;
        debug!(len, "file mapping created");
        Ok(Self { ptr, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr().cast()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping is readable for `len` bytes while self lives
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` rules out other in-process borrows
        unsafe { std::slice::from_raw_parts_mut(self.as_ptr(), self.len) }
    }

    /// Typed pointer to the start of the mapping
    ///
    /// Fails if `T` does not fit or the mapping is not suitably aligned.
    pub fn typed<T>(&self) -> DemoResult<*mut T> {
        if std::mem::size_of::<T>() > self.len {
            return Err(DemoError::validation(
                "length",
                format!("{} bytes cannot hold {} bytes", self.len, std::mem::size_of::<T>()),
            ));
        }
        let ptr = self.as_ptr().cast::<T>();
        if ptr.align_offset(std::mem::align_of::<T>()) != 0 {
            return Err(DemoError::invariant("mapping is not aligned for the requested type"));
        }
        Ok(ptr)
    }

    /// Write dirty pages back to the underlying file
    pub fn sync(&self) -> DemoResult<()> {
        // SAFETY: ptr/len describe exactly this live mapping
        unsafe { msync(self.ptr, self.len, MsFlags::MS_SYNC) }.sys("msync")
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: ptr/len came from mmap and are unmapped exactly once
        if let Err(errno) = unsafe { munmap(self.ptr, self.len) } {
            warn!(%errno, len = self.len, "munmap failed");
        }
    }
}
