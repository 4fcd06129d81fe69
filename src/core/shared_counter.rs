use crate::config::SHM_NAMESPACE;
use crate::error::{DemoError, DemoResult};
use nix::errno::Errno;
use nix::sys::mman::shm_unlink;
use raw_sync::locks::{LockImpl, LockInit, Mutex};
use shared_memory::{Shmem, ShmemConf, ShmemError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub(crate) enum SharedCounterError {
    #[error("shared memory region too small for counter")]
    RegionTooSmall,
    #[error("shared memory error: {0}")]
    Shmem(#[from] ShmemError),
    #[error("shared lock init failed: {0}")]
    LockInit(String),
    #[error("shared lock access failed: {0}")]
    LockGuard(String),
    #[error("removing stale segment failed: {0}")]
    Unlink(Errno),
}

/// Segment name for a given owner pid, so concurrent runs never collide
pub fn segment_name(pid: u32) -> String {
    format!("{SHM_NAMESPACE}-{pid}")
}

/// A `u64` in a named shared memory segment, guarded by a process-shared
/// mutex stored in front of it
///
/// Layout: `[mutex][pad to 8][u64]`.
pub struct SharedCounter {
    // Dropped before `shm`: the lock points into the segment
    lock: Box<dyn LockImpl>,
    shm: Shmem,
    name: String,
}

impl SharedCounter {
    /// Create the segment exclusively, owned by this handle
    ///
    /// A segment left under `name` by a run that never cleaned up (killed,
    /// say, with its pid later reused) is unlinked and replaced, so the
    /// counter always starts at zero. The owner unlinks the segment on drop.
    pub fn create(name: &str, size: usize) -> DemoResult<Self> {
        create_exclusive(name, size).map_err(|err| to_demo(err, name))
    }

    /// Attach to a segment created by another handle
    pub fn open(name: &str, size: usize) -> DemoResult<Self> {
        open_existing(name, size).map_err(|err| to_demo(err, name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_owner(&self) -> bool {
        self.shm.is_owner()
    }

    /// Add one under the lock and return the new value
    pub fn increment(&self) -> DemoResult<u64> {
        self.with_value(|value| {
            *value += 1;
            *value
        })
    }

    pub fn get(&self) -> DemoResult<u64> {
        self.with_value(|value| *value)
    }

    fn with_value<R>(&self, f: impl FnOnce(&mut u64) -> R) -> DemoResult<R> {
        let guard = self
            .lock
            .lock()
            .map_err(|e| to_demo(SharedCounterError::LockGuard(e.to_string()), &self.name))?;
        // SAFETY: the guard grants exclusive access to the data region, which
        // is 8-byte aligned and large enough for a u64 (checked on attach)
        let value = unsafe { &mut *(*guard as *mut u64) };
        Ok(f(value))
    }
}

fn open_existing(name: &str, size: usize) -> Result<SharedCounter, SharedCounterError> {
    let shm = ShmemConf::new().os_id(name).size(size).open()?;
    attach(shm, name, false)
}

fn create_exclusive(name: &str, size: usize) -> Result<SharedCounter, SharedCounterError> {
    let conf = || ShmemConf::new().os_id(name).size(size);
    let shm = match conf().create() {
        Ok(shm) => shm,
        Err(ShmemError::MappingIdExists) => {
            warn!(name, "replacing stale shared memory segment");
            unlink(name)?;
            conf().create()?
        }
        Err(e) => return Err(e.into()),
    };
    attach(shm, name, true)
}

/// Remove `name` from the shared memory namespace; mappings stay valid
fn unlink(name: &str) -> Result<(), SharedCounterError> {
    match shm_unlink(name) {
        Ok(()) | Err(Errno::ENOENT) => Ok(()),
        Err(errno) => Err(SharedCounterError::Unlink(errno)),
    }
}

fn attach(shm: Shmem, name: &str, init: bool) -> Result<SharedCounter, SharedCounterError> {
    let ptr = shm.as_ptr();
    let lock_region = Mutex::size_of(Some(ptr));

    // 8-byte alignment for the counter
    let aligned_lock_region = (lock_region + 7) & !7;

    if shm.len() < aligned_lock_region + std::mem::size_of::<u64>() {
        return Err(SharedCounterError::RegionTooSmall);
    }

    // SAFETY: offset checked against the segment length above
    let data_ptr = unsafe { ptr.add(aligned_lock_region) };

    let lock = if init {
        // SAFETY: the creator is the only process touching the segment yet
        let (lock, _) =
            unsafe { Mutex::new(ptr, data_ptr) }.map_err(|e| SharedCounterError::LockInit(e.to_string()))?;
        // SAFETY: aligned and in bounds, and still private to the creator
        unsafe { std::ptr::write(data_ptr as *mut u64, 0) };
        lock
    } else {
        // SAFETY: the creator initialised the mutex before publishing the name
        let (lock, _) = unsafe { Mutex::from_existing(ptr, data_ptr) }
            .map_err(|e| SharedCounterError::LockInit(e.to_string()))?;
        lock
    };

    debug!(name, init, len = shm.len(), "shared counter attached");
    Ok(SharedCounter {
        lock,
        shm,
        name: name.to_string(),
    })
}

fn to_demo(err: SharedCounterError, name: &str) -> DemoError {
    DemoError::SharedMemory {
        segment: name.to_string(),
        message: err.to_string(),
    }
}
