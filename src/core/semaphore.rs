//! Process-shared POSIX semaphore
//!
//! An unnamed semaphore (`sem_init` with `pshared = 1`) only works across
//! processes when it lives in memory both can reach, so it is placed at the
//! start of its own anonymous shared mapping. A child forked after
//! construction operates on the same semaphore.

use crate::core::mapping::{Mapping, Sharing};
use crate::error::{DemoError, DemoResult, SysContext};
use nix::errno::Errno;
#[cfg(any(target_os = "linux", target_os = "android"))]
use nix::sys::time::TimeSpec;
#[cfg(any(target_os = "linux", target_os = "android"))]
use nix::time::{clock_gettime, ClockId};
use std::time::Duration;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
use std::time::Instant;
use tracing::{debug, warn};

pub struct ProcessSemaphore {
    sem: *mut libc::sem_t,
    // Keeps the pages holding `sem` mapped
    _mapping: Mapping,
}

impl ProcessSemaphore {
    pub fn new(initial: u32) -> DemoResult<Self> {
        let mapping = Mapping::anonymous(std::mem::size_of::<libc::sem_t>(), Sharing::Shared)?;
        let sem = mapping.typed::<libc::sem_t>()?;
        // SAFETY: `sem` points at zeroed, aligned, shared memory that nothing
        // else uses yet
        Errno::result(unsafe { libc::sem_init(sem, 1, initial) }).sys("sem_init")?;
        debug!(initial, "process-shared semaphore initialised");
        Ok(Self {
            sem,
            _mapping: mapping,
        })
    }

    /// Increment; wakes one waiter
    pub fn post(&self) -> DemoResult<()> {
        // SAFETY: initialised in `new`, destroyed only in Drop
        Errno::result(unsafe { libc::sem_post(self.sem) })
            .map(drop)
            .sys("sem_post")
    }

    /// Decrement, blocking while the value is zero
    pub fn wait(&self) -> DemoResult<()> {
        loop {
            // SAFETY: as in `post`
            match Errno::result(unsafe { libc::sem_wait(self.sem) }) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(DemoError::sys("sem_wait", errno)),
            }
        }
    }

    /// Decrement, blocking at most `timeout`; `false` if it expired first
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn wait_timeout(&self, timeout: Duration) -> DemoResult<bool> {
        // sem_timedwait takes an absolute CLOCK_REALTIME deadline
        let deadline = clock_gettime(ClockId::CLOCK_REALTIME).sys("clock_gettime")?
            + TimeSpec::from_duration(timeout);
        loop {
            // SAFETY: as in `post`; `deadline` is a valid timespec
            match Errno::result(unsafe { libc::sem_timedwait(self.sem, deadline.as_ref()) }) {
                Ok(_) => return Ok(true),
                Err(Errno::EINTR) => continue,
                Err(Errno::ETIMEDOUT) => return Ok(false),
                Err(errno) => return Err(DemoError::sys("sem_timedwait", errno)),
            }
        }
    }

    /// Decrement, blocking at most `timeout`; `false` if it expired first
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn wait_timeout(&self, timeout: Duration) -> DemoResult<bool> {
        // No sem_timedwait here; poll instead
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_wait()? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Decrement without blocking; `false` if the value was zero
    pub fn try_wait(&self) -> DemoResult<bool> {
        // SAFETY: as in `post`
        match Errno::result(unsafe { libc::sem_trywait(self.sem) }) {
            Ok(_) => Ok(true),
            Err(Errno::EAGAIN) => Ok(false),
            Err(errno) => Err(DemoError::sys("sem_trywait", errno)),
        }
    }

    pub fn value(&self) -> DemoResult<i32> {
        let mut value: libc::c_int = 0;
        // SAFETY: as in `post`; `value` is a valid out pointer
        Errno::result(unsafe { libc::sem_getvalue(self.sem, &mut value) }).sys("sem_getvalue")?;
        Ok(value)
    }
}

impl Drop for ProcessSemaphore {
    fn drop(&mut self) {
        // SAFETY: destroyed once, before the mapping is released
        if let Err(errno) = Errno::result(unsafe { libc::sem_destroy(self.sem) }) {
            warn!(%errno, "sem_destroy failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_then_wait() {
        let sem = ProcessSemaphore::new(0).unwrap();
        assert_eq!(sem.value().unwrap(), 0);
        sem.post().unwrap();
        assert_eq!(sem.value().unwrap(), 1);
        sem.wait().unwrap();
        assert_eq!(sem.value().unwrap(), 0);
    }

    #[test]
    fn test_try_wait_on_zero() {
        let sem = ProcessSemaphore::new(0).unwrap();
        assert!(!sem.try_wait().unwrap());
        sem.post().unwrap();
        assert!(sem.try_wait().unwrap());
    }

    #[test]
    fn test_wait_timeout_expires_when_nobody_posts() {
        let sem = ProcessSemaphore::new(0).unwrap();
        let started = std::time::Instant::now();
        assert!(!sem.wait_timeout(Duration::from_millis(50)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(sem.value().unwrap(), 0);
    }

    #[test]
    fn test_wait_timeout_takes_posted_value() {
        let sem = ProcessSemaphore::new(0).unwrap();
        sem.post().unwrap();
        assert!(sem.wait_timeout(Duration::from_secs(5)).unwrap());
        assert_eq!(sem.value().unwrap(), 0);
    }

    #[test]
    fn test_initial_value() {
        let sem = ProcessSemaphore::new(3).unwrap();
        assert_eq!(sem.value().unwrap(), 3);
    }
}
