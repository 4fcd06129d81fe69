use std::time::Duration;

// count: one tick per PERIOD increments, as in the classic gdb loop
pub const COUNT_PERIOD_DEFAULT: u64 = 100_000_000;

pub const MUTEX_THREADS_DEFAULT: usize = 4;
pub const MUTEX_ITERATIONS_DEFAULT: u64 = 100_000;

pub const SHM_CHILDREN_DEFAULT: usize = 2;
pub const SHM_ITERATIONS_DEFAULT: u64 = 10_000;
pub const SHM_NAMESPACE: &str = "sysdemo-shm";
// Lock region plus one u64 counter fits comfortably in a page
pub const SHM_SEGMENT_SIZE: usize = 4096;

// semaphore: how long the parent waits for the child to post
pub const SEMAPHORE_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub const MMAP_MESSAGE_DEFAULT: &str = "hello mmap";
pub const SOCKET_MESSAGE_DEFAULT: &str = "hello socket";
pub const SOCKET_IO_TIMEOUT: Duration = Duration::from_secs(5);

pub const CONFIG_ENV: &str = "SYSDEMO_CONFIG";
pub const ENV_PREFIX: &str = "SYSDEMO";
pub const CONFIG_DIRECTORY: &str = ".sysdemo";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_LOG_FILTER: &str = "warn,sysdemo=info";
