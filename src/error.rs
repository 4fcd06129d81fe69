//! Unified error handling for the demonstrations
//!
//! Every demonstration reports failure through [`DemoError`]. The variants
//! follow the failure sources a single-shot system call demo can hit: the
//! call itself, plain I/O, bad arguments, a misbehaving child and a violated
//! expectation about OS behavior.

use std::fmt;
use std::io;
use thiserror::Error;

#[cfg(unix)]
use nix::errno::Errno;

/// Main error type for the demonstrations
#[derive(Error, Debug)]
pub enum DemoError {
    /// A system call returned an error
    #[cfg(unix)]
    #[error("{call}: {source}")]
    Sys {
        call: &'static str,
        #[source]
        source: Errno,
    },

    /// Filesystem or socket I/O errors
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Invalid argument or setting
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    /// Child process did not exit normally with status 0
    #[error("child {pid} terminated abnormally: {status}")]
    ChildFailed { pid: i32, status: String },

    /// The OS did not behave as the demonstration expects
    #[error("Invariant violated: {message}")]
    Invariant { message: String },

    /// Shared memory segment errors
    #[error("Shared memory error ({segment}): {message}")]
    SharedMemory { segment: String, message: String },

    /// Settings loading errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type DemoResult<T> = Result<T, DemoError>;

/// Error category, used by the binary to pick a message prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    System,
    Io,
    Validation,
    Process,
    Invariant,
    Resource,
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::System => "system",
            ErrorCategory::Io => "io",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Process => "process",
            ErrorCategory::Invariant => "invariant",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Config => "config",
        }
    }
}

impl DemoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            #[cfg(unix)]
            DemoError::Sys { .. } => ErrorCategory::System,
            DemoError::Io { .. } => ErrorCategory::Io,
            DemoError::Validation { .. } => ErrorCategory::Validation,
            DemoError::ChildFailed { .. } => ErrorCategory::Process,
            DemoError::Invariant { .. } => ErrorCategory::Invariant,
            DemoError::SharedMemory { .. } => ErrorCategory::Resource,
            DemoError::Config { .. } => ErrorCategory::Config,
        }
    }

    #[cfg(unix)]
    pub fn sys(call: &'static str, source: Errno) -> Self {
        DemoError::Sys { call, source }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        DemoError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DemoError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        DemoError::Invariant {
            message: message.into(),
        }
    }

    /// Message shown to the user by the binary
    pub fn user_message(&self) -> String {
        format!("[{}] {}", self.category(), self)
    }
}

/// Fail with [`DemoError::Invariant`] unless `cond` holds
pub fn ensure(cond: bool, message: impl FnOnce() -> String) -> DemoResult<()> {
    if cond {
        Ok(())
    } else {
        Err(DemoError::invariant(message()))
    }
}

/// Attach a system call name to an errno result
#[cfg(unix)]
pub trait SysContext<T> {
    fn sys(self, call: &'static str) -> DemoResult<T>;
}

#[cfg(unix)]
impl<T> SysContext<T> for nix::Result<T> {
    fn sys(self, call: &'static str) -> DemoResult<T> {
        self.map_err(|errno| DemoError::sys(call, errno))
    }
}

/// Attach a context description to an I/O result
pub trait IoContext<T> {
    fn io_context(self, context: &str) -> DemoResult<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, context: &str) -> DemoResult<T> {
        self.map_err(|err| DemoError::io(context, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            DemoError::validation("threads", "must be positive").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            DemoError::invariant("pid mismatch").category(),
            ErrorCategory::Invariant
        );
        assert_eq!(
            DemoError::ChildFailed {
                pid: 42,
                status: "signaled SIGKILL".to_string()
            }
            .category(),
            ErrorCategory::Process
        );
    }

    #[test]
    fn test_user_message_has_category_prefix() {
        let err = DemoError::validation("period", "must be greater than zero");
        assert_eq!(
            err.user_message(),
            "[validation] Validation error: period: must be greater than zero"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_sys_context_names_the_call() {
        let result: nix::Result<()> = Err(Errno::EINVAL);
        let err = result.sys("sem_init").unwrap_err();
        assert!(err.to_string().starts_with("sem_init: "));
        assert_eq!(err.category(), ErrorCategory::System);
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, || "unused".to_string()).is_ok());
        let err = ensure(false, || "counter was 1".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Invariant violated: counter was 1");
    }
}
