//! Demo settings
//!
//! Precedence: CLI flags > ENV > config.toml > defaults.
//! ENV prefix `SYSDEMO`, separator `__`, e.g. `SYSDEMO__MUTEX__THREADS=8`.
//! The file is `$SYSDEMO_CONFIG` if set, else `~/.sysdemo/config.toml`.

use crate::config::{
    CONFIG_DIRECTORY, CONFIG_ENV, CONFIG_FILE_NAME, COUNT_PERIOD_DEFAULT, ENV_PREFIX,
    MMAP_MESSAGE_DEFAULT, MUTEX_ITERATIONS_DEFAULT, MUTEX_THREADS_DEFAULT, SHM_CHILDREN_DEFAULT,
    SHM_ITERATIONS_DEFAULT, SOCKET_MESSAGE_DEFAULT,
};
use crate::error::{DemoError, DemoResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// tracing filter, e.g. `debug` or `warn,sysdemo=trace`
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub count: CountSettings,
    #[serde(default)]
    pub mutex: MutexSettings,
    #[serde(default)]
    pub shm: ShmSettings,
    #[serde(default)]
    pub mmap: MessageSettings,
    #[serde(default = "MessageSettings::socket_default")]
    pub socket: MessageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: None,
            count: CountSettings::default(),
            mutex: MutexSettings::default(),
            shm: ShmSettings::default(),
            mmap: MessageSettings::default(),
            socket: MessageSettings::socket_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountSettings {
    pub period: u64,
}

impl Default for CountSettings {
    fn default() -> Self {
        Self {
            period: COUNT_PERIOD_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutexSettings {
    pub threads: usize,
    pub iterations: u64,
}

impl Default for MutexSettings {
    fn default() -> Self {
        Self {
            threads: MUTEX_THREADS_DEFAULT,
            iterations: MUTEX_ITERATIONS_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShmSettings {
    pub children: usize,
    pub iterations: u64,
}

impl Default for ShmSettings {
    fn default() -> Self {
        Self {
            children: SHM_CHILDREN_DEFAULT,
            iterations: SHM_ITERATIONS_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSettings {
    pub message: String,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            message: MMAP_MESSAGE_DEFAULT.to_string(),
        }
    }
}

impl MessageSettings {
    fn socket_default() -> Self {
        Self {
            message: SOCKET_MESSAGE_DEFAULT.to_string(),
        }
    }
}

/// Location of the optional settings file
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(CONFIG_DIRECTORY).join(CONFIG_FILE_NAME))
}

impl Settings {
    pub fn load() -> DemoResult<Self> {
        Self::load_from(config_file_path().as_deref())
    }

    /// Load from `path` (missing file is fine) and the environment
    pub fn load_from(path: Option<&Path>) -> DemoResult<Self> {
        use config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "settings file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .and_then(|built| built.try_deserialize::<Settings>())
            .map_err(|err| DemoError::Config {
                message: err.to_string(),
            })?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial(env)]
    fn test_defaults_without_file() {
        let settings = Settings::load_from(None).unwrap();
        assert_eq!(settings.count.period, COUNT_PERIOD_DEFAULT);
        assert_eq!(settings.mutex.threads, MUTEX_THREADS_DEFAULT);
        assert_eq!(settings.mmap.message, MMAP_MESSAGE_DEFAULT);
        assert_eq!(settings.socket.message, SOCKET_MESSAGE_DEFAULT);
        assert_eq!(settings.log_level, None);
    }

    #[test]
    #[serial(env)]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.shm.children, SHM_CHILDREN_DEFAULT);
    }

    #[test]
    #[serial(env)]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
log_level = "debug"

[mutex]
threads = 2

[socket]
message = "ping"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.mutex.threads, 2);
        assert_eq!(settings.mutex.iterations, MUTEX_ITERATIONS_DEFAULT);
        assert_eq!(settings.socket.message, "ping");
    }

    #[test]
    #[serial(env)]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[shm]\nchildren = 3\n").unwrap();

        std::env::set_var("SYSDEMO__SHM__CHILDREN", "5");
        let settings = Settings::load_from(Some(&path));
        std::env::remove_var("SYSDEMO__SHM__CHILDREN");

        assert_eq!(settings.unwrap().shm.children, 5);
    }

    #[test]
    #[serial(env)]
    fn test_invalid_file_reports_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[mutex]\nthreads = \"many\"\n").unwrap();

        let err = Settings::load_from(Some(&path)).unwrap_err();
        assert!(matches!(err, DemoError::Config { .. }));
    }

    #[test]
    #[serial(env)]
    fn test_config_env_selects_file() {
        std::env::set_var(CONFIG_ENV, "/tmp/custom-sysdemo.toml");
        let path = config_file_path();
        std::env::remove_var(CONFIG_ENV);
        assert_eq!(path, Some(PathBuf::from("/tmp/custom-sysdemo.toml")));
    }
}
