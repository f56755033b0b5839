//! Environment-driven harness settings.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

const SHARED_ROOT_ENV: &str = "BCX_SHARED_ROOT";
const SOURCE_DIR_ENV: &str = "BCX_SOURCE_DIR";
const RPC_HOST_ENV: &str = "BCX_RPC_HOST";
const BOOT_TIMEOUT_ENV: &str = "BCX_BOOT_TIMEOUT_SECS";
const DOCKER_HOST_ENV: &str = "BCX_DOCKER_HOST";

const DEFAULT_RPC_HOST: &str = "localhost";
const DEFAULT_BOOT_TIMEOUT_SECS: u64 = 60;
const SHARED_ROOT_DIR_NAME: &str = "bcx-harness-shared";

#[derive(Debug, Clone)]
pub struct HarnessSettings {
    shared_root: PathBuf,
    source_dir: Option<PathBuf>,
    rpc_host: String,
    boot_timeout: Duration,
    docker_host: Option<String>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self::from_env()
    }
}

impl HarnessSettings {
    pub fn shared_root(&self) -> &PathBuf {
        &self.shared_root
    }

    /// Host tree bind-mounted at `/code` when a node asks for it.
    pub fn source_dir(&self) -> Option<&PathBuf> {
        self.source_dir.as_ref()
    }

    pub fn rpc_host(&self) -> &str {
        &self.rpc_host
    }

    pub fn boot_timeout(&self) -> Duration {
        self.boot_timeout
    }

    /// Engine endpoint override; `None` uses the engine's local defaults.
    pub fn docker_host(&self) -> Option<&str> {
        self.docker_host.as_deref()
    }

    pub fn with_shared_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.shared_root = root.into();
        self
    }

    pub fn with_source_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.source_dir = dir;
        self
    }

    pub fn with_rpc_host(mut self, host: impl Into<String>) -> Self {
        self.rpc_host = host.into();
        self
    }

    pub fn with_boot_timeout(mut self, timeout: Duration) -> Self {
        self.boot_timeout = timeout;
        self
    }

    pub fn from_env() -> Self {
        Self {
            shared_root: env_path(SHARED_ROOT_ENV)
                .unwrap_or_else(|| env::temp_dir().join(SHARED_ROOT_DIR_NAME)),
            source_dir: env_path(SOURCE_DIR_ENV).or_else(|| env::current_dir().ok()),
            rpc_host: env_string(RPC_HOST_ENV).unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            boot_timeout: Duration::from_secs(parse_env_u64(
                BOOT_TIMEOUT_ENV,
                DEFAULT_BOOT_TIMEOUT_SECS,
            )),
            docker_host: env_string(DOCKER_HOST_ENV),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    let Some(value) = env_string(key) else {
        return default;
    };
    match value.parse::<u64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value = %value, key, "Invalid numeric setting; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = env::var(key).ok();
            // SAFETY: Test-only environment override, serialized by ENV_LOCK.
            unsafe {
                env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn remove(key: &'static str) -> Self {
            let prev = env::var(key).ok();
            // SAFETY: Test-only environment override, serialized by ENV_LOCK.
            unsafe {
                env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: Test-only environment restoration.
            unsafe {
                match self.prev.take() {
                    Some(prev) => env::set_var(self.key, prev),
                    None => env::remove_var(self.key),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _root = EnvGuard::remove(SHARED_ROOT_ENV);
        let _host = EnvGuard::remove(RPC_HOST_ENV);
        let _timeout = EnvGuard::remove(BOOT_TIMEOUT_ENV);
        let _docker = EnvGuard::remove(DOCKER_HOST_ENV);

        let settings = HarnessSettings::from_env();
        assert_eq!(
            settings.shared_root(),
            &env::temp_dir().join(SHARED_ROOT_DIR_NAME)
        );
        assert_eq!(settings.rpc_host(), "localhost");
        assert_eq!(settings.boot_timeout(), Duration::from_secs(60));
        assert!(settings.docker_host().is_none());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _root = EnvGuard::set(SHARED_ROOT_ENV, "/var/tmp/bcx");
        let _source = EnvGuard::set(SOURCE_DIR_ENV, "/src/bcexchange");
        let _host = EnvGuard::set(RPC_HOST_ENV, " 10.0.0.7 ");
        let _timeout = EnvGuard::set(BOOT_TIMEOUT_ENV, "5");

        let settings = HarnessSettings::from_env();
        assert_eq!(settings.shared_root(), &PathBuf::from("/var/tmp/bcx"));
        assert_eq!(
            settings.source_dir(),
            Some(&PathBuf::from("/src/bcexchange"))
        );
        assert_eq!(settings.rpc_host(), "10.0.0.7");
        assert_eq!(settings.boot_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_timeout_uses_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _timeout = EnvGuard::set(BOOT_TIMEOUT_ENV, "soon");
        let settings = HarnessSettings::from_env();
        assert_eq!(
            settings.boot_timeout(),
            Duration::from_secs(DEFAULT_BOOT_TIMEOUT_SECS)
        );
    }
}
