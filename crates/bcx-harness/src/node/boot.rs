use std::time::Duration;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;
use tracing::info;

use super::NodeHarness;
use crate::error::HarnessError;
use crate::error::Result;
use crate::polling::PollPolicy;
use crate::polling::poll_until;
use crate::settings::HarnessSettings;

pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_BOOT_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the daemon's RPC server to accept connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootPolicy {
    timeout: Duration,
    interval: Duration,
}

impl Default for BootPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_BOOT_TIMEOUT,
            interval: DEFAULT_BOOT_INTERVAL,
        }
    }
}

impl BootPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self {
            timeout: settings.boot_timeout(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.timeout, self.interval)
    }
}

impl NodeHarness {
    /// Polls `getinfo` until the daemon answers, using the settings' boot
    /// timeout. Returns the `getinfo` result.
    pub fn wait_for_boot(&self) -> Result<Value> {
        self.wait_for_boot_with(&BootPolicy::from_settings(self.context.settings()))
    }

    /// Only connection-level failures are retried; an RPC error or any other
    /// failure ends the wait at once.
    pub fn wait_for_boot_with(&self, policy: &BootPolicy) -> Result<Value> {
        let client = self.client()?;
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let info = poll_until(
            &policy.poll_policy(),
            HarnessError::is_transient_transport,
            || {
                attempts += 1;
                match client.rpc("getinfo", &[]) {
                    Ok(info) => Ok(Some(info)),
                    Err(err) => {
                        debug!(container = %self.name, attempt = attempts, error = %err, "Daemon not ready");
                        Err(err)
                    }
                }
            },
        )?;
        info!(
            container = %self.name,
            attempts,
            elapsed_ms = started.elapsed().as_millis(),
            "Daemon accepting RPC"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BootPolicy::default();
        assert_eq!(policy.timeout(), Duration::from_secs(60));
        assert_eq!(policy.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = HarnessSettings::from_env().with_boot_timeout(Duration::from_secs(7));
        let policy = BootPolicy::from_settings(&settings);
        assert_eq!(policy.timeout(), Duration::from_secs(7));
        assert_eq!(policy.interval(), DEFAULT_BOOT_INTERVAL);
    }
}
