//! Teardown on interrupt.

use std::ffi::c_int;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGTERM;
use signal_hook::iterator::Handle;
use signal_hook::iterator::Signals;
use tracing::info;
use tracing::warn;

use crate::error::HarnessError;
use crate::error::Result;
use crate::teardown::TeardownRegistry;

/// Drains a [`TeardownRegistry`] when the process is interrupted.
///
/// The listener thread lives as long as the guard. Dropping the guard waits
/// for a teardown already in progress.
pub struct TeardownOnSignal {
    handle: Handle,
    join: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TeardownOnSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeardownOnSignal").finish_non_exhaustive()
    }
}

impl TeardownOnSignal {
    /// Listens for SIGINT and SIGTERM. Once the hooks ran, `on_drained`
    /// receives the signal number.
    pub fn install<F>(registry: Arc<TeardownRegistry>, on_drained: F) -> Result<Self>
    where
        F: FnOnce(c_int) + Send + 'static,
    {
        Self::install_for(&[SIGINT, SIGTERM], registry, on_drained)
    }

    pub fn install_for<F>(
        signals: &[c_int],
        registry: Arc<TeardownRegistry>,
        on_drained: F,
    ) -> Result<Self>
    where
        F: FnOnce(c_int) + Send + 'static,
    {
        let mut signals = Signals::new(signals)
            .map_err(|err| HarnessError::environment("install signal handler", err))?;
        let handle = signals.handle();

        let join = thread::Builder::new()
            .name("teardown-signals".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    info!(
                        signal,
                        pending = registry.pending(),
                        "Received signal, running teardown"
                    );
                    let report = registry.run();
                    if !report.is_clean() {
                        warn!(
                            failures = report.failures.len(),
                            "Teardown after signal finished with failures"
                        );
                    }
                    on_drained(signal);
                }
            })
            .map_err(|err| HarnessError::environment("spawn signal listener", err))?;

        Ok(Self {
            handle,
            join: Some(join),
        })
    }
}

impl Drop for TeardownOnSignal {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
