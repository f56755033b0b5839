//! Process-scoped cleanup callbacks.
//!
//! Harnesses register hooks as they acquire resources (containers, shared
//! directories). The owner of the process, usually the scenario runner, calls
//! [`TeardownRegistry::run`] once at shutdown. Hooks run newest first and a
//! failing or panicking hook never prevents the rest from running.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use bcx_harness_common::mutex_lock_or_recover;
use tracing::debug;
use tracing::warn;

type Hook = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

struct Entry {
    label: String,
    hook: Hook,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub ran: usize,
    /// `label: error` for every hook that failed or panicked.
    pub failures: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
pub struct TeardownRegistry {
    hooks: Mutex<Vec<Entry>>,
}

impl std::fmt::Debug for TeardownRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeardownRegistry")
            .field("pending", &self.pending())
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<TeardownRegistry>> = OnceLock::new();

impl TeardownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every harness in this process.
    pub fn global() -> Arc<TeardownRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TeardownRegistry::new())))
    }

    pub fn register<F>(&self, label: impl Into<String>, hook: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let label = label.into();
        debug!(hook = %label, "Teardown hook registered");
        mutex_lock_or_recover(&self.hooks).push(Entry {
            label,
            hook: Box::new(hook),
        });
    }

    pub fn pending(&self) -> usize {
        mutex_lock_or_recover(&self.hooks).len()
    }

    /// Drains and runs every hook in LIFO order. Hooks registered while
    /// running are picked up by the same call. Safe to call repeatedly.
    pub fn run(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        loop {
            let entry = mutex_lock_or_recover(&self.hooks).pop();
            let Some(Entry { label, hook }) = entry else {
                break;
            };
            report.ran += 1;
            match std::panic::catch_unwind(AssertUnwindSafe(hook)) {
                Ok(Ok(())) => debug!(hook = %label, "Teardown hook finished"),
                Ok(Err(err)) => {
                    warn!(hook = %label, error = %err, "Teardown hook failed");
                    report.failures.push(format!("{label}: {err}"));
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(hook = %label, panic = %message, "Teardown hook panicked");
                    report.failures.push(format!("{label}: panicked: {message}"));
                }
            }
        }
        report
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
