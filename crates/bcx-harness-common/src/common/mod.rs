mod sync;
pub mod telemetry;

pub use sync::mutex_lock_or_recover;
pub use sync::poison_recovery_count;
pub use telemetry::TelemetryGuard;
pub use telemetry::init_tracing;
