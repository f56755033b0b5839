use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

static POISON_RECOVERY_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn poison_recovery_count() -> u64 {
    POISON_RECOVERY_COUNT.load(Ordering::Relaxed)
}

/// Locks `lock`, taking the inner value back if a teardown hook or engine
/// call panicked while holding it.
pub fn mutex_lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        POISON_RECOVERY_COUNT.fetch_add(1, Ordering::Relaxed);
        error!("Mutex poisoned by a panicking holder; recovering inner state");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lock_recovers_after_poison() {
        let lock = Arc::new(Mutex::new(vec![1]));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(lock.is_poisoned());
        let before = poison_recovery_count();
        let mut guard = mutex_lock_or_recover(&lock);
        guard.push(2);
        assert_eq!(*guard, vec![1, 2]);
        assert!(poison_recovery_count() > before);
    }

    #[test]
    fn test_lock_healthy_mutex() {
        let lock = Mutex::new(5);
        assert_eq!(*mutex_lock_or_recover(&lock), 5);
    }
}
