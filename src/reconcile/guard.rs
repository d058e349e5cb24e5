use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Single-flight guard: at most one pass per wallet at a time.
///
/// Share one guard (via `Arc`) between every engine that may touch the same
/// cursor key so the scheduler and the on-demand trigger cannot interleave.
#[derive(Default)]
pub struct PassGuard {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PassGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other pass holds `key`
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Whether a pass currently holds `key`
    pub fn is_busy(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, sleep};

    #[tokio::test]
    async fn test_serializes_same_key() {
        let guard = Arc::new(PassGuard::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let guard = guard.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _permit = guard.acquire("rWallet").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let guard = PassGuard::new();
        let _a = guard.acquire("rA").await;
        assert!(guard.is_busy("rA"));
        assert!(!guard.is_busy("rB"));
        let _b = guard.acquire("rB").await;
        assert!(guard.is_busy("rB"));
    }
}
