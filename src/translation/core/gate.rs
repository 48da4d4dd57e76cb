//! 并发闸门
//!
//! 限制同时进行的推理调用数量。许可以 RAII 方式持有，
//! 无论调用成功、失败、超时还是被取消，丢弃许可即归还名额。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::translation::error::{TranslationError, TranslationResult};

/// 推理并发闸门
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// 闸门许可，丢弃时释放名额
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// 等待一个名额
    pub async fn acquire(&self) -> TranslationResult<GatePermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| TranslationError::InternalError("并发闸门已关闭".to_string()))?;
        Ok(GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let gate = ConcurrencyGate::new(2);
        let a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);
        assert_eq!(gate.in_flight(), 2);

        drop(a);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised_to_one() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.capacity(), 1);
    }

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let gate = ConcurrencyGate::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let gate = gate.clone();
                let current = current.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _permit = gate.acquire().await.unwrap();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_nothing() {
        let gate = ConcurrencyGate::new(1);
        let held = gate.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(10), gate.acquire()).await;
        assert!(waiting.is_err());

        drop(held);
        assert_eq!(gate.available(), 1);
    }
}
