//! Bounded browser session pool
//!
//! Browser sessions are expensive and slow to launch, so the pool enforces a
//! hard ceiling on how many exist, reuses idle ones, and lazily constructs new
//! ones up to the ceiling. Admission is FIFO via a counting semaphore; the slot
//! list itself is guarded by a short critical section, and session construction
//! always happens outside that lock so unrelated leases do not serialize.

use crate::browser::session::{ChallengeSession, SessionFactory};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Snapshot of pool occupancy for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Sessions currently leased out
    pub busy: usize,
    /// Idle sessions available for reuse
    pub free: usize,
    /// Total live sessions
    pub total: usize,
}

struct Slot {
    id: u64,
    session: Arc<dyn ChallengeSession>,
    busy: bool,
}

struct PoolShared {
    slots: Mutex<Vec<Slot>>,
    closed: AtomicBool,
}

impl PoolShared {
    /// Return a lease's slot to the pool, or drop it when defective/closed.
    fn release(&self, id: u64, defective: bool) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        let closed = self.closed.load(Ordering::SeqCst);
        if defective || closed {
            if let Some(pos) = slots.iter().position(|slot| slot.id == id) {
                let slot = slots.remove(pos);
                drop(slots);
                // Teardown must not block the release path
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move { slot.session.terminate().await });
                }
            }
        } else if let Some(slot) = slots.iter_mut().find(|slot| slot.id == id) {
            slot.busy = false;
        }
    }
}

/// Exclusive lease of one pooled browser session.
///
/// Dropping the lease marks the slot idle and frees pool capacity for the next
/// waiter, so a timeout or error anywhere above never leaks a session.
pub struct SessionLease {
    id: u64,
    session: Arc<dyn ChallengeSession>,
    shared: Arc<PoolShared>,
    defective: AtomicBool,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("id", &self.id)
            .field("defective", &self.defective.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SessionLease {
    /// Pool-assigned id of the leased session
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The leased session capability
    pub fn session(&self) -> &dyn ChallengeSession {
        self.session.as_ref()
    }

    /// Mark the session unusable; it is terminated instead of returned.
    pub fn mark_defective(&self) {
        self.defective.store(true, Ordering::SeqCst);
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.shared
            .release(self.id, self.defective.load(Ordering::SeqCst));
        // permit drops afterwards, waking the next waiter
    }
}

/// Bounded pool of browser sessions
pub struct BrowserPool {
    factory: Arc<dyn SessionFactory>,
    semaphore: Arc<Semaphore>,
    shared: Arc<PoolShared>,
    next_id: AtomicU64,
}

impl BrowserPool {
    /// Create a pool with a hard ceiling of `max_sessions` live sessions
    pub fn new(max_sessions: usize, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            semaphore: Arc::new(Semaphore::new(max_sessions)),
            shared: Arc::new(PoolShared {
                slots: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Lease a session, waiting up to `deadline` for capacity.
    ///
    /// Reuses the first idle live session; sessions found dead are discarded on
    /// encounter. When no idle session exists the factory constructs a new one
    /// outside the slot lock. Construction failure returns the capacity permit
    /// to the next waiter.
    pub async fn acquire(&self, deadline: Duration) -> crate::Result<SessionLease> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(crate::Error::PoolClosed);
        }

        let permit = tokio::time::timeout(deadline, self.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| crate::Error::pool_exhausted(deadline.as_secs()))?
            .map_err(|_| crate::Error::PoolClosed)?;

        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(crate::Error::PoolClosed);
        }

        // Reuse an idle slot, dropping dead ones on the way
        let mut dead = Vec::new();
        let reused = {
            let mut slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| crate::Error::internal("pool slot list poisoned"))?;
            slots.retain_mut(|slot| {
                if !slot.busy && !slot.session.is_alive() {
                    dead.push(Arc::clone(&slot.session));
                    false
                } else {
                    true
                }
            });
            slots.iter_mut().find(|slot| !slot.busy).map(|slot| {
                slot.busy = true;
                (slot.id, Arc::clone(&slot.session))
            })
        };
        for session in dead {
            tracing::warn!("Discarding dead browser session from pool");
            session.terminate().await;
        }

        let (id, session) = match reused {
            Some(found) => found,
            None => {
                // Slow path: launch a new session outside the slot lock
                let session = self.factory.create().await?;
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let mut slots = self
                    .shared
                    .slots
                    .lock()
                    .map_err(|_| crate::Error::internal("pool slot list poisoned"))?;
                slots.push(Slot {
                    id,
                    session: Arc::clone(&session),
                    busy: true,
                });
                tracing::debug!(session_id = id, total = slots.len(), "Launched new browser session");
                (id, session)
            }
        };

        Ok(SessionLease {
            id,
            session,
            shared: Arc::clone(&self.shared),
            defective: AtomicBool::new(false),
            _permit: permit,
        })
    }

    /// Current occupancy counters; `busy + free == total` always holds
    pub fn stats(&self) -> PoolStats {
        let Ok(slots) = self.shared.slots.lock() else {
            return PoolStats {
                busy: 0,
                free: 0,
                total: 0,
            };
        };
        let busy = slots.iter().filter(|slot| slot.busy).count();
        let total = slots.len();
        PoolStats {
            busy,
            free: total - busy,
            total,
        }
    }

    /// Quiesce the pool: reject further acquires and tear down all sessions.
    ///
    /// Teardown is best-effort; errors from dying browsers are swallowed.
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.semaphore.close();
        let sessions: Vec<_> = match self.shared.slots.lock() {
            Ok(mut slots) => slots.drain(..).map(|slot| slot.session).collect(),
            Err(_) => Vec::new(),
        };
        for session in sessions {
            session.terminate().await;
        }
        tracing::info!("Browser pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::session::{ElementRef, SessionFactory};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    struct FakeSession {
        alive: AtomicBool,
    }

    impl FakeSession {
        fn new() -> Self {
            Self {
                alive: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl ChallengeSession for FakeSession {
        async fn navigate(&self, _url: &str) -> crate::Result<()> {
            Ok(())
        }
        async fn evaluate_script(&self, _js: &str) -> crate::Result<Option<String>> {
            Ok(None)
        }
        async fn find_element(
            &self,
            _selector: &str,
            _timeout: Duration,
        ) -> crate::Result<Option<ElementRef>> {
            Ok(None)
        }
        async fn click(&self, _element: &ElementRef) -> crate::Result<()> {
            Ok(())
        }
        async fn current_title(&self) -> crate::Result<String> {
            Ok(String::new())
        }
        async fn current_cookies(&self) -> crate::Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
        async fn current_user_agent(&self) -> crate::Result<String> {
            Ok("fake".to_string())
        }
        async fn capture_screenshot(&self) -> crate::Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
        async fn terminate(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }
    }

    struct CountingFactory {
        created: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                created: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl SessionFactory for CountingFactory {
        async fn create(&self) -> crate::Result<Arc<dyn ChallengeSession>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(crate::Error::automation("launch failed"));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeSession::new()))
        }
    }

    #[tokio::test]
    async fn test_acquire_creates_lazily_and_reuses() {
        let factory = Arc::new(CountingFactory::new());
        let pool = BrowserPool::new(2, factory.clone());

        let lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats(), PoolStats { busy: 1, free: 0, total: 1 });
        drop(lease);

        let _lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        // The idle session is reused, no second launch
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats(), PoolStats { busy: 1, free: 0, total: 1 });
    }

    #[tokio::test]
    async fn test_ceiling_blocks_further_acquires() {
        let pool = Arc::new(BrowserPool::new(1, Arc::new(CountingFactory::new())));
        let lease = pool.acquire(Duration::from_secs(1)).await.unwrap();

        // Second acquire must time out while the only slot is leased
        let err = pool.acquire(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, crate::Error::PoolExhausted { .. }));

        drop(lease);
        let _lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_does_not_leak_capacity() {
        let pool = Arc::new(BrowserPool::new(1, Arc::new(CountingFactory::new())));
        let lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        let before = pool.stats();

        let _ = pool.acquire(Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(pool.stats(), before);

        drop(lease);
        assert_eq!(pool.stats().busy, 0);
    }

    #[tokio::test]
    async fn test_construction_failure_returns_permit() {
        let factory = Arc::new(CountingFactory::new());
        factory.fail.store(true, Ordering::SeqCst);
        let pool = BrowserPool::new(1, factory.clone());

        let err = pool.acquire(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, crate::Error::ChallengeAutomation { .. }));

        // The permit was returned: a later acquire can succeed
        factory.fail.store(false, Ordering::SeqCst);
        let lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_eq!(lease.session().current_user_agent().await.unwrap(), "fake");
    }

    #[tokio::test]
    async fn test_defective_lease_is_not_reused() {
        let factory = Arc::new(CountingFactory::new());
        let pool = BrowserPool::new(1, factory.clone());

        let lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        lease.mark_defective();
        drop(lease);
        // Give the spawned teardown a tick to run
        tokio::task::yield_now().await;
        assert_eq!(pool.stats().total, 0);

        let _lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dead_session_discarded_on_encounter() {
        let factory = Arc::new(CountingFactory::new());
        let pool = BrowserPool::new(1, factory.clone());

        let lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        lease.session().terminate().await; // simulate a crashed browser
        drop(lease);

        let _lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().total, 1);
    }

    #[tokio::test]
    async fn test_fifo_waiters_are_served_on_release() {
        let pool = Arc::new(BrowserPool::new(1, Arc::new(CountingFactory::new())));
        let lease = pool.acquire(Duration::from_secs(1)).await.unwrap();

        let waiter_pool = Arc::clone(&pool);
        let waiter = tokio::spawn(async move {
            waiter_pool.acquire(Duration::from_secs(5)).await
        });
        tokio::task::yield_now().await;

        drop(lease);
        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_acquire() {
        let pool = BrowserPool::new(2, Arc::new(CountingFactory::new()));
        let _lease = pool.acquire(Duration::from_secs(1)).await.unwrap();
        pool.shutdown().await;

        let err = pool.acquire(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, crate::Error::PoolClosed));
        assert_eq!(pool.stats().total, 0);
    }
}
