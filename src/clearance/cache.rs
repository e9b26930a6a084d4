//! Per-domain clearance cache with single-flight refresh
//!
//! Solving a challenge costs a browser lease and many seconds, so concurrent
//! callers for the same domain must share one solve. Refresh runs inside a
//! per-domain critical section guarding a double-check of the cache: whoever
//! enters first solves, everyone queued behind re-reads the fresh entry.
//! Different domains never block each other, and no map-wide lock is held
//! across a solve.

use crate::types::ClearanceInfo;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One domain's anti-bot clearance
#[derive(Debug, Clone)]
pub struct Clearance {
    /// Lowercase host the clearance applies to
    pub domain: String,
    /// Cookie set, keyed by cookie name
    pub cookies: HashMap<String, String>,
    /// User agent the cookies were issued under
    pub user_agent: String,
    /// When the clearance was obtained
    pub issued_at: DateTime<Utc>,
    /// When the clearance stops being served
    pub expires_at: DateTime<Utc>,
}

impl Clearance {
    /// Create a clearance valid for `ttl` from now
    pub fn new(
        domain: impl Into<String>,
        cookies: HashMap<String, String>,
        user_agent: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let issued_at = Utc::now();
        Self {
            domain: domain.into(),
            cookies,
            user_agent: user_agent.into(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// Whether the clearance is still within its TTL
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }

    /// Diagnostic view without the cookie values
    pub fn info(&self) -> ClearanceInfo {
        ClearanceInfo {
            domain: self.domain.clone(),
            user_agent: self.user_agent.clone(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

/// Domain-keyed clearance cache
pub struct ClearanceCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Clearance>>,
    /// Per-domain refresh gates; the map lock is only held to fetch a gate
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ClearanceCache {
    /// Create a cache whose entries live for `ttl_secs` seconds
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            entries: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// TTL applied to newly stored clearances
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a valid clearance for `domain`, refreshing via `solve` on miss.
    ///
    /// Concurrent callers for one domain serialize on its gate; all but the
    /// first observe the stored result through the double-check instead of
    /// solving again. A failed solve stores nothing; the caller next through
    /// the gate performs a fresh attempt.
    pub async fn ensure_valid<F, Fut>(&self, domain: &str, solve: F) -> crate::Result<Clearance>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::Result<Clearance>>,
    {
        if let Some(clearance) = self.lookup(domain).await {
            return Ok(clearance);
        }

        let gate = self.domain_gate(domain).await;
        let _guard = gate.lock().await;

        // Double-check: a caller ahead of us may have refreshed already
        if let Some(clearance) = self.lookup(domain).await {
            return Ok(clearance);
        }

        let clearance = solve().await?;
        let mut entries = self.entries.write().await;
        entries.insert(domain.to_string(), clearance.clone());
        tracing::info!(
            domain,
            expires_at = %clearance.expires_at,
            "Stored fresh clearance"
        );
        Ok(clearance)
    }

    /// Remove the cached entry for `domain`; returns whether one existed
    pub async fn invalidate(&self, domain: &str) -> bool {
        let removed = self.entries.write().await.remove(domain).is_some();
        if removed {
            tracing::info!(domain, "Invalidated cached clearance");
        }
        removed
    }

    /// Non-blocking diagnostic read; never triggers a refresh
    pub async fn peek(&self, domain: &str) -> Option<Clearance> {
        self.entries.read().await.get(domain).cloned()
    }

    /// Number of unexpired cached clearances
    pub async fn active_count(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|clearance| clearance.is_valid())
            .count()
    }

    /// Diagnostic listing of all cached clearances, sorted by domain
    pub async fn snapshot(&self) -> Vec<ClearanceInfo> {
        let mut infos: Vec<ClearanceInfo> = self
            .entries
            .read()
            .await
            .values()
            .map(Clearance::info)
            .collect();
        infos.sort_by(|a, b| a.domain.cmp(&b.domain));
        infos
    }

    /// Valid-entry lookup with lazy eviction of a stale entry
    async fn lookup(&self, domain: &str) -> Option<Clearance> {
        {
            let entries = self.entries.read().await;
            match entries.get(domain) {
                Some(clearance) if clearance.is_valid() => return Some(clearance.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Entry observed stale: evict it, unless it was refreshed in between
        let mut entries = self.entries.write().await;
        if let Some(clearance) = entries.get(domain) {
            if clearance.is_valid() {
                return Some(clearance.clone());
            }
            entries.remove(domain);
            tracing::debug!(domain, "Evicted expired clearance");
        }
        None
    }

    async fn domain_gate(&self, domain: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
