//! Read-through cache of ledger facts with request coalescing.
//!
//! Every key has at most one read in flight. Callers that arrive while a read
//! is outstanding share it. A failed read keeps the last value and records
//! the error next to it; the next `read` retries.
//!
//! `read` and `refresh` spawn the ledger read onto the current Tokio runtime,
//! so they must be called from inside one.

use futures::future::{BoxFuture, FutureExt, Shared};
use posvault_ledger::{LedgerError, LedgerReader};
use posvault_types::{FactKey, FactValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub type Refresh = Shared<BoxFuture<'static, Result<FactValue, LedgerError>>>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FactState {
    /// Last value read, kept through invalidation and failed refreshes.
    pub value: Option<FactValue>,
    pub fresh: bool,
    pub pending: bool,
    pub error: Option<LedgerError>,
}

impl FactState {
    /// True until the first successful read lands.
    pub fn is_loading(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Default)]
struct Entry {
    value: Option<FactValue>,
    fresh: bool,
    error: Option<LedgerError>,
    // Bumped on invalidate; a read started under an older generation lands stale.
    generation: u64,
    inflight: Option<Refresh>,
}

impl Entry {
    fn state(&self) -> FactState {
        FactState {
            value: self.value,
            fresh: self.fresh,
            pending: self.inflight.is_some(),
            error: self.error.clone(),
        }
    }
}

struct CacheInner {
    reader: Arc<dyn LedgerReader>,
    entries: Mutex<HashMap<FactKey, Entry>>,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<FactKey, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn complete(&self, key: FactKey, generation: u64, result: &Result<FactValue, LedgerError>) {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.inflight = None;
        match result {
            Ok(value) => {
                entry.value = Some(*value);
                entry.error = None;
                entry.fresh = entry.generation == generation;
            }
            Err(e) => {
                warn!("Refresh of {} failed, keeping last value: {}", key, e);
                entry.error = Some(e.clone());
                entry.fresh = false;
            }
        }
    }
}

#[derive(Clone)]
pub struct FactCache {
    inner: Arc<CacheInner>,
}

impl FactCache {
    pub fn new(reader: Arc<dyn LedgerReader>) -> Self {
        Self {
            inner: Arc::new(CacheInner { reader, entries: Mutex::new(HashMap::new()) }),
        }
    }

    /// Current state of `key`. Starts a refresh when the entry is missing or
    /// stale and none is in flight; never waits for it.
    pub fn read(&self, key: &FactKey) -> FactState {
        let mut entries = self.inner.lock();
        let entry = entries.entry(*key).or_default();
        if !entry.fresh && entry.inflight.is_none() {
            let _ = self.start_refresh(*key, entry);
        }
        entry.state()
    }

    /// Current state of `key` without starting a read.
    pub fn peek(&self, key: &FactKey) -> FactState {
        self.inner.lock().get(key).map(Entry::state).unwrap_or_default()
    }

    /// The in-flight read for `key`, or a new one if none is outstanding.
    pub fn refresh(&self, key: &FactKey) -> Refresh {
        let mut entries = self.inner.lock();
        let entry = entries.entry(*key).or_default();
        match &entry.inflight {
            Some(inflight) => {
                debug!("Joining in-flight read of {}", key);
                inflight.clone()
            }
            None => self.start_refresh(*key, entry),
        }
    }

    /// Reads through to the ledger if needed and returns the settled state.
    pub async fn get(&self, key: &FactKey) -> FactState {
        let state = self.read(key);
        if state.pending {
            let _ = self.refresh(key).await;
            return self.peek(key);
        }
        state
    }

    /// Up-to-date value of `key`. A missing or stale entry waits for its
    /// refresh, joining one already in flight; a read that was overtaken by an
    /// invalidation is followed by another. When a refresh fails the stale
    /// value is returned if there is one.
    pub async fn value(&self, key: &FactKey) -> Result<FactValue, LedgerError> {
        let mut state = self.read(key);
        loop {
            if let (true, Some(value)) = (state.fresh, state.value) {
                return Ok(value);
            }
            if let Err(e) = self.refresh(key).await {
                return self.peek(key).value.ok_or(e);
            }
            state = self.read(key);
        }
    }

    /// Marks `keys` stale. The next `read` of each starts exactly one refresh.
    pub fn invalidate(&self, keys: &[FactKey]) {
        let mut entries = self.inner.lock();
        for key in keys {
            if let Some(entry) = entries.get_mut(key) {
                debug!("Invalidating {}", key);
                entry.fresh = false;
                entry.generation += 1;
            }
        }
    }

    fn start_refresh(&self, key: FactKey, entry: &mut Entry) -> Refresh {
        let inner = Arc::clone(&self.inner);
        let generation = entry.generation;
        let refresh = async move {
            let result = inner.reader.get_fact(&key).await;
            inner.complete(key, generation, &result);
            result
        }
        .boxed()
        .shared();
        entry.inflight = Some(refresh.clone());
        tokio::spawn(refresh.clone());
        refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posvault_ledger::{MemoryLedger, VaultGenesis};
    use posvault_types::Amount;

    fn setup() -> (Arc<MemoryLedger>, FactCache) {
        let ledger = Arc::new(MemoryLedger::new(&VaultGenesis::default()));
        let cache = FactCache::new(ledger.clone());
        (ledger, cache)
    }

    #[tokio::test]
    async fn first_read_is_pending_not_an_error() {
        let (_ledger, cache) = setup();
        let state = cache.read(&FactKey::Balance);
        assert!(state.pending);
        assert!(state.is_loading());
        assert_eq!(state.error, None);

        let settled = cache.get(&FactKey::Balance).await;
        assert!(settled.fresh && !settled.pending);
        assert_eq!(settled.value, Some(FactValue::Amount(Amount::from_ether(10))));
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_refresh() {
        let (ledger, cache) = setup();
        for _ in 0..5 {
            assert!(cache.read(&FactKey::FeeBps).pending);
        }
        let a = cache.refresh(&FactKey::FeeBps);
        let b = cache.refresh(&FactKey::FeeBps);
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra, rb);
        assert_eq!(ledger.read_count(&FactKey::FeeBps), 1);

        // Fresh entries are served from memory.
        cache.read(&FactKey::FeeBps);
        assert_eq!(ledger.read_count(&FactKey::FeeBps), 1);
    }

    #[tokio::test]
    async fn invalidate_then_many_reads_refresh_once() {
        let (ledger, cache) = setup();
        cache.get(&FactKey::Paused).await;
        ledger.mutate(|s| s.paused = true);

        cache.invalidate(&[FactKey::Paused]);
        let stale = cache.read(&FactKey::Paused);
        assert!(!stale.fresh);
        assert_eq!(stale.value, Some(FactValue::Flag(false)));
        cache.read(&FactKey::Paused);
        cache.read(&FactKey::Paused);

        let settled = cache.get(&FactKey::Paused).await;
        assert_eq!(settled.value, Some(FactValue::Flag(true)));
        assert!(settled.fresh);
        assert_eq!(ledger.read_count(&FactKey::Paused), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_value() {
        let (ledger, cache) = setup();
        cache.get(&FactKey::Balance).await;
        cache.invalidate(&[FactKey::Balance]);
        ledger.fail_reads(Some("rpc down"));

        let state = cache.get(&FactKey::Balance).await;
        assert_eq!(state.value, Some(FactValue::Amount(Amount::from_ether(10))));
        assert!(!state.fresh);
        assert_eq!(state.error, Some(LedgerError::Unavailable("rpc down".into())));

        ledger.fail_reads(None);
        let state = cache.get(&FactKey::Balance).await;
        assert!(state.fresh);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn value_refreshes_stale_entry() {
        let (ledger, cache) = setup();
        assert_eq!(cache.value(&FactKey::Paused).await, Ok(FactValue::Flag(false)));
        ledger.mutate(|s| s.paused = true);

        // Fresh entries are not re-read.
        assert_eq!(cache.value(&FactKey::Paused).await, Ok(FactValue::Flag(false)));
        assert_eq!(ledger.read_count(&FactKey::Paused), 1);

        cache.invalidate(&[FactKey::Paused]);
        assert_eq!(cache.value(&FactKey::Paused).await, Ok(FactValue::Flag(true)));
        assert_eq!(ledger.read_count(&FactKey::Paused), 2);

        cache.invalidate(&[FactKey::Paused]);
        ledger.fail_reads(Some("rpc down"));
        assert_eq!(cache.value(&FactKey::Paused).await, Ok(FactValue::Flag(true)));
        assert_eq!(
            cache.value(&FactKey::Treasury).await,
            Err(LedgerError::Unavailable("rpc down".into()))
        );
    }

    #[tokio::test]
    async fn invalidate_during_flight_lands_stale() {
        let (ledger, cache) = setup();
        cache.read(&FactKey::Owner);
        cache.invalidate(&[FactKey::Owner]);
        cache.refresh(&FactKey::Owner).await.unwrap();

        let state = cache.peek(&FactKey::Owner);
        assert!(!state.fresh);
        cache.get(&FactKey::Owner).await;
        assert_eq!(ledger.read_count(&FactKey::Owner), 2);
    }
}
