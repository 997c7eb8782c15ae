use async_trait::async_trait;
use posvault_types::{FactKey, FactValue, Identity, Submission, TxReference, VaultOperation};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

use crate::execution::{execute_operation, ExecutionContext};
use crate::genesis::{create_genesis_state, VaultGenesis};
use crate::state::VaultState;
use crate::{FinalityOutcome, LedgerError, LedgerReader, LedgerWriter, SubmitError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub height: u64,
    pub executed: usize,
    pub reverted: usize,
}

enum FinalitySlot {
    Pending(Vec<oneshot::Sender<FinalityOutcome>>),
    Final(FinalityOutcome),
}

#[derive(Default)]
struct LedgerInner {
    state: VaultState,
    height: u64,
    mempool: Vec<(Submission, TxReference)>,
    finality: HashMap<TxReference, FinalitySlot>,
    nonces: HashMap<Identity, u64>,

    // Test and simulation controls.
    reads: HashMap<FactKey, usize>,
    submissions: usize,
    decline_next: Option<String>,
    fail_reads: Option<String>,
    hold_approvals: bool,
}

/// A single vault held in memory. Submissions queue until [`MemoryLedger::mine`]
/// runs, either called directly or from [`MemoryLedger::run_block_producer`].
/// Each outcome is handed out once, to the waiters present when it was mined
/// or else to the first later `finality` call; after that the reference is
/// unknown.
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
    approvals: Notify,
    read_latency: Option<Duration>,
}

impl MemoryLedger {
    pub fn new(genesis: &VaultGenesis) -> Self {
        Self::from_state(create_genesis_state(genesis))
    }

    pub fn from_state(state: VaultState) -> Self {
        Self {
            inner: Mutex::new(LedgerInner { state, ..Default::default() }),
            approvals: Notify::new(),
            read_latency: None,
        }
    }

    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // Execution only mutates on success, so a poisoned vault is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> VaultState {
        self.lock().state.clone()
    }

    pub fn height(&self) -> u64 {
        self.lock().height
    }

    /// Applies a change directly, as if another party's transaction landed.
    pub fn mutate<F: FnOnce(&mut VaultState)>(&self, f: F) {
        f(&mut self.lock().state);
    }

    pub fn pending_count(&self) -> usize {
        self.lock().mempool.len()
    }

    pub fn read_count(&self, key: &FactKey) -> usize {
        self.lock().reads.get(key).copied().unwrap_or(0)
    }

    /// References whose outcome has not been handed out yet.
    pub fn tracked_references(&self) -> usize {
        self.lock().finality.len()
    }

    pub fn submission_count(&self) -> usize {
        self.lock().submissions
    }

    /// The wallet declines the next submission with `reason`.
    pub fn decline_next(&self, reason: &str) {
        self.lock().decline_next = Some(reason.to_string());
    }

    /// Every read fails with `reason` until cleared with `None`.
    pub fn fail_reads(&self, reason: Option<&str>) {
        self.lock().fail_reads = reason.map(str::to_string);
    }

    /// Submissions wait for [`MemoryLedger::approve`] before acceptance.
    pub fn hold_approvals(&self, hold: bool) {
        self.lock().hold_approvals = hold;
    }

    pub fn approve(&self) {
        self.approvals.notify_one();
    }

    /// Executes every queued submission in order and resolves its finality.
    pub fn mine(&self) -> BlockSummary {
        let mut inner = self.lock();
        inner.height += 1;
        let height = inner.height;
        let queued: Vec<_> = inner.mempool.drain(..).collect();

        let mut reverted = 0;
        for (submission, reference) in &queued {
            let outcome = {
                let mut ctx = ExecutionContext { state: &mut inner.state };
                match execute_operation(&submission.operation, &submission.caller, &mut ctx) {
                    Ok(()) => FinalityOutcome::Success,
                    Err(e) => {
                        reverted += 1;
                        warn!("Block {}: {} reverted: {}", height, reference, e);
                        FinalityOutcome::Reverted { reason: Some(e.to_string()) }
                    }
                }
            };
            let mut delivered = 0;
            if let Some(FinalitySlot::Pending(waiters)) = inner.finality.remove(reference) {
                for waiter in waiters {
                    if waiter.send(outcome.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
            // Kept only until someone asks for it.
            if delivered == 0 {
                inner.finality.insert(*reference, FinalitySlot::Final(outcome));
            }
        }

        if !queued.is_empty() {
            info!("Block {}: executed {} submissions ({} reverted)", height, queued.len(), reverted);
        }
        BlockSummary { height, executed: queued.len(), reverted }
    }

    /// Mines on a fixed interval, skipping empty blocks.
    pub async fn run_block_producer(self: Arc<Self>, interval: Duration) {
        info!("Starting block producer ({:?} interval)", interval);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.pending_count() == 0 {
                continue;
            }
            self.mine();
        }
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn get_fact(&self, key: &FactKey) -> Result<FactValue, LedgerError> {
        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.lock();
        *inner.reads.entry(*key).or_insert(0) += 1;
        if let Some(reason) = &inner.fail_reads {
            return Err(LedgerError::Unavailable(reason.clone()));
        }
        Ok(inner.state.read_fact(key))
    }
}

#[async_trait]
impl LedgerWriter for MemoryLedger {
    async fn submit_operation(
        &self,
        caller: Identity,
        operation: &VaultOperation,
    ) -> Result<TxReference, SubmitError> {
        let hold = {
            let mut inner = self.lock();
            inner.submissions += 1;
            if let Some(reason) = inner.decline_next.take() {
                return Err(SubmitError::RejectedByCaller(reason));
            }
            inner.hold_approvals
        };
        if hold {
            self.approvals.notified().await;
        }

        let mut inner = self.lock();

        // Pre-flight against a copy so doomed requests never enter the queue.
        let mut scratch = inner.state.clone();
        let mut ctx = ExecutionContext { state: &mut scratch };
        if let Err(e) = execute_operation(operation, &caller, &mut ctx) {
            return Err(SubmitError::RejectedByLedger(e.to_string()));
        }

        let nonce = inner.nonces.entry(caller).or_insert(0);
        let submission = Submission { caller, nonce: *nonce, operation: operation.clone() };
        *nonce += 1;
        let reference = submission.reference();
        debug!("Accepted {} from {} as {}", operation.kind(), caller.short(), reference);
        inner.finality.insert(reference, FinalitySlot::Pending(Vec::new()));
        inner.mempool.push((submission, reference));
        Ok(reference)
    }

    async fn finality(&self, reference: TxReference) -> Result<FinalityOutcome, LedgerError> {
        let waiter = {
            let mut inner = self.lock();
            match inner.finality.remove(&reference) {
                Some(FinalitySlot::Final(outcome)) => return Ok(outcome),
                Some(FinalitySlot::Pending(mut waiters)) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    inner.finality.insert(reference, FinalitySlot::Pending(waiters));
                    rx
                }
                None => return Err(LedgerError::UnknownReference(reference)),
            }
        };
        waiter
            .await
            .map_err(|_| LedgerError::Unavailable("finality notifier dropped".to_string()))
    }
}
