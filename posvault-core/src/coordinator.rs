//! Lifecycle of mutating vault operations.
//!
//! Each [`OperationKind`] owns one surface holding at most one non-terminal
//! action. An action moves through
//! `Validating -> Submitting -> Mining -> Confirmed`, or to `Failed` from any
//! of the first three. Validation reads only the fact cache; the ledger writer
//! is contacted only for requests that passed it. On confirmation the facts
//! the operation touched are invalidated before the action turns terminal.

use posvault_ledger::{CallerIdentity, FinalityOutcome, LedgerWriter, SubmitError};
use posvault_types::{Amount, FactKey, FactValue, Identity, OperationKind, TxReference, VaultOperation};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{info, warn};

use crate::cache::FactCache;
use crate::error::{CoordinatorError, FailureReason, ValidationError};
use crate::fee::{self, FeeQuote};

pub type ActionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Validating,
    Submitting,
    Mining,
    Confirmed,
    Failed(FailureReason),
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Confirmed | LifecycleState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Validating => "validating",
            LifecycleState::Submitting => "submitting",
            LifecycleState::Mining => "mining",
            LifecycleState::Confirmed => "confirmed",
            LifecycleState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub id: ActionId,
    pub caller: Option<Identity>,
    pub operation: VaultOperation,
    pub state: LifecycleState,
    pub reference: Option<TxReference>,
    /// Fee split computed at validation time; withdrawals only.
    pub quote: Option<FeeQuote>,
}

impl PendingAction {
    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn error(&self) -> Option<&FailureReason> {
        match &self.state {
            LifecycleState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

struct Slot {
    action: PendingAction,
    notifier: watch::Sender<LifecycleState>,
    driver: Option<AbortHandle>,
}

impl Slot {
    fn set_state(&mut self, state: LifecycleState) {
        info!("Action {} ({}): {} -> {}", self.action.id, self.action.kind(), self.action.state.name(), state);
        self.action.state = state.clone();
        self.notifier.send_replace(state);
    }
}

struct CoordinatorInner {
    writer: Arc<dyn LedgerWriter>,
    cache: FactCache,
    caller: Arc<dyn CallerIdentity>,
    surfaces: Mutex<HashMap<OperationKind, Slot>>,
    next_id: AtomicU64,
}

impl CoordinatorInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<OperationKind, Slot>> {
        self.surfaces.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Applies `f` to the live slot of action `id`. Returns false once the
    /// action is terminal or gone, which is how a cancelled driver stops.
    fn update<F: FnOnce(&mut Slot)>(&self, kind: OperationKind, id: ActionId, f: F) -> bool {
        let mut surfaces = self.lock();
        match surfaces.get_mut(&kind) {
            Some(slot) if slot.action.id == id && !slot.action.state.is_terminal() => {
                f(slot);
                true
            }
            _ => false,
        }
    }

    fn transition(&self, kind: OperationKind, id: ActionId, state: LifecycleState) -> bool {
        self.update(kind, id, |slot| slot.set_state(state))
    }

    fn fail(&self, kind: OperationKind, id: ActionId, reason: FailureReason) {
        warn!("Action {} ({}) failed: {}", id, kind, reason);
        self.transition(kind, id, LifecycleState::Failed(reason));
    }

    async fn drive(self: Arc<Self>, kind: OperationKind, id: ActionId, caller: Option<Identity>, operation: VaultOperation) {
        let (caller, quote) = match validate(&self.cache, caller, &operation).await {
            Ok(checked) => checked,
            Err(e) => return self.fail(kind, id, FailureReason::Validation(e)),
        };
        let advanced = self.update(kind, id, |slot| {
            slot.action.quote = quote;
            slot.set_state(LifecycleState::Submitting);
        });
        if !advanced {
            return;
        }

        let reference = match self.writer.submit_operation(caller, &operation).await {
            Ok(reference) => reference,
            Err(SubmitError::RejectedByCaller(reason)) => {
                return self.fail(kind, id, FailureReason::RejectedByCaller(reason))
            }
            Err(SubmitError::RejectedByLedger(reason)) => {
                return self.fail(kind, id, FailureReason::RejectedByLedger(reason))
            }
        };
        let advanced = self.update(kind, id, |slot| {
            slot.action.reference = Some(reference);
            slot.set_state(LifecycleState::Mining);
        });
        if !advanced {
            return;
        }

        match self.writer.finality(reference).await {
            Ok(FinalityOutcome::Success) => {
                self.cache.invalidate(&operation.invalidates());
                self.transition(kind, id, LifecycleState::Confirmed);
            }
            Ok(FinalityOutcome::Reverted { reason }) => {
                self.fail(kind, id, FailureReason::Reverted(reason));
            }
            Err(e) => {
                self.fail(kind, id, FailureReason::Reverted(Some(format!("finality unknown: {}", e))));
            }
        }
    }
}

/// Runs every mutating vault operation through its lifecycle.
#[derive(Clone)]
pub struct ActionCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl ActionCoordinator {
    pub fn new(writer: Arc<dyn LedgerWriter>, cache: FactCache, caller: Arc<dyn CallerIdentity>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                writer,
                cache,
                caller,
                surfaces: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn cache(&self) -> &FactCache {
        &self.inner.cache
    }

    /// Starts `operation` for the connected caller and returns immediately
    /// with the action in `Validating`. Refused while the operation's surface
    /// holds a non-terminal action; a terminal one is replaced.
    pub fn submit(&self, operation: VaultOperation) -> Result<PendingAction, CoordinatorError> {
        let kind = operation.kind();
        let caller = self.inner.caller.current();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let action = PendingAction {
            id,
            caller,
            operation: operation.clone(),
            state: LifecycleState::Validating,
            reference: None,
            quote: None,
        };

        {
            let mut surfaces = self.inner.lock();
            if let Some(current) = surfaces.get(&kind) {
                if !current.action.state.is_terminal() {
                    warn!("Refusing {}: action {} is {}", kind, current.action.id, current.action.state.name());
                    return Err(CoordinatorError::AlreadyInProgress(kind));
                }
            }
            let (notifier, _) = watch::channel(LifecycleState::Validating);
            surfaces.insert(kind, Slot { action: action.clone(), notifier, driver: None });
        }
        info!("Action {} ({}): submitted by {:?}", id, kind, caller);

        let driver = tokio::spawn(Arc::clone(&self.inner).drive(kind, id, caller, operation));
        let abort = driver.abort_handle();
        self.inner.update(kind, id, |slot| slot.driver = Some(abort));
        Ok(action)
    }

    pub fn action(&self, id: ActionId) -> Option<PendingAction> {
        self.inner.lock().values().find(|s| s.action.id == id).map(|s| s.action.clone())
    }

    pub fn state(&self, id: ActionId) -> Option<LifecycleState> {
        self.action(id).map(|a| a.state)
    }

    /// The action currently held by `kind`'s surface.
    pub fn surface(&self, kind: OperationKind) -> Option<PendingAction> {
        self.inner.lock().get(&kind).map(|s| s.action.clone())
    }

    pub fn surface_state(&self, kind: OperationKind) -> LifecycleState {
        self.surface(kind).map(|a| a.state).unwrap_or(LifecycleState::Idle)
    }

    pub fn actions(&self) -> Vec<PendingAction> {
        let mut all: Vec<_> = self.inner.lock().values().map(|s| s.action.clone()).collect();
        all.sort_by_key(|a| a.id);
        all
    }

    pub fn watch(&self, id: ActionId) -> Option<watch::Receiver<LifecycleState>> {
        self.inner.lock().values().find(|s| s.action.id == id).map(|s| s.notifier.subscribe())
    }

    /// Resolves with the terminal state of `id`.
    pub async fn wait(&self, id: ActionId) -> Option<LifecycleState> {
        let mut rx = self.watch(id)?;
        let state = rx.wait_for(LifecycleState::is_terminal).await.ok()?;
        Some(state.clone())
    }

    /// Abandons an action that the ledger has not accepted yet.
    pub fn cancel(&self, id: ActionId) -> Result<(), CoordinatorError> {
        let mut surfaces = self.inner.lock();
        let slot = surfaces
            .values_mut()
            .find(|s| s.action.id == id)
            .ok_or(CoordinatorError::UnknownAction(id))?;
        match slot.action.state.clone() {
            LifecycleState::Validating | LifecycleState::Submitting => {
                if let Some(driver) = slot.driver.take() {
                    driver.abort();
                }
                slot.set_state(LifecycleState::Failed(FailureReason::RejectedByCaller(
                    "cancelled by caller".to_string(),
                )));
                Ok(())
            }
            other => Err(CoordinatorError::CancelUnavailable { id, state: other.name() }),
        }
    }

    /// Clears a finished action from its surface.
    pub fn reset(&self, kind: OperationKind) -> Result<(), CoordinatorError> {
        let mut surfaces = self.inner.lock();
        if let Some(slot) = surfaces.get(&kind) {
            if !slot.action.state.is_terminal() {
                return Err(CoordinatorError::NotTerminal(kind));
            }
        }
        surfaces.remove(&kind);
        Ok(())
    }
}

/// Stale entries are refreshed first, so a fact this coordinator just
/// invalidated is re-read before it is checked.
async fn fact(cache: &FactCache, key: FactKey) -> Result<FactValue, ValidationError> {
    cache
        .value(&key)
        .await
        .map_err(|e| ValidationError::FactUnavailable { key, reason: e.to_string() })
}

async fn owner(cache: &FactCache) -> Result<Identity, ValidationError> {
    fact(cache, FactKey::Owner).await?.as_identity().ok_or_else(|| unexpected(FactKey::Owner))
}

async fn paused(cache: &FactCache) -> Result<bool, ValidationError> {
    fact(cache, FactKey::Paused).await?.as_flag().ok_or_else(|| unexpected(FactKey::Paused))
}

fn unexpected(key: FactKey) -> ValidationError {
    ValidationError::FactUnavailable { key, reason: "unexpected value type".to_string() }
}

fn positive(amount: &Amount) -> Result<(), ValidationError> {
    if amount.is_zero() {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(())
}

/// Re-checks every precondition against cached facts. Returns the caller and,
/// for withdrawals, the fee split.
async fn validate(
    cache: &FactCache,
    caller: Option<Identity>,
    operation: &VaultOperation,
) -> Result<(Identity, Option<FeeQuote>), ValidationError> {
    let caller = caller.ok_or(ValidationError::NoCaller)?;
    let kind = operation.kind();
    let is_owner = owner(cache).await? == caller;

    if kind.owner_only() && !is_owner {
        return Err(ValidationError::Unauthorized { operation: kind, required: "owner" });
    }

    match operation {
        VaultOperation::AddMerchant { .. } | VaultOperation::RemoveMerchant { .. } => {}
        VaultOperation::RenounceOwnership => {}
        VaultOperation::Pause => {
            if paused(cache).await? {
                return Err(ValidationError::Paused);
            }
        }
        VaultOperation::Unpause => {
            if !paused(cache).await? {
                return Err(ValidationError::NotPaused);
            }
        }
        VaultOperation::EmergencyWithdraw { amount, .. } => positive(amount)?,
        VaultOperation::TransferOwnership { new_owner } => {
            if *new_owner == caller {
                return Err(ValidationError::SelfTransfer);
            }
        }
        VaultOperation::Withdraw { amount } => {
            if !is_owner {
                let key = FactKey::MerchantStatus(caller);
                let member = fact(cache, key).await?.as_flag().ok_or_else(|| unexpected(key))?;
                if !member {
                    return Err(ValidationError::Unauthorized { operation: kind, required: "merchant" });
                }
            }
            if paused(cache).await? {
                return Err(ValidationError::Paused);
            }
            positive(amount)?;
            // Bounded by the pooled vault balance, not a per-merchant entitlement.
            let available = fact(cache, FactKey::Balance)
                .await?
                .as_amount()
                .ok_or_else(|| unexpected(FactKey::Balance))?;
            if *amount > available {
                return Err(ValidationError::ExceedsBalance { requested: *amount, available });
            }
            let fee_bps = fact(cache, FactKey::FeeBps)
                .await?
                .as_bps()
                .ok_or_else(|| unexpected(FactKey::FeeBps))?;
            return Ok((caller, Some(fee::quote(*amount, fee_bps))));
        }
    }
    Ok((caller, None))
}
