use posvault_types::{Amount, AmountError, FactKey, IdentityError, OperationKind};
use thiserror::Error;

use crate::coordinator::ActionId;

/// Input or precondition failures. These never reach the ledger writer and
/// are fixed by editing the input and retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    MalformedIdentity(#[from] IdentityError),
    #[error(transparent)]
    MalformedAmount(#[from] AmountError),
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("no wallet connected")]
    NoCaller,
    #[error("{operation} requires the {required} role")]
    Unauthorized { operation: OperationKind, required: &'static str },
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("amount {requested} exceeds vault balance {available}")]
    ExceedsBalance { requested: Amount, available: Amount },
    #[error("contract is paused")]
    Paused,
    #[error("contract is not paused")]
    NotPaused,
    #[error("new owner is already the owner")]
    SelfTransfer,
    #[error("{key} unavailable: {reason}")]
    FactUnavailable { key: FactKey, reason: String },
}

/// Terminal payload of a failed action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("invalid request: {0}")]
    Validation(ValidationError),
    #[error("rejected by caller before submission: {0}")]
    RejectedByCaller(String),
    #[error("rejected by ledger during validation: {0}")]
    RejectedByLedger(String),
    #[error("reverted during execution: {}", .0.as_deref().unwrap_or("execution reverted"))]
    Reverted(Option<String>),
}

/// Refusals returned synchronously by the coordinator's entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("{0} operation already in progress")]
    AlreadyInProgress(OperationKind),
    #[error("no action with id {0}")]
    UnknownAction(ActionId),
    #[error("action {id} can no longer be cancelled ({state})")]
    CancelUnavailable { id: ActionId, state: &'static str },
    #[error("{0} action has not finished")]
    NotTerminal(OperationKind),
}
