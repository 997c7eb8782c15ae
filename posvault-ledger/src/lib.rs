//! Interfaces to the vault's system of record, plus an in-memory vault that
//! implements them for the console and for tests.

pub mod execution;
pub mod genesis;
pub mod memory;
pub mod session;
pub mod state;


use async_trait::async_trait;
use posvault_types::{FactKey, FactValue, Identity, TxReference, VaultOperation};
use thiserror::Error;

pub use execution::{execute_operation, ExecutionContext};
pub use genesis::{create_genesis_state, VaultGenesis};
pub use memory::{BlockSummary, MemoryLedger};
pub use session::WalletSession;
pub use state::VaultState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("unknown transaction reference {0}")]
    UnknownReference(TxReference),
}

/// Why a submission never reached the ledger's queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("rejected by caller: {0}")]
    RejectedByCaller(String),
    #[error("rejected by ledger: {0}")]
    RejectedByLedger(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalityOutcome {
    Success,
    Reverted { reason: Option<String> },
}

#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn get_fact(&self, key: &FactKey) -> Result<FactValue, LedgerError>;
}

#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Resolves once the ledger has accepted the request and assigned a
    /// reference, or with the reason it was not accepted.
    async fn submit_operation(
        &self,
        caller: Identity,
        operation: &VaultOperation,
    ) -> Result<TxReference, SubmitError>;

    /// Resolves once `reference` is final. Has no deadline of its own.
    async fn finality(&self, reference: TxReference) -> Result<FinalityOutcome, LedgerError>;
}

/// The currently connected account, if any.
pub trait CallerIdentity: Send + Sync {
    fn current(&self) -> Option<Identity>;
}
