//! Turns raw form input into typed operations. Nothing unvalidated gets past
//! here: identities must pass the address check and amounts must parse.

use posvault_types::{Amount, Identity, OperationKind, VaultOperation};

use crate::error::ValidationError;

pub fn parse_identity(input: &str) -> Result<Identity, ValidationError> {
    Ok(input.trim().parse::<Identity>()?)
}

pub fn parse_amount(input: &str) -> Result<Amount, ValidationError> {
    Ok(Amount::parse(input)?)
}

pub fn build_operation(kind: OperationKind, args: &[&str]) -> Result<VaultOperation, ValidationError> {
    let arg = |i: usize, name: &'static str| args.get(i).copied().ok_or(ValidationError::MissingArgument(name));
    let op = match kind {
        OperationKind::AddMerchant => VaultOperation::AddMerchant { merchant: parse_identity(arg(0, "merchant address")?)? },
        OperationKind::RemoveMerchant => VaultOperation::RemoveMerchant { merchant: parse_identity(arg(0, "merchant address")?)? },
        OperationKind::Pause => VaultOperation::Pause,
        OperationKind::Unpause => VaultOperation::Unpause,
        OperationKind::EmergencyWithdraw => VaultOperation::EmergencyWithdraw {
            to: parse_identity(arg(0, "recipient address")?)?,
            amount: parse_amount(arg(1, "amount")?)?,
        },
        OperationKind::TransferOwnership => VaultOperation::TransferOwnership { new_owner: parse_identity(arg(0, "new owner address")?)? },
        OperationKind::RenounceOwnership => VaultOperation::RenounceOwnership,
        OperationKind::Withdraw => VaultOperation::Withdraw { amount: parse_amount(arg(0, "amount")?)? },
    };
    Ok(op)
}
