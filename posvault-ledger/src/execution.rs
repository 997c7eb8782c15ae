use anyhow::{bail, Result};
use posvault_types::{Amount, Identity, VaultOperation};

use crate::state::VaultState;

pub struct ExecutionContext<'a> {
    pub state: &'a mut VaultState,
}

/// Applies one operation with the vault contract's rules. On error the state
/// is left untouched.
pub fn execute_operation(op: &VaultOperation, caller: &Identity, ctx: &mut ExecutionContext) -> Result<()> {
    if op.kind().owner_only() && *caller != ctx.state.owner {
        bail!("Ownable: caller is not the owner");
    }

    match op {
        VaultOperation::AddMerchant { merchant } => {
            if merchant.is_zero() { bail!("invalid merchant address"); }
            if !ctx.state.merchants.insert(*merchant) { bail!("already a merchant"); }
            Ok(())
        },
        VaultOperation::RemoveMerchant { merchant } => {
            if !ctx.state.merchants.remove(merchant) { bail!("not a merchant"); }
            Ok(())
        },
        VaultOperation::Pause => {
            if ctx.state.paused { bail!("Pausable: paused"); }
            ctx.state.paused = true;
            Ok(())
        },
        VaultOperation::Unpause => {
            if !ctx.state.paused { bail!("Pausable: not paused"); }
            ctx.state.paused = false;
            Ok(())
        },
        VaultOperation::EmergencyWithdraw { to, amount } => {
            if to.is_zero() { bail!("invalid recipient"); }
            if amount.is_zero() { bail!("amount must be positive"); }
            debit(ctx.state, *amount)?;
            credit(ctx.state, *to, *amount);
            Ok(())
        },
        VaultOperation::TransferOwnership { new_owner } => {
            if new_owner.is_zero() { bail!("Ownable: new owner is the zero address"); }
            ctx.state.owner = *new_owner;
            Ok(())
        },
        VaultOperation::RenounceOwnership => {
            ctx.state.owner = Identity::ZERO;
            Ok(())
        },
        VaultOperation::Withdraw { amount } => {
            if ctx.state.paused { bail!("Pausable: paused"); }
            if !ctx.state.is_merchant(caller) { bail!("caller is not a merchant"); }
            if amount.is_zero() { bail!("amount must be positive"); }
            debit(ctx.state, *amount)?;
            let fee = amount.mul_bps(ctx.state.fee_bps);
            let net = amount.saturating_sub(fee);
            let treasury = ctx.state.treasury;
            credit(ctx.state, treasury, fee);
            credit(ctx.state, *caller, net);
            Ok(())
        },
    }
}

fn debit(state: &mut VaultState, amount: Amount) -> Result<()> {
    match state.balance.checked_sub(amount) {
        Some(rest) => {
            state.balance = rest;
            Ok(())
        }
        None => bail!("insufficient vault balance: have {}, need {}", state.balance, amount),
    }
}

fn credit(state: &mut VaultState, to: Identity, amount: Amount) {
    let slot = state.payouts.entry(to).or_default();
    *slot = slot.checked_add(amount).unwrap_or(Amount::from_wei(u128::MAX));
}
