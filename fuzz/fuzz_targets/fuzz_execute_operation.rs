#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use posvault_ledger::{create_genesis_state, execute_operation, ExecutionContext, VaultGenesis};
use posvault_types::{Amount, Identity, VaultOperation};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    caller: u8,
    target: u8,
    amount: u128,
    fee_bps: u16,
    paused: bool,
    selector: u8,
}

// A handful of identities so owner and merchant paths are actually hit.
fn identity(n: u8) -> Identity {
    Identity::from_bytes([n % 4; 20])
}

fn total(state: &posvault_ledger::VaultState) -> Option<Amount> {
    state.payouts.values().try_fold(state.balance, |acc, a| acc.checked_add(*a))
}

fuzz_target!(|data: FuzzInput| {
    let genesis = VaultGenesis {
        owner: identity(1),
        treasury: identity(3),
        merchants: vec![identity(2)],
        fee_bps: u32::from(data.fee_bps),
        paused: data.paused,
        ..VaultGenesis::default()
    };
    let mut state = create_genesis_state(&genesis);
    let before = state.clone();
    let value_before = total(&state);

    let amount = Amount::from_wei(data.amount % (Amount::from_ether(20).wei() + 1));
    let op = match data.selector % 8 {
        0 => VaultOperation::AddMerchant { merchant: identity(data.target) },
        1 => VaultOperation::RemoveMerchant { merchant: identity(data.target) },
        2 => VaultOperation::Pause,
        3 => VaultOperation::Unpause,
        4 => VaultOperation::EmergencyWithdraw { to: identity(data.target), amount },
        5 => VaultOperation::TransferOwnership { new_owner: identity(data.target) },
        6 => VaultOperation::RenounceOwnership,
        _ => VaultOperation::Withdraw { amount },
    };

    let caller = identity(data.caller);
    let mut ctx = ExecutionContext { state: &mut state };
    match execute_operation(&op, &caller, &mut ctx) {
        // Value only moves between the vault and recipients.
        Ok(()) => assert_eq!(total(&state), value_before),
        Err(_) => assert_eq!(state, before),
    }
});
