#![no_main]

use libfuzzer_sys::fuzz_target;

use posvault_core::quote;
use posvault_types::Amount;

fuzz_target!(|data: (u128, u32)| {
    let (wei, bps) = data;
    let gross = Amount::from_wei(wei);
    let q = quote(gross, bps);

    assert!(q.fee_bps <= 10_000);
    assert!(q.fee <= gross);
    assert_eq!(q.fee.checked_add(q.net), Some(gross));
});
