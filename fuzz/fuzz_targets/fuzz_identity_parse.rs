#![no_main]

use libfuzzer_sys::fuzz_target;

use posvault_types::{is_valid_identity, Identity};

fuzz_target!(|data: &str| {
    let parsed = data.parse::<Identity>();
    assert_eq!(parsed.is_ok(), is_valid_identity(data));

    // Display is canonical lowercase and parses back to the same identity.
    if let Ok(id) = parsed {
        let shown = id.to_string();
        assert!(is_valid_identity(&shown));
        assert_eq!(shown.parse::<Identity>().ok(), Some(id));
    }
});
