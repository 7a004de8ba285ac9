#![no_main]

//! Fuzz target for DeviceBindingCallback::from_json()
//!
//! Malformed payloads must be rejected with an error, never a panic. Accepted
//! payloads must survive serialization and the response slot writers.
//!
//! Run with: cargo +nightly fuzz run fuzz_parse_callback

use devbind_core::DeviceBindingCallback;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(mut callback) = DeviceBindingCallback::from_json(json) {
        callback.set_jws("header.claims.signature");
        callback.set_client_error("Abort");
        let _ = callback.to_json();
    }
});
