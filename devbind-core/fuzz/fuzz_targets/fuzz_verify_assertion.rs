#![no_main]

//! Fuzz target for assertion verification
//!
//! Arbitrary tokens must be rejected gracefully.
//!
//! Run with: cargo +nightly fuzz run fuzz_verify_assertion

use devbind_core::verify_assertion;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data) {
        if let Ok(verified) = verify_assertion(token) {
            let _ = verified.check_challenge("challenge");
            let _ = verified.is_expired_at(chrono::Utc::now());
        }
    }
});
