//! Example demonstrating device binding tracing instrumentation.
//!
//! Run with: cargo run -p devbind-core --example bind_tracing

use std::sync::Arc;
use std::time::Duration;

use devbind_core::{
    verify_assertion, BindingConfig, DeviceBinder, DeviceBindingCallback, FixedGate,
    MachineIdProvider, MemoryKeyStore,
};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("devbind_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Device Binding Tracing Demo ===\n");

    let payload = json!({
        "type": "DeviceBindingCallback",
        "output": [
            {"name": "userId", "value": "id=demo,ou=user,dc=example,dc=com"},
            {"name": "username", "value": "demo"},
            {"name": "authenticationType", "value": "BIOMETRIC_ALLOW_FALLBACK"},
            {"name": "challenge", "value": "uYksDJx878kl7B4u+wItpGXPozr8bzDTaJwHPJ06SIw="},
            {"name": "title", "value": "Authentication required"},
            {"name": "subtitle", "value": "Cryptography device binding"},
            {"name": "description", "value": "Please complete with biometric to proceed"},
            {"name": "timeout", "value": 5}
        ],
        "input": [
            {"name": "IDToken1jws", "value": ""},
            {"name": "IDToken1deviceName", "value": ""},
            {"name": "IDToken1deviceId", "value": ""},
            {"name": "IDToken1clientError", "value": ""}
        ]
    });

    let mut callback = match DeviceBindingCallback::from_value(payload) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to parse callback: {}", e);
            return;
        }
    };

    // Simulate a user who takes a moment to touch the sensor
    let gate = FixedGate::granting().with_delay(Duration::from_millis(300));
    let binder = DeviceBinder::new(
        Arc::new(MemoryKeyStore::new()),
        Arc::new(gate),
        Arc::new(MachineIdProvider::new()),
        BindingConfig::default().with_device_name("Demo device"),
    );

    println!("Binding...\n");

    match binder.bind(&mut callback).await {
        Ok(()) => {
            println!("\n✅ Bound!");
            if let Some(jws) = callback.input_value("IDToken1jws") {
                match verify_assertion(jws) {
                    Ok(verified) => {
                        println!("   kid:        {}", verified.kid());
                        println!("   public key: {} bytes", verified.public_key.len());
                        println!("   expires:    {}", verified.claims.exp);
                    }
                    Err(e) => println!("   verification failed: {}", e),
                }
            }
        }
        Err(status) => {
            println!("\n❌ Failed: {} ({})", status, status.client_error());
        }
    }
}
