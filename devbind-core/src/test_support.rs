//! Shared fixtures for unit tests.

use serde_json::{json, Value};

pub const USER_ID: &str = "id=demo,ou=user,dc=openam,dc=forgerock,dc=org";
pub const CHALLENGE: &str = "uYksDJx878kl7B4u+wItpGXPozr8bzDTaJwHPJ06SIw=";

/// A device binding callback as the server sends it.
pub fn callback_value(authentication_type: &str, timeout: Option<u64>) -> Value {
    let mut output = vec![
        json!({"name": "userId", "value": USER_ID}),
        json!({"name": "username", "value": "demo"}),
        json!({"name": "authenticationType", "value": authentication_type}),
        json!({"name": "challenge", "value": CHALLENGE}),
        json!({"name": "title", "value": "Authentication required"}),
        json!({"name": "subtitle", "value": "Cryptography device binding"}),
        json!({"name": "description", "value": "Please complete with biometric to proceed"}),
    ];
    if let Some(timeout) = timeout {
        output.push(json!({"name": "timeout", "value": timeout}));
    }

    json!({
        "type": "DeviceBindingCallback",
        "output": output,
        "input": [
            {"name": "IDToken1jws", "value": ""},
            {"name": "IDToken1deviceName", "value": ""},
            {"name": "IDToken1deviceId", "value": ""},
            {"name": "IDToken1clientError", "value": ""}
        ]
    })
}

/// The default callback with its output list edited by `edit`.
pub fn callback_with_outputs(edit: impl FnOnce(&mut Vec<Value>)) -> Value {
    let mut value = callback_value("NONE", Some(20));
    if let Some(outputs) = value["output"].as_array_mut() {
        edit(outputs);
    }
    value
}

/// Value currently held by the input slot `name`.
pub fn input_value<'a>(payload: &'a Value, name: &str) -> &'a Value {
    static NULL: Value = Value::Null;

    payload["input"]
        .as_array()
        .and_then(|inputs| inputs.iter().find(|i| i["name"] == name))
        .map(|i| &i["value"])
        .unwrap_or(&NULL)
}
