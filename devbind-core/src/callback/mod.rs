//! Device binding callback model.
//!
//! The server describes a binding challenge as a loosely structured callback:
//! a `type` tag, a list of named `output` values (what the server tells the
//! device) and a list of named `input` descriptors (slots the device fills in
//! before sending the callback back).
//!
//! ```json
//! {
//!   "type": "DeviceBindingCallback",
//!   "output": [{ "name": "userId", "value": "..." }, ...],
//!   "input":  [{ "name": "IDToken1jws", "value": "" }, ...]
//! }
//! ```
//!
//! Parsing produces a [`DeviceBindingCallback`] holding the validated
//! [`BindingRequest`] and the original payload. Any validation failure aborts
//! the whole parse with [`DevbindError::InvalidCallbackResponse`].

pub mod response;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::{DevbindError, Result, DEVICE_BINDING_CALLBACK, MAX_CALLBACK_SIZE};

/// Reserved token identifying the signed assertion input slot.
pub const JWS_TOKEN: &str = "jws";
/// Reserved token identifying the device name input slot.
pub const DEVICE_NAME_TOKEN: &str = "deviceName";
/// Reserved token identifying the device identifier input slot.
pub const DEVICE_ID_TOKEN: &str = "deviceId";
/// Reserved token identifying the client error input slot.
pub const CLIENT_ERROR_TOKEN: &str = "clientError";

/// Output names carried by a device binding callback.
pub mod outputs {
    pub const USER_ID: &str = "userId";
    pub const USER_NAME: &str = "username";
    pub const AUTHENTICATION_TYPE: &str = "authenticationType";
    pub const CHALLENGE: &str = "challenge";
    pub const TITLE: &str = "title";
    pub const SUBTITLE: &str = "subtitle";
    pub const DESCRIPTION: &str = "description";
    pub const TIMEOUT: &str = "timeout";

    /// Outputs that must be present in every callback.
    pub const REQUIRED: [&str; 7] = [
        USER_ID,
        USER_NAME,
        AUTHENTICATION_TYPE,
        CHALLENGE,
        TITLE,
        SUBTITLE,
        DESCRIPTION,
    ];
}

/// A `name`/`value` pair from the callback's `output` or `input` list.
///
/// Fields other than `name` and `value` are kept so the element serializes
/// back unchanged. An absent `value` stays absent; an explicit `null` is kept
/// as `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }
}

fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Raw callback payload as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub output: Vec<NamedValue>,
    pub input: Vec<NamedValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How the bound key is protected when it is used to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationType {
    /// Biometric verification only, no device credential fallback.
    BiometricOnly,
    /// Biometric verification with device credential (PIN, password) fallback.
    BiometricAllowFallback,
    /// No user presence check.
    None,
}

impl AuthenticationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BiometricOnly => "BIOMETRIC_ONLY",
            Self::BiometricAllowFallback => "BIOMETRIC_ALLOW_FALLBACK",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthenticationType {
    type Err = DevbindError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BIOMETRIC_ONLY" => Ok(Self::BiometricOnly),
            "BIOMETRIC_ALLOW_FALLBACK" => Ok(Self::BiometricAllowFallback),
            "NONE" => Ok(Self::None),
            other => Err(DevbindError::invalid_callback(format!(
                "unknown authenticationType `{other}`"
            ))),
        }
    }
}

/// Input slot names the response is written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSlots {
    pub jws: String,
    pub device_name: String,
    pub device_id: String,
    pub client_error: String,
}

impl ResponseSlots {
    /// Resolve the four reserved slots by substring match.
    ///
    /// For each token the first input whose name contains it wins. Two tokens
    /// resolving to the same input name is ambiguous and rejected.
    pub fn discover(inputs: &[NamedValue]) -> Result<Self> {
        let find = |token: &str| {
            inputs
                .iter()
                .map(|input| input.name.as_str())
                .find(|name| name.contains(token))
                .map(str::to_owned)
                .ok_or_else(|| {
                    DevbindError::invalid_callback(format!("no input slot matching `{token}`"))
                })
        };

        let slots = Self {
            jws: find(JWS_TOKEN)?,
            device_name: find(DEVICE_NAME_TOKEN)?,
            device_id: find(DEVICE_ID_TOKEN)?,
            client_error: find(CLIENT_ERROR_TOKEN)?,
        };

        let names = slots.names();
        for (i, name) in names.iter().enumerate() {
            if names[i + 1..].contains(name) {
                return Err(DevbindError::invalid_callback(format!(
                    "ambiguous input slot `{name}` matches more than one reserved token"
                )));
            }
        }

        Ok(slots)
    }

    fn names(&self) -> [&str; 4] {
        [
            &self.jws,
            &self.device_name,
            &self.device_id,
            &self.client_error,
        ]
    }
}

/// Validated binding challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRequest {
    pub user_id: String,
    pub user_name: String,
    pub challenge: String,
    pub authentication_type: AuthenticationType,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    /// Caller supplied bound; the configured default applies when absent.
    pub timeout_secs: Option<u64>,
    pub slots: ResponseSlots,
}

impl BindingRequest {
    fn from_payload(payload: &CallbackPayload) -> Result<Self> {
        let values = &payload.output;

        for name in outputs::REQUIRED {
            if find_output(values, name).is_none() {
                return Err(DevbindError::invalid_callback(format!(
                    "missing output `{name}`"
                )));
            }
        }

        let user_id = required_string(values, outputs::USER_ID)?;
        let user_name = required_string(values, outputs::USER_NAME)?;
        for (name, value) in [(outputs::USER_ID, &user_id), (outputs::USER_NAME, &user_name)] {
            if value.is_empty() {
                return Err(DevbindError::invalid_callback(format!(
                    "output `{name}` must not be empty"
                )));
            }
        }

        let authentication_type =
            required_string(values, outputs::AUTHENTICATION_TYPE)?.parse()?;

        Ok(Self {
            user_id,
            user_name,
            challenge: required_string(values, outputs::CHALLENGE)?,
            authentication_type,
            title: required_string(values, outputs::TITLE)?,
            subtitle: required_string(values, outputs::SUBTITLE)?,
            description: required_string(values, outputs::DESCRIPTION)?,
            timeout_secs: optional_timeout(values)?,
            slots: ResponseSlots::discover(&payload.input)?,
        })
    }
}

fn find_output<'a>(values: &'a [NamedValue], name: &str) -> Option<&'a Value> {
    values
        .iter()
        .find(|output| output.name == name)
        .and_then(|output| output.value.as_ref())
}

fn required_string(values: &[NamedValue], name: &str) -> Result<String> {
    match find_output(values, name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DevbindError::invalid_callback(format!(
            "output `{name}` must be a string"
        ))),
        None => Err(DevbindError::invalid_callback(format!(
            "missing output `{name}`"
        ))),
    }
}

fn optional_timeout(values: &[NamedValue]) -> Result<Option<u64>> {
    match find_output(values, outputs::TIMEOUT) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            DevbindError::invalid_callback(format!(
                "output `{}` must be a non-negative integer",
                outputs::TIMEOUT
            ))
        }),
    }
}

/// A parsed device binding callback: the validated request plus the payload
/// that is sent back to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceBindingCallback {
    payload: CallbackPayload,
    request: BindingRequest,
}

impl DeviceBindingCallback {
    /// Parse a callback from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.len() > MAX_CALLBACK_SIZE {
            return Err(DevbindError::invalid_callback(format!(
                "payload too large: {} bytes (max {MAX_CALLBACK_SIZE})",
                json.len()
            )));
        }

        let value: Value = serde_json::from_str(json)
            .map_err(|e| DevbindError::invalid_callback(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse a callback from an already decoded JSON value.
    #[instrument(level = "debug", skip_all)]
    pub fn from_value(value: Value) -> Result<Self> {
        match value.get("type") {
            Some(Value::String(kind)) if kind == DEVICE_BINDING_CALLBACK => {}
            Some(Value::String(kind)) => {
                return Err(DevbindError::invalid_callback(format!(
                    "unexpected callback type `{kind}`"
                )))
            }
            Some(_) => return Err(DevbindError::invalid_callback("`type` must be a string")),
            None => return Err(DevbindError::invalid_callback("missing `type`")),
        }

        for list in ["output", "input"] {
            match value.get(list) {
                Some(Value::Array(_)) => {}
                Some(_) => {
                    return Err(DevbindError::invalid_callback(format!(
                        "`{list}` must be an array"
                    )))
                }
                None => return Err(DevbindError::invalid_callback(format!("missing `{list}`"))),
            }
        }

        let payload: CallbackPayload = serde_json::from_value(value).map_err(|e| {
            DevbindError::invalid_callback(format!("malformed callback element: {e}"))
        })?;

        let request = BindingRequest::from_payload(&payload)?;
        debug!(
            authentication_type = %request.authentication_type,
            timeout_secs = ?request.timeout_secs,
            "Parsed device binding callback"
        );

        Ok(Self { payload, request })
    }

    /// The validated request. Read-only for the lifetime of the callback.
    pub fn request(&self) -> &BindingRequest {
        &self.request
    }

    /// The payload in its current state, including any written slots.
    pub fn payload(&self) -> &CallbackPayload {
        &self.payload
    }

    pub fn into_payload(self) -> CallbackPayload {
        self.payload
    }

    /// Serialize the payload for sending back to the server.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(&self.payload)
            .map_err(|e| DevbindError::SerializationError(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.payload)
            .map_err(|e| DevbindError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{callback_value, callback_with_outputs};

    fn parse(value: Value) -> Result<DeviceBindingCallback> {
        DeviceBindingCallback::from_value(value)
    }

    fn assert_invalid(result: Result<DeviceBindingCallback>, needle: &str) {
        match result {
            Err(DevbindError::InvalidCallbackResponse(detail)) => assert!(
                detail.contains(needle),
                "expected `{needle}` in `{detail}`"
            ),
            other => panic!("expected InvalidCallbackResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_valid_callback() {
        let callback = parse(callback_value("NONE", Some(20))).expect("valid callback");
        let request = callback.request();

        assert_eq!(request.user_id, "id=demo,ou=user,dc=openam,dc=forgerock,dc=org");
        assert_eq!(request.user_name, "demo");
        assert_eq!(request.authentication_type, AuthenticationType::None);
        assert_eq!(request.challenge, "uYksDJx878kl7B4u+wItpGXPozr8bzDTaJwHPJ06SIw=");
        assert_eq!(request.title, "Authentication required");
        assert_eq!(request.timeout_secs, Some(20));
        assert_eq!(
            request.slots,
            ResponseSlots {
                jws: "IDToken1jws".into(),
                device_name: "IDToken1deviceName".into(),
                device_id: "IDToken1deviceId".into(),
                client_error: "IDToken1clientError".into(),
            }
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let json = callback_value("BIOMETRIC_ONLY", Some(60)).to_string();
        let a = DeviceBindingCallback::from_json(&json).unwrap();
        let b = DeviceBindingCallback::from_json(&json).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_authentication_types() {
        for (wire, expected) in [
            ("BIOMETRIC_ONLY", AuthenticationType::BiometricOnly),
            ("BIOMETRIC_ALLOW_FALLBACK", AuthenticationType::BiometricAllowFallback),
            ("NONE", AuthenticationType::None),
        ] {
            let callback = parse(callback_value(wire, None)).unwrap();
            assert_eq!(callback.request().authentication_type, expected);
            assert_eq!(expected.to_string(), wire);
        }
    }

    #[test]
    fn test_unknown_authentication_type_rejected() {
        assert_invalid(parse(callback_value("FACE_ONLY", None)), "FACE_ONLY");
    }

    #[test]
    fn test_each_missing_required_output_rejected() {
        for missing in outputs::REQUIRED {
            let value = callback_with_outputs(|outputs| {
                outputs.retain(|o| o["name"] != missing);
            });
            assert_invalid(parse(value), missing);
        }
    }

    #[test]
    fn test_wrong_primitive_type_rejected() {
        let value = callback_with_outputs(|outputs| {
            for o in outputs.iter_mut() {
                if o["name"] == "challenge" {
                    o["value"] = json!(42);
                }
            }
        });
        assert_invalid(parse(value), "must be a string");
    }

    #[test]
    fn test_empty_user_id_rejected() {
        let value = callback_with_outputs(|outputs| {
            for o in outputs.iter_mut() {
                if o["name"] == "userId" {
                    o["value"] = json!("");
                }
            }
        });
        assert_invalid(parse(value), "must not be empty");
    }

    #[test]
    fn test_empty_prompt_text_allowed() {
        let value = callback_with_outputs(|outputs| {
            for o in outputs.iter_mut() {
                if o["name"] == "title" || o["name"] == "subtitle" {
                    o["value"] = json!("");
                }
            }
        });
        let callback = parse(value).unwrap();
        assert!(callback.request().title.is_empty());
    }

    #[test]
    fn test_timeout_absent_and_invalid() {
        let callback = parse(callback_value("NONE", None)).unwrap();
        assert_eq!(callback.request().timeout_secs, None);

        let value = callback_with_outputs(|outputs| {
            for o in outputs.iter_mut() {
                if o["name"] == "timeout" {
                    o["value"] = json!("soon");
                }
            }
        });
        assert_invalid(parse(value), "non-negative integer");

        let value = callback_with_outputs(|outputs| {
            for o in outputs.iter_mut() {
                if o["name"] == "timeout" {
                    o["value"] = json!(-5);
                }
            }
        });
        assert_invalid(parse(value), "non-negative integer");
    }

    #[test]
    fn test_type_tag_validation() {
        let mut value = callback_value("NONE", None);
        value.as_object_mut().unwrap().remove("type");
        assert_invalid(parse(value), "missing `type`");

        let mut value = callback_value("NONE", None);
        value["type"] = json!("DeviceSigningVerifierCallback");
        assert_invalid(parse(value), "unexpected callback type");
    }

    #[test]
    fn test_lists_must_be_arrays_of_named_elements() {
        let mut value = callback_value("NONE", None);
        value.as_object_mut().unwrap().remove("input");
        assert_invalid(parse(value), "missing `input`");

        let mut value = callback_value("NONE", None);
        value["output"] = json!({"name": "userId"});
        assert_invalid(parse(value), "`output` must be an array");

        let mut value = callback_value("NONE", None);
        value["input"].as_array_mut().unwrap().push(json!({"value": ""}));
        assert_invalid(parse(value), "malformed callback element");
    }

    #[test]
    fn test_missing_input_slot_rejected() {
        for token in [JWS_TOKEN, DEVICE_NAME_TOKEN, DEVICE_ID_TOKEN, CLIENT_ERROR_TOKEN] {
            let mut value = callback_value("NONE", None);
            value["input"]
                .as_array_mut()
                .unwrap()
                .retain(|i| !i["name"].as_str().unwrap().contains(token));
            assert_invalid(parse(value), token);
        }
    }

    #[test]
    fn test_first_matching_slot_wins() {
        let mut value = callback_value("NONE", None);
        value["input"]
            .as_array_mut()
            .unwrap()
            .push(json!({"name": "IDToken2jws", "value": ""}));
        let callback = parse(value).unwrap();
        assert_eq!(callback.request().slots.jws, "IDToken1jws");
    }

    #[test]
    fn test_ambiguous_slot_rejected() {
        let mut value = callback_value("NONE", None);
        value["input"] = json!([
            {"name": "IDToken1jwsclientError", "value": ""},
            {"name": "IDToken1deviceName", "value": ""},
            {"name": "IDToken1deviceId", "value": ""},
            {"name": "IDToken1clientError", "value": ""}
        ]);
        assert_invalid(parse(value), "ambiguous");
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let mut value = callback_value("NONE", None);
        value["_id"] = json!(3);
        value["input"][0]["validationPolicies"] = json!([]);
        value["input"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "name": "IDToken2" }));
        value["output"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "name": "hint", "value": null }));
        let callback = parse(value.clone()).unwrap();
        assert_eq!(callback.to_value().unwrap(), value);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let json = " ".repeat(MAX_CALLBACK_SIZE + 1);
        assert_invalid(DeviceBindingCallback::from_json(&json), "too large");
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert_invalid(DeviceBindingCallback::from_json("{not json"), "malformed JSON");
    }
}
