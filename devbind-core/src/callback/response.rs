//! Writing binding results into the callback's input slots.
//!
//! Only the four reserved slots are ever touched; every other element of the
//! payload is sent back exactly as the server sent it.

use serde_json::Value;

use super::{DeviceBindingCallback, NamedValue, ResponseSlots};

/// Values to place into the reserved slots. `None` leaves a slot unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotWrites {
    pub jws: Option<String>,
    pub device_name: Option<String>,
    pub device_id: Option<String>,
    pub client_error: Option<String>,
}

/// Return `inputs` with the requested slots replaced.
pub fn apply_writes(
    inputs: &[NamedValue],
    slots: &ResponseSlots,
    writes: &SlotWrites,
) -> Vec<NamedValue> {
    let updates = [
        (slots.jws.as_str(), writes.jws.as_deref()),
        (slots.device_name.as_str(), writes.device_name.as_deref()),
        (slots.device_id.as_str(), writes.device_id.as_deref()),
        (slots.client_error.as_str(), writes.client_error.as_deref()),
    ];

    let mut updated = inputs.to_vec();
    for (slot, value) in updates {
        let Some(value) = value else { continue };
        // First element carrying the slot name, matching how slots were resolved.
        if let Some(input) = updated.iter_mut().find(|input| input.name == slot) {
            input.value = Some(Value::String(value.to_owned()));
        }
    }
    updated
}

impl DeviceBindingCallback {
    fn write(&mut self, writes: SlotWrites) {
        self.payload.input = apply_writes(&self.payload.input, &self.request.slots, &writes);
    }

    /// Place the signed assertion into the `jws` slot.
    pub fn set_jws(&mut self, jws: impl Into<String>) {
        self.write(SlotWrites {
            jws: Some(jws.into()),
            ..Default::default()
        });
    }

    /// Place the device identifier into the `deviceId` slot.
    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        self.write(SlotWrites {
            device_id: Some(device_id.into()),
            ..Default::default()
        });
    }

    /// Place a human readable device name into the `deviceName` slot.
    pub fn set_device_name(&mut self, device_name: impl Into<String>) {
        self.write(SlotWrites {
            device_name: Some(device_name.into()),
            ..Default::default()
        });
    }

    /// Place a client error code into the `clientError` slot.
    pub fn set_client_error(&mut self, client_error: impl Into<String>) {
        self.write(SlotWrites {
            client_error: Some(client_error.into()),
            ..Default::default()
        });
    }

    /// Current value of an input slot, if it holds a string.
    pub fn input_value(&self, slot: &str) -> Option<&str> {
        self.payload
            .input
            .iter()
            .find(|input| input.name == slot)
            .and_then(|input| input.value.as_ref())
            .and_then(Value::as_str)
    }
}
