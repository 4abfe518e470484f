use serde::Serialize;
use serde_json::{Map, Value};
use shared::protocol::Envelope;

/// A fully shaped response: HTTP status plus the envelope to write.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Envelope,
}

pub fn send_data_response(status: u16, payload: Value) -> Reply {
    Reply {
        status,
        body: Envelope::data(status, payload),
    }
}

pub fn send_message_response(status: u16, message: impl Into<String>) -> Reply {
    Reply {
        status,
        body: Envelope::message(status, message),
    }
}

/// `{ "<key>": value }`
pub(crate) fn keyed(key: &str, value: &impl Serialize) -> anyhow::Result<Value> {
    let mut payload = Map::new();
    payload.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(Value::Object(payload))
}

pub(crate) fn found(key: &str, value: &impl Serialize) -> anyhow::Result<Reply> {
    Ok(send_data_response(200, keyed(key, value)?))
}
