//! Push message types and parser.
//!
//! The backend sends `{"action": "<NAME>", "data": "<json>"}` where `data`
//! is itself a JSON-encoded string. [`parse_message`] validates both layers
//! and yields a typed [`PushEvent`].

use serde::Deserialize;

use crate::error::MessageError;
use crate::model::{Job, Slave};

pub const JOB_UPDATE: &str = "JOB_UPDATE";
pub const SLAVE_UPDATE: &str = "SLAVE_UPDATE";

/// A decoded push event.
#[derive(Debug, Clone)]
pub enum PushEvent {
    JobUpdate(Job),
    SlaveUpdate(Slave),
}

impl PushEvent {
    /// Wire action name.
    pub fn action(&self) -> &'static str {
        match self {
            Self::JobUpdate(_) => JOB_UPDATE,
            Self::SlaveUpdate(_) => SLAVE_UPDATE,
        }
    }

    /// Encode back into the wire envelope.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            Self::JobUpdate(job) => serde_json::to_string(job)?,
            Self::SlaveUpdate(slave) => serde_json::to_string(slave)?,
        };
        serde_json::to_string(&serde_json::json!({
            "action": self.action(),
            "data": data,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    action: Option<String>,
    data: Option<String>,
}

/// Parse a push text frame.
pub fn parse_message(text: &str) -> Result<PushEvent, MessageError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let action = envelope.action.ok_or(MessageError::MissingField("action"))?;
    let data = envelope.data.ok_or(MessageError::MissingField("data"))?;

    match action.as_str() {
        JOB_UPDATE => Ok(PushEvent::JobUpdate(decode_payload(&action, &data)?)),
        SLAVE_UPDATE => Ok(PushEvent::SlaveUpdate(decode_payload(&action, &data)?)),
        _ => Err(MessageError::UnknownAction(action.clone())),
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    action: &str,
    data: &str,
) -> Result<T, MessageError> {
    serde_json::from_str(data).map_err(|e| MessageError::Payload {
        action: action.to_string(),
        reason: e.to_string(),
    })
}
