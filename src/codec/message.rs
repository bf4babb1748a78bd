use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::utils::error::DecodeError;

/// A message as produced by a publisher and consumed by either listener.
///
/// The wire form is a JSON object:
///
/// ```json
/// {"id":"a1","timestamp":"2025-01-01T00:00:00Z","message":"hi","sender":"pub","count":1}
/// ```
///
/// `message` maps to [`Message::body`] and `count` to [`Message::sequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub body: String,
    pub sender: String,
    /// Sender-assigned; monotonic per sender, not unique across senders.
    pub sequence: i64,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    id: String,
    timestamp: String,
    message: String,
    sender: String,
    count: i64,
}

/// Decodes a raw payload. Every field must be present with the right type.
pub fn decode(payload: &[u8]) -> Result<Message, DecodeError> {
    let wire: WireMessage = serde_json::from_slice(payload)?;

    Ok(Message {
        timestamp: parse_timestamp(&wire.timestamp),
        id: wire.id,
        body: wire.message,
        sender: wire.sender,
        sequence: wire.count,
    })
}

/// Encodes a message into its JSON wire form.
pub fn encode(message: &Message) -> Vec<u8> {
    let wire = WireMessage {
        id: message.id.clone(),
        timestamp: message.timestamp.to_rfc3339(),
        message: message.body.clone(),
        sender: message.sender.clone(),
        count: message.sequence,
    };

    // A struct of strings and an integer always serializes
    serde_json::to_vec(&wire).unwrap_or_default()
}

/// RFC 3339 first, then a naive ISO-8601 date-time read as local time,
/// otherwise now.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<FixedOffset> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts;
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.fixed_offset())
        .unwrap_or_else(|| Local::now().fixed_offset())
}

impl Message {
    /// The line printed for every consumed message.
    ///
    /// `[2025-01-01 00:00:00] [sender] body (ID: id) [Received #n from source]`
    pub fn display_line(&self, receipt: u64, source: &str) -> String {
        format!(
            "[{}] [{}] {} (ID: {}) [Received #{} from {}]",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.sender,
            self.body,
            self.id,
            receipt,
            source
        )
    }
}
