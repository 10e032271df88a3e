//! Wire encoding for forwarded records.
//!
//! Every record becomes one `[tag, time, payload]` array, the Fluent
//! forward protocol's message mode. Packets are written back to back with
//! no length prefix; both supported formats are self-delimiting.

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::LogRecord;

/// Default key the payload is nested under.
pub const DEFAULT_WRAP_KEY: &str = "log";

/// How the record's fields are laid out inside the packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadLayout {
    /// Send the record's fields as the payload object.
    Bare,
    /// Nest the record one level under `key`.
    Wrapped { key: String },
}

impl Default for PayloadLayout {
    fn default() -> Self {
        Self::Wrapped {
            key: DEFAULT_WRAP_KEY.into(),
        }
    }
}

/// Serialisation used for packets.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// MessagePack, as spoken natively by Fluent collectors.
    #[default]
    #[serde(alias = "messagepack")]
    Msgpack,
    /// JSON arrays.
    Json,
}

/// Failure to serialise a packet.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("msgpack encoding failed: {0}")]
    Msgpack(#[from] rmp_serde::encode::Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

enum Payload<'a> {
    Bare(&'a Map<String, Value>),
    Wrapped(&'a str, &'a Map<String, Value>),
}

impl Serialize for Payload<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Payload::Bare(fields) => fields.serialize(serializer),
            Payload::Wrapped(key, fields) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(key, fields)?;
                map.end()
            }
        }
    }
}

/// Encode `record` into a single packet tagged with `tag`.
pub fn encode_packet(
    tag: &str,
    record: &LogRecord,
    layout: &PayloadLayout,
    format: WireFormat,
) -> Result<Vec<u8>, EncodeError> {
    let payload = match layout {
        PayloadLayout::Bare => Payload::Bare(record.fields()),
        PayloadLayout::Wrapped { key } => Payload::Wrapped(key, record.fields()),
    };
    let packet = (tag, record.unix_timestamp(), payload);
    match format {
        WireFormat::Msgpack => {
            let mut buf = Vec::with_capacity(128);
            packet.serialize(&mut rmp_serde::Serializer::new(&mut buf))?;
            Ok(buf)
        }
        WireFormat::Json => Ok(serde_json::to_vec(&packet)?),
    }
}
