/**
 * Envelope: the unit of delivery.
 *
 * An envelope bundles one or more items (an error event, a feedback report,
 * a session update, ...) so they travel in a single request. Its wire form is
 * newline delimited:
 *
 * ```text
 * {"event_id":"9ec79c33-ec99-42ab-8353-589fcb2e04dc","sdk":{...}}
 * {"type":"event","length":41}
 * {"message":"hello","level":"error",...}
 * ```
 *
 * One header line for the envelope, then for every item a header line
 * (type + payload length in bytes) followed by the raw payload.
 */
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::{DataCategory, ItemType};
use super::constants::{SDK_NAME, SDK_VERSION};

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Name and version of the SDK that produced an envelope or event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkInfo {
    pub name: String,
    pub version: String,
}

impl Default for SdkInfo {
    fn default() -> Self {
        Self { name: SDK_NAME.to_string(), version: SDK_VERSION.to_string() }
    }
}

/// Envelope-level headers. All fields are optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeHeaders {
    /// Id of the event carried in this envelope, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,

    /// Time the envelope was handed to the transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    /// DSN the envelope is addressed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk: Option<SdkInfo>,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One typed payload inside an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeItem {
    pub item_type: ItemType,
    pub payload: Bytes,
}

#[derive(Serialize)]
struct ItemHeader {
    #[serde(rename = "type")]
    item_type: ItemType,
    length: usize,
}

impl EnvelopeItem {
    /// Creates an item from raw payload bytes.
    pub fn new(item_type: ItemType, payload: impl Into<Bytes>) -> Self {
        Self { item_type, payload: payload.into() }
    }

    /// Creates an item whose payload is `value` serialized as JSON.
    pub fn json<T: Serialize>(item_type: ItemType, value: &T) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(item_type, payload))
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// An ordered list of items plus envelope headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub headers: EnvelopeHeaders,
    pub items: Vec<EnvelopeItem>,
}

impl Envelope {
    /// Creates an empty envelope tagged with this SDK's identity.
    pub fn new() -> Self {
        Self {
            headers: EnvelopeHeaders { sdk: Some(SdkInfo::default()), ..Default::default() },
            items: Vec::new(),
        }
    }

    /// Sets the `event_id` header.
    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.headers.event_id = Some(event_id);
        self
    }

    /// Appends an item.
    pub fn add_item(&mut self, item: EnvelopeItem) {
        self.items.push(item);
    }

    /// Builder-style variant of `add_item`.
    pub fn with_item(mut self, item: EnvelopeItem) -> Self {
        self.items.push(item);
        self
    }

    /// Category used for rate limiting and accounting.
    ///
    /// The first item decides; an envelope without items counts as `default`.
    pub fn category(&self) -> DataCategory {
        self.items
            .first()
            .map(|item| item.item_type.category())
            .unwrap_or(DataCategory::Default)
    }

    /// Serializes the envelope into its newline-delimited wire form.
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        let mut out = BytesMut::new().writer();

        serde_json::to_writer(&mut out, &self.headers)?;
        out.get_mut().put_u8(b'\n');

        for item in &self.items {
            let header = ItemHeader { item_type: item.item_type, length: item.payload.len() };
            serde_json::to_writer(&mut out, &header)?;

            let buf = out.get_mut();
            buf.put_u8(b'\n');
            buf.put_slice(&item.payload);
            buf.put_u8(b'\n');
        }

        Ok(out.into_inner().freeze())
    }
}
