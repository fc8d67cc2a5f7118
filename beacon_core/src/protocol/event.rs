/**
 * Event payloads produced by the SDK itself.
 *
 * Rich event construction (scopes, breadcrumbs, stack traces) belongs to
 * the instrumentation layer. The SDK only builds two small payloads on its
 * own: plain message events and user feedback reports.
 */
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::ItemType;
use super::envelope::{Envelope, EnvelopeItem, SdkInfo};

/// Platform tag reported in every event payload.
const PLATFORM: &str = "native";

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Minimal error event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: Level,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub platform: String,
    pub sdk: SdkInfo,
}

impl Event {
    /// Creates a message event with a fresh id, stamped now.
    pub fn message(message: impl Into<String>, level: Level) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: Some(message.into()),
            platform: PLATFORM.to_string(),
            sdk: SdkInfo::default(),
        }
    }

    /// Wraps the event in a single-item envelope.
    pub fn into_envelope(self) -> Result<Envelope, serde_json::Error> {
        let item = EnvelopeItem::json(ItemType::Event, &self)?;
        Ok(Envelope::new().with_event_id(self.event_id).with_item(item))
    }
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// User feedback as submitted by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackParams {
    pub message: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    /// Id of the error event this feedback refers to.
    pub associated_event_id: Option<Uuid>,
}

/// `contexts.feedback` object; absent fields are omitted from the payload.
#[derive(Debug, Clone, Serialize)]
struct FeedbackContext<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    associated_event_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
struct FeedbackContexts<'a> {
    feedback: FeedbackContext<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct FeedbackEvent<'a> {
    event_id: Uuid,
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    event_type: &'static str,
    level: Level,
    platform: &'static str,
    sdk: SdkInfo,
    contexts: FeedbackContexts<'a>,
}

/**
 * Builds a feedback envelope from `params`.
 *
 * Returns the id assigned to the feedback event together with the envelope,
 * so callers can surface the id to the user before delivery completes.
 */
pub fn feedback_envelope(params: &FeedbackParams) -> Result<(Uuid, Envelope), serde_json::Error> {
    let event_id = Uuid::new_v4();

    let event = FeedbackEvent {
        event_id,
        timestamp: Utc::now(),
        event_type: "feedback",
        level: Level::Info,
        platform: PLATFORM,
        sdk: SdkInfo::default(),
        contexts: FeedbackContexts {
            feedback: FeedbackContext {
                message: &params.message,
                name: params.name.as_deref(),
                contact_email: params.email.as_deref(),
                url: params.url.as_deref(),
                source: params.source.as_deref(),
                associated_event_id: params.associated_event_id,
            },
        },
    };

    let item = EnvelopeItem::json(ItemType::Feedback, &event)?;
    Ok((event_id, Envelope::new().with_event_id(event_id).with_item(item)))
}
