/**
 * Item types and data categories.
 *
 * Every envelope item carries a type tag. For rate limiting and buffer
 * accounting the transport only cares about the coarser *data category*,
 * which is derived from the item type through one fixed table
 * (`ItemType::category`). Keep that table the single place where the mapping
 * lives.
 */
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ItemType
// ---------------------------------------------------------------------------

/// Type tag of a single envelope item, serialized in snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Event,
    Transaction,
    Session,
    Sessions,
    Attachment,
    Feedback,
    ClientReport,
    CheckIn,
    UserReport,
}

impl ItemType {
    /// The rate-limit category an item of this type is accounted under.
    pub fn category(self) -> DataCategory {
        match self {
            ItemType::Event => DataCategory::Error,
            ItemType::Transaction => DataCategory::Transaction,
            ItemType::Session | ItemType::Sessions => DataCategory::Session,
            ItemType::Attachment => DataCategory::Attachment,
            ItemType::Feedback => DataCategory::Feedback,
            ItemType::ClientReport => DataCategory::Internal,
            ItemType::CheckIn => DataCategory::Monitor,
            ItemType::UserReport => DataCategory::Default,
        }
    }

    /// The wire name of this item type.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Event => "event",
            ItemType::Transaction => "transaction",
            ItemType::Session => "session",
            ItemType::Sessions => "sessions",
            ItemType::Attachment => "attachment",
            ItemType::Feedback => "feedback",
            ItemType::ClientReport => "client_report",
            ItemType::CheckIn => "check_in",
            ItemType::UserReport => "user_report",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DataCategory
// ---------------------------------------------------------------------------

/// Payload class used as the key for rate limits.
///
/// `All` is the wildcard: a limit recorded for it applies to every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataCategory {
    All,
    Default,
    Error,
    Transaction,
    Session,
    Attachment,
    Feedback,
    Internal,
    Monitor,
}

impl DataCategory {
    /// Parses one category token of a rate-limit directive.
    ///
    /// The empty token is the wildcard. Tokens naming categories this client
    /// never sends yield `None` and are ignored by the caller.
    pub fn from_rate_limit_token(token: &str) -> Option<Self> {
        match token.trim() {
            "" => Some(DataCategory::All),
            "default" => Some(DataCategory::Default),
            "error" => Some(DataCategory::Error),
            "transaction" => Some(DataCategory::Transaction),
            "session" => Some(DataCategory::Session),
            "attachment" => Some(DataCategory::Attachment),
            "feedback" => Some(DataCategory::Feedback),
            "internal" => Some(DataCategory::Internal),
            "monitor" => Some(DataCategory::Monitor),
            _ => None,
        }
    }

    /// The name used in diagnostics and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            DataCategory::All => "all",
            DataCategory::Default => "default",
            DataCategory::Error => "error",
            DataCategory::Transaction => "transaction",
            DataCategory::Session => "session",
            DataCategory::Attachment => "attachment",
            DataCategory::Feedback => "feedback",
            DataCategory::Internal => "internal",
            DataCategory::Monitor => "monitor",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
