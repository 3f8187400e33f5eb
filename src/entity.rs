//! Persisted records and the row shapes read back from the store.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use sqlx::FromRow;

/// Lifecycle status of a hazard alert as stored in the dedup log.
///
/// `Cancel` is the only terminal value. Providers are inconsistent about the
/// literal they use for it, see [`WarningStatus::from_provider`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, Default, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WarningStatus {
    #[default]
    Active,
    Update,
    Cancel,
}

impl WarningStatus {
    /// Maps a provider status literal onto the stored vocabulary.
    ///
    /// `cancel`, `cancelled`, `canceled` and `resolved` all collapse into
    /// [`WarningStatus::Cancel`]. Unknown literals yield `None`.
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "update" | "updated" => Some(Self::Update),
            "cancel" | "cancelled" | "canceled" | "resolved" => Some(Self::Cancel),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancel)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Update => "update",
            Self::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for WarningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat identity that owns subscriptions.
#[derive(FromRow, Serialize, Default, Clone, Debug)]
pub struct UserModel {
    #[serde(default)]
    pub id: i64,
    /// Chat address used by the delivery sink.
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// A (user, city) pairing with a daily delivery time.
///
/// Rows are never deleted; unsubscribing clears `active`.
#[derive(FromRow, Serialize, Default, Clone, Debug)]
pub struct SubscriptionModel {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub city: String,
    /// Local delivery time, zero-padded `HH:MM`.
    #[serde(default)]
    pub reminder_time: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub enable_warning: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow, Serialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct TodoModel {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub subscription_id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// One entry of the alert dedup log, keyed by the provider's alert id.
#[derive(FromRow, Serialize, Default, Clone, Debug)]
pub struct WarningLogModel {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub warning_id: String,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub hazard_type: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: WarningStatus,
    #[serde(default)]
    pub notified_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// A subscription joined with the owner's chat address.
#[derive(FromRow, Serialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionWithUserRow {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub city: String,
    pub reminder_time: String,
    pub active: bool,
    pub enable_warning: bool,
}
