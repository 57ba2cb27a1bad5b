//! Runtime relay settings.
//!
//! Destination URLs, the required station id and the mail relay choice
//! live in the settings table so they can be changed without restarting
//! the relay. Each request loads a point-in-time [`RelaySettings`]
//! snapshot; the pipeline never reads the store mid-flight, so a
//! concurrent settings change cannot split one request across two
//! configurations.

use crate::config::RelayConfig;
use crate::error::StorageError;
use crate::storage::RecordStore;

/// Setting name for the primary destination URL.
pub const PRIMARY_URL: &str = "primary_url";
/// Setting name for the best-effort destination URL.
pub const BESTEFFORT_URL: &str = "besteffort_url";
/// Setting name for the required station id.
pub const REQUIRED_STATION_ID: &str = "required_station_id";
/// Setting name for the mail relay leg.
pub const MAIL_RELAY: &str = "mail_relay";

/// Which relay leg the mail endpoint sends through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MailRelay {
    /// Mail relaying is disabled.
    #[default]
    None,
    /// Send through the primary destination.
    Primary,
    /// Send through the best-effort destination.
    Besteffort,
}

impl MailRelay {
    /// Parse a stored setting value. Unknown values disable mail relaying.
    pub fn from_name(name: &str) -> Self {
        match name {
            "primary" => Self::Primary,
            "besteffort" => Self::Besteffort,
            _ => Self::None,
        }
    }

    /// The setting value naming this leg.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Primary => "primary",
            Self::Besteffort => "besteffort",
        }
    }
}

/// Point-in-time snapshot of the relay settings.
///
/// Empty stored values read back as `None`, matching an admin clearing
/// a field to turn it off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySettings {
    /// Primary destination URL; its response is returned to the device.
    pub primary_url: Option<String>,
    /// Best-effort destination URL; its response is only recorded.
    pub besteffort_url: Option<String>,
    /// Station id inbound reports must carry; `None` disables the check.
    pub required_station_id: Option<String>,
    /// Relay leg used by the mail endpoint.
    pub mail_relay: MailRelay,
}

impl RelaySettings {
    /// Load a snapshot from the settings store.
    pub async fn load(store: &dyn RecordStore) -> Result<Self, StorageError> {
        Ok(Self {
            primary_url: non_empty(store.get_setting(PRIMARY_URL).await?),
            besteffort_url: non_empty(store.get_setting(BESTEFFORT_URL).await?),
            required_station_id: non_empty(store.get_setting(REQUIRED_STATION_ID).await?),
            mail_relay: MailRelay::from_name(
                store.get_setting(MAIL_RELAY).await?.as_deref().unwrap_or("none"),
            ),
        })
    }

    /// Destination URL selected by the mail relay setting.
    pub fn mail_url(&self) -> Option<&str> {
        match self.mail_relay {
            MailRelay::None => None,
            MailRelay::Primary => self.primary_url.as_deref(),
            MailRelay::Besteffort => self.besteffort_url.as_deref(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Apply config-file seed values to the settings store.
///
/// Only keys present in the config are written; anything set at runtime
/// under other keys survives a restart untouched.
pub async fn seed_settings(
    store: &dyn RecordStore,
    seeds: &RelayConfig,
) -> Result<(), StorageError> {
    let entries = [
        (PRIMARY_URL, seeds.primary_url.as_deref()),
        (BESTEFFORT_URL, seeds.besteffort_url.as_deref()),
        (REQUIRED_STATION_ID, seeds.required_station_id.as_deref()),
        (MAIL_RELAY, seeds.mail_relay.as_deref()),
    ];

    for (name, value) in entries {
        if let Some(value) = value {
            store.set_setting(name, value).await?;
            tracing::info!(name, "seeded relay setting from config");
        }
    }

    Ok(())
}
