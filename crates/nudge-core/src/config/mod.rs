//! Runtime sync configuration.
//!
//! `SyncOptions` decides whether the remote store participates at all and
//! which zone the app's records live in. Callers construct it explicitly;
//! `from_env` exists for tools and tests that configure through the
//! environment.

use serde::{Deserialize, Serialize};

use crate::remote::RecordZone;
use crate::util::normalize_text_option;

const DEFAULT_ZONE: &str = "entries";

const ENV_REMOTE_ENABLED: &str = "NUDGE_REMOTE_ENABLED";
const ENV_ZONE: &str = "NUDGE_ZONE";

/// Sync behavior switches for a running client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Whether remote reads and writes happen at all. When false, every
    /// operation works against the local cache only.
    pub remote_enabled: bool,
    /// Remote zone holding this client's records
    pub zone: RecordZone,
}

impl SyncOptions {
    /// Options for a client syncing against the given remote zone
    #[must_use]
    pub fn remote(zone: RecordZone) -> Self {
        Self {
            remote_enabled: true,
            zone,
        }
    }

    /// Options for a cache-only client that never touches the remote store
    #[must_use]
    pub fn local_only() -> Self {
        Self {
            remote_enabled: false,
            zone: RecordZone::new(DEFAULT_ZONE),
        }
    }

    /// Read options from `NUDGE_REMOTE_ENABLED` and `NUDGE_ZONE`.
    ///
    /// Remote sync is on unless the flag is explicitly `0` or `false`; the
    /// zone falls back to the default when unset or blank.
    #[must_use]
    pub fn from_env() -> Self {
        let remote_enabled = normalize_text_option(std::env::var(ENV_REMOTE_ENABLED).ok())
            .is_none_or(|flag| !matches!(flag.as_str(), "0" | "false"));

        let zone = normalize_text_option(std::env::var(ENV_ZONE).ok())
            .map_or_else(|| RecordZone::new(DEFAULT_ZONE), RecordZone::new);

        Self {
            remote_enabled,
            zone,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::remote(RecordZone::new(DEFAULT_ZONE))
    }
}
