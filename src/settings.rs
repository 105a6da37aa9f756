//! Engine configuration, with defaults that match the emulated backend.

use std::env;

use serde::Deserialize;

/// Environment variable holding a JSON object of [`StateSettings`] overrides.
pub const SETTINGS_ENV_VAR: &str = "FIRESTORE_EMULATOR_STATE_SETTINGS";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateSettings {
    /// App prefix rendered into backend-shaped error text (`dev~{project}`).
    pub partition_prefix: String,
    /// Cooperative yields a listen target performs before recomputing, so that
    /// writes issued back to back collapse into one notification.
    pub listen_coalesce_yields: usize,
    /// Quiet window, in milliseconds, a listen target waits out when its task runs
    /// in parallel with writers. Every event inside the window restarts it.
    pub listen_quiet_period_ms: u64,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            partition_prefix: "dev".to_string(),
            listen_coalesce_yields: 1,
            listen_quiet_period_ms: 25,
        }
    }
}

impl StateSettings {
    /// Reads overrides from [`SETTINGS_ENV_VAR`], falling back to defaults.
    pub fn from_env() -> Self {
        match env::var(SETTINGS_ENV_VAR) {
            Ok(raw) => Self::from_json_str(&raw),
            Err(_) => Self::default(),
        }
    }

    pub fn from_json_str(raw: &str) -> Self {
        match serde_json::from_str::<StateSettings>(raw) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("ignoring malformed {SETTINGS_ENV_VAR}: {err}");
                Self::default()
            }
        }
    }

    pub fn partition(&self, project_id: &str) -> String {
        format!("{}~{}", self.partition_prefix, project_id)
    }
}
