//! Session lifecycle configuration

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Externally supplied timing and storage settings.
///
/// All durations are whole seconds except the activity coalescing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Time without user input after which the user counts as idle
    pub idle_timeout_secs: u64,
    /// Polling interval of the activity monitor
    pub check_interval_secs: u64,
    /// Countdown of the expiry prompt
    pub dialog_timeout_secs: u64,
    /// Window in which bursts of input signals collapse into one write
    pub activity_coalesce_ms: u64,
    /// Prefix prepended to every persisted key
    pub storage_prefix: String,
    /// Sign out as soon as the activity poll reports idle, instead of only at expiry
    pub sign_out_when_idle: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 900,
            check_interval_secs: 30,
            dialog_timeout_secs: 60,
            activity_coalesce_ms: 300,
            storage_prefix: "tenure_".to_string(),
            sign_out_when_idle: false,
        }
    }
}

impl SessionConfig {
    /// Parse a TOML document layered over the defaults and validate it
    pub fn from_toml_str(source: &str) -> SessionResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check the invariants the monitor and prompt rely on
    pub fn validate(&self) -> SessionResult<()> {
        if self.idle_timeout_secs == 0 {
            return Err(SessionError::invalid_config(
                "idle_timeout_secs must be greater than zero",
            ));
        }
        if self.check_interval_secs == 0 {
            return Err(SessionError::invalid_config(
                "check_interval_secs must be greater than zero",
            ));
        }
        if self.check_interval_secs >= self.idle_timeout_secs {
            return Err(SessionError::invalid_config(format!(
                "check_interval_secs ({}) must be less than idle_timeout_secs ({})",
                self.check_interval_secs, self.idle_timeout_secs
            )));
        }
        if self.dialog_timeout_secs == 0 {
            return Err(SessionError::invalid_config(
                "dialog_timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub const fn activity_coalesce(&self) -> Duration {
        Duration::from_millis(self.activity_coalesce_ms)
    }
}
