use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Controller configuration
///
/// ```toml
/// [controller]
/// resync_period_ms = 30000  # 0 disables periodic resync
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Period of the controller-driven full resync, in milliseconds
    ///
    /// Only used by plain controllers; shared informers resync on listener request.
    ///
    /// Range: 0 (disabled) or >= 100
    /// Default: 0
    #[serde(default)]
    pub resync_period_ms: u64,
}

impl ControllerConfig {
    /// Resync period, `None` when periodic resync is disabled
    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_period_ms > 0).then(|| Duration::from_millis(self.resync_period_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.resync_period_ms != 0 && self.resync_period_ms < 100 {
            return Err(Error::Config(ConfigError::Message(format!(
                "controller resync_period_ms must be 0 or at least 100, got {}",
                self.resync_period_ms
            ))));
        }
        Ok(())
    }
}
