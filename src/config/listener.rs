use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Listener fan-out configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Capacity of the shared channel listeners use to request a resync round
    ///
    /// Requests beyond this wait inside their listener until the coordinator
    /// drains the channel, so none is lost.
    ///
    /// Default: 16
    #[serde(default = "default_resync_request_buffer_size")]
    pub resync_request_buffer_size: usize,
}

fn default_resync_request_buffer_size() -> usize {
    16
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            resync_request_buffer_size: default_resync_request_buffer_size(),
        }
    }
}

impl ListenerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.resync_request_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "listener resync_request_buffer_size must be at least 1".to_string(),
            )));
        }
        Ok(())
    }
}
