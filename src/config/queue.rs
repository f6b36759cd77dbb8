use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Delta queue configuration
///
/// ```toml
/// [queue]
/// input_buffer_size = 128
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Capacity of the queue's input channel
    ///
    /// Submissions (add/update/delete/populate/resync/pop) wait once this many
    /// inputs are queued and not yet processed.
    ///
    /// Range: 1-1048576
    /// Default: 128
    #[serde(default = "default_input_buffer_size")]
    pub input_buffer_size: usize,
}

fn default_input_buffer_size() -> usize {
    128
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            input_buffer_size: default_input_buffer_size(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1_048_576).contains(&self.input_buffer_size) {
            return Err(Error::Config(ConfigError::Message(format!(
                "queue input_buffer_size must be between 1 and 1048576, got {}",
                self.input_buffer_size
            ))));
        }
        Ok(())
    }
}
