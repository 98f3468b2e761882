use std::time::Duration;

use crate::PlayerError;

pub const MAX_POSITION_UPDATE_INTERVAL_MS: u32 = 10_000;

/// Tunables of a player instance.
///
/// Deserializes from partial documents; missing fields take their
/// defaults.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Period of `position-updated` emissions while playing. 0 disables them.
    pub position_update_interval_ms: u32,
    /// Minimum spacing between two seeks sent to the pipeline.
    pub seek_debounce_ms: u64,
    /// How long a stopped pipeline keeps its resources before it is
    /// shut down completely.
    pub ready_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            position_update_interval_ms: 100,
            seek_debounce_ms: 250,
            ready_timeout_ms: 60_000,
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.position_update_interval_ms > MAX_POSITION_UPDATE_INTERVAL_MS {
            return Err(PlayerError::InvalidArgument(format!(
                "position update interval {}ms exceeds {}ms",
                self.position_update_interval_ms, MAX_POSITION_UPDATE_INTERVAL_MS
            )));
        }
        Ok(())
    }

    pub fn seek_debounce(&self) -> Duration {
        Duration::from_millis(self.seek_debounce_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "position_update_interval_ms": 250 }"#).unwrap();
        assert_eq!(config.position_update_interval_ms, 250);
        assert_eq!(config.seek_debounce(), Duration::from_millis(250));
        assert_eq!(config.ready_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_long_intervals() {
        let config = PlayerConfig {
            position_update_interval_ms: 10_001,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PlayerError::InvalidArgument(_))
        ));
    }
}
