use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sync: SyncSettings,
    pub queue: QueueSettings,
    pub roles: RoleSettings,
    pub setup: SetupSettings,
    pub chat: ChatSettings,
}

/// How the publisher treats state changes inside the throttle window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleMode {
    /// First change wins, later changes in the window are dropped
    Leading,
    /// First change publishes immediately, the latest later change publishes when the window closes
    #[default]
    Trailing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub publish_throttle_seconds: f64,
    pub throttle_mode: ThrottleMode,
    pub drift_threshold_seconds: f64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            publish_throttle_seconds: 2.0,
            throttle_mode: ThrottleMode::default(),
            drift_threshold_seconds: 3.0,
        }
    }
}

impl SyncSettings {
    pub fn publish_window(&self) -> Duration {
        seconds(self.publish_throttle_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub ended_advance_delay_seconds: f64,
    pub error_advance_delay_seconds: f64,
    pub default_title: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            ended_advance_delay_seconds: 2.0,
            error_advance_delay_seconds: 3.0,
            default_title: "Unknown Video".to_string(),
        }
    }
}

impl QueueSettings {
    pub fn ended_advance_delay(&self) -> Duration {
        seconds(self.ended_advance_delay_seconds)
    }

    pub fn error_advance_delay(&self) -> Duration {
        seconds(self.error_advance_delay_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSettings {
    pub poll_interval_seconds: f64,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5.0,
        }
    }
}

impl RoleSettings {
    /// Never zero, `tokio::time::interval` panics on a zero period.
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_seconds).max(Duration::from_millis(100))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupSettings {
    pub retry_attempts: u32,
    pub retry_base_delay_seconds: f64,
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_seconds: 1.0,
        }
    }
}

impl SetupSettings {
    pub fn retry_base_delay(&self) -> Duration {
        seconds(self.retry_base_delay_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub max_message_length: usize,
    pub min_interval_seconds: f64,
    pub history_limit: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_message_length: 500,
            min_interval_seconds: 1.0,
            history_limit: 50,
        }
    }
}

impl ChatSettings {
    pub fn min_interval(&self) -> Duration {
        seconds(self.min_interval_seconds)
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}
