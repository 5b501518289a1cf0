use tracing::{debug, info};

use crate::config::SyncSettings;
use crate::models::VideoState;

/// Drift (in seconds) tolerated before a hard seek
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 3.0;

/// Correction to apply to the local player
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// No action needed
    None,
    /// Seek to the published position
    Seek(f64),
    Play,
    Pause,
}

/// Decides how a subscriber corrects its player against published state
#[derive(Debug, Clone)]
pub struct SyncEngine {
    drift_threshold: f64,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
        }
    }

    pub fn update_from_config(&mut self, settings: &SyncSettings) {
        self.set_drift_threshold(settings.drift_threshold_seconds);
    }

    pub fn drift_threshold(&self) -> f64 {
        self.drift_threshold
    }

    fn set_drift_threshold(&mut self, threshold: f64) {
        if threshold.is_finite() && threshold >= 0.0 {
            self.drift_threshold = threshold;
        }
    }

    /// Calculate the corrections needed to match `global`.
    ///
    /// Seek-on-drift and play/pause reconciliation are evaluated independently;
    /// a seek, when present, always comes first.
    pub fn calculate_sync_actions(
        &self,
        local_position: f64,
        local_playing: bool,
        global: &VideoState,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();
        let drift = (local_position - global.position).abs();

        debug!(
            "Sync check: local={:.2}s ({}), global={:.2}s ({}), drift={:.2}s",
            local_position,
            if local_playing { "playing" } else { "paused" },
            global.position,
            if global.is_playing { "playing" } else { "paused" },
            drift
        );

        if drift > self.drift_threshold {
            info!(
                "Drift {:.2}s exceeds {:.2}s - seeking to {:.2}s",
                drift, self.drift_threshold, global.position
            );
            actions.push(SyncAction::Seek(global.position));
        }

        if global.is_playing && !local_playing {
            actions.push(SyncAction::Play);
        } else if !global.is_playing && local_playing {
            actions.push(SyncAction::Pause);
        }

        if actions.is_empty() {
            actions.push(SyncAction::None);
        }

        actions
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}
