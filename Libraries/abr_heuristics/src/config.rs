//! Tunables for the heuristics engine.

use serde::Deserialize;

// All durations are either tic counts (one tic = one playback-stat
// refresh) or whole seconds; buffer thresholds are in 100 ns units.
// Loaded from JSON with every field optional, falling back to defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Interval between playback-stat refreshes, driven by the owner.
    pub tic_interval_ms: u64,
    /// Tics to discard before an observation window opens.
    pub safety_tics: u64,
    /// Longer safety period after a seek or minimize transient.
    pub transient_safety_tics: u64,
    /// Tics a frame-rate observation window spans.
    pub observation_tics: u64,

    /// Dropped-to-source FPS ratio at which two ladder steps go.
    pub max_dropped_ratio: f64,
    pub max_dropped_suspend_levels: u32,
    /// Dropped-to-source FPS ratio at which one ladder step goes.
    pub low_dropped_ratio: f64,
    pub low_dropped_suspend_levels: u32,

    /// Rendered-to-source FPS ratio below which two ladder steps go.
    pub min_rendered_ratio: f64,
    pub min_rendered_suspend_levels: u32,
    /// Rendered-to-source FPS ratio below which one ladder step goes.
    pub low_rendered_ratio: f64,
    pub low_rendered_suspend_levels: u32,

    /// First revocation period; doubles with every repeated suspension.
    pub base_revocation_secs: u64,
    /// Extra delay separating colliding revocation times, halved per use.
    pub revocation_collision_extra_secs: u64,
    /// Suspensions younger than this are fully reverted on restore.
    pub suspension_undo_window_secs: u64,

    pub bandwidth_window_size: usize,
    pub bandwidth_up_fraction: f64,
    pub bandwidth_down_fraction: f64,
    pub encoded_bitrate_window_size: usize,
    pub encoded_bitrate_up_fraction: f64,
    pub encoded_bitrate_down_fraction: f64,
    pub fps_window_size: usize,
    pub fps_up_fraction: f64,
    pub fps_down_fraction: f64,

    /// Fraction of the bandwidth kernel a selected bitrate may use.
    pub bandwidth_safety_fraction: f64,
    /// Buffer depth below which the next chunk is force-requested.
    pub panic_buffer_hns: i64,
    /// Buffer depth under which the owner should keep downloads running.
    pub lower_buffer_hns: i64,
}

impl Default for HeuristicsConfig {
    fn default() -> HeuristicsConfig {
        HeuristicsConfig {
            tic_interval_ms: 1000,
            safety_tics: 4,
            transient_safety_tics: 8,
            observation_tics: 10,
            max_dropped_ratio: 0.25,
            max_dropped_suspend_levels: 2,
            low_dropped_ratio: 0.10,
            low_dropped_suspend_levels: 1,
            min_rendered_ratio: 0.50,
            min_rendered_suspend_levels: 2,
            low_rendered_ratio: 0.75,
            low_rendered_suspend_levels: 1,
            base_revocation_secs: 60,
            revocation_collision_extra_secs: 16,
            suspension_undo_window_secs: 30,
            bandwidth_window_size: 8,
            bandwidth_up_fraction: 1.0,
            bandwidth_down_fraction: 0.5,
            encoded_bitrate_window_size: 4,
            encoded_bitrate_up_fraction: 1.0,
            encoded_bitrate_down_fraction: 0.5,
            fps_window_size: 8,
            fps_up_fraction: 0.85,
            fps_down_fraction: 0.85,
            bandwidth_safety_fraction: 0.85,
            panic_buffer_hns: 10_000_000,
            lower_buffer_hns: 50_000_000,
        }
    }
}

impl HeuristicsConfig {
    // Configuration mistakes are programmer errors, not runtime
    // conditions; they trip here in debug builds and are otherwise
    // tolerated as-is.
    pub fn validate(&self) {
        debug_assert!(self.tic_interval_ms > 0);
        debug_assert!(self.observation_tics > 0);
        debug_assert!(self.bandwidth_window_size > 0);
        debug_assert!(self.encoded_bitrate_window_size > 0);
        debug_assert!(self.fps_window_size > 0);
        debug_assert!(self.base_revocation_secs > 0);
        debug_assert!((0.0..=1.0).contains(&self.bandwidth_safety_fraction));
        debug_assert!((0.0..=1.0).contains(&self.max_dropped_ratio));
        debug_assert!((0.0..=1.0).contains(&self.low_dropped_ratio));
        debug_assert!((0.0..=1.0).contains(&self.min_rendered_ratio));
        debug_assert!((0.0..=1.0).contains(&self.low_rendered_ratio));
        debug_assert!(self.low_dropped_ratio <= self.max_dropped_ratio);
        debug_assert!(self.min_rendered_ratio <= self.low_rendered_ratio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        HeuristicsConfig::default().validate();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: HeuristicsConfig =
            serde_json::from_str(r#"{"observation_tics": 6, "bandwidth_safety_fraction": 0.5}"#)
                .unwrap();
        assert_eq!(config.observation_tics, 6);
        assert!((config.bandwidth_safety_fraction - 0.5).abs() < 1e-9);
        assert_eq!(config.safety_tics, HeuristicsConfig::default().safety_tics);
        config.validate();
    }
}
