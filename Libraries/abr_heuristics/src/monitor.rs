//! Per-stream frame-rate monitoring, suspension and revocation.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::bitrate::{BitrateInfo, FrameRateTestState, TestStep};
use crate::config::HeuristicsConfig;
use crate::sliding_window::SlidingWindow;

// Shifting the revocation period further than this stops doubling; a
// ladder entry that failed 16 times in a row is not coming back soon
// anyway.
const MAX_BACKOFF_SHIFT: u32 = 16;

// Maps the observed dropped-to-source ratio to ladder steps to drop.
// The ratio comes from the window *minimum* (most favorable sample), so
// a single clean reading within the window forgives a burst of drops.
pub fn dropped_suspend_levels(ratio: f64, config: &HeuristicsConfig) -> u32 {
    if ratio >= config.max_dropped_ratio {
        config.max_dropped_suspend_levels
    } else if ratio >= config.low_dropped_ratio {
        config.low_dropped_suspend_levels
    } else {
        0
    }
}

// Maps the smoothed rendered-to-source ratio to ladder steps to drop.
pub fn rendered_suspend_levels(ratio: f64, config: &HeuristicsConfig) -> u32 {
    if ratio <= config.min_rendered_ratio {
        config.min_rendered_suspend_levels
    } else if ratio <= config.low_rendered_ratio {
        config.low_rendered_suspend_levels
    } else {
        0
    }
}

// Owns one stream's bitrate ladder plus the dropped/rendered FPS
// windows feeding the suspend decision.
#[derive(Debug)]
pub struct FrameRateMediaInfo {
    pub stream_index: usize,
    // Ascending nominal bitrate; index 0 is the floor that is never
    // suspended.
    pub bitrates: Vec<BitrateInfo>,
    dropped_fps: SlidingWindow,
    rendered_fps: SlidingWindow,
    source_fps: f64,
    transient_pending: bool,
    next_revocation: Option<Instant>,
}

impl FrameRateMediaInfo {
    pub fn new(stream_index: usize, ladder: &[u64], config: &HeuristicsConfig) -> FrameRateMediaInfo {
        let bitrates = ladder
            .iter()
            .map(|&bitrate| BitrateInfo::new(stream_index, bitrate, config))
            .collect();
        FrameRateMediaInfo {
            stream_index,
            bitrates,
            dropped_fps: SlidingWindow::new(
                config.fps_window_size,
                config.fps_up_fraction,
                config.fps_down_fraction,
            ),
            rendered_fps: SlidingWindow::new(
                config.fps_window_size,
                config.fps_up_fraction,
                config.fps_down_fraction,
            ),
            source_fps: 0.0,
            transient_pending: false,
            next_revocation: None,
        }
    }

    // The next safety period discards more tics than usual.
    pub fn arm_transient(&mut self) {
        self.transient_pending = true;
    }

    pub fn reset_windows(&mut self) {
        self.dropped_fps.reset();
        self.rendered_fps.reset();
    }

    pub fn next_revocation(&self) -> Option<Instant> {
        self.next_revocation
    }

    // One stat tic: record the samples and drive the playing entry's
    // test. `tics` is the owner's cumulative refresh counter.
    pub fn test_frame_rate(
        &mut self,
        now: Instant,
        tics: u64,
        dropped_fps: f64,
        rendered_fps: f64,
        source_fps: f64,
        playing_index: usize,
        config: &HeuristicsConfig,
    ) {
        self.dropped_fps.add(dropped_fps, now);
        self.rendered_fps.add(rendered_fps, now);
        if source_fps > 0.0 {
            self.source_fps = source_fps;
        }
        let Some(entry) = self.bitrates.get_mut(playing_index) else {
            return;
        };
        let before = entry.state;
        let step = entry.advance_test(tics, self.transient_pending, config);
        if before != FrameRateTestState::ObservationPeriod
            && entry.state == FrameRateTestState::ObservationPeriod
        {
            self.transient_pending = false;
        }
        if step == TestStep::EvaluateSuspension {
            let levels = self.bitrates_to_suspend(config);
            if levels > 0 {
                self.suspend_from(playing_index, levels, now, config);
            } else {
                self.bitrates[playing_index].restart_cycle();
            }
        }
    }

    // Suspend-count decision. Both ratios are clamped to [0, 1]; with a
    // zero source rate or an empty window there is no basis for an
    // opinion and nothing is suspended.
    pub fn bitrates_to_suspend(&self, config: &HeuristicsConfig) -> u32 {
        if self.source_fps <= 0.0 || self.rendered_fps.is_empty() {
            return 0;
        }
        let dropped_ratio = (self.dropped_fps.min() / self.source_fps).clamp(0.0, 1.0);
        let rendered_ratio = (self.rendered_fps.kernel() / self.source_fps).clamp(0.0, 1.0);
        let dropped = dropped_suspend_levels(dropped_ratio, config);
        let rendered = rendered_suspend_levels(rendered_ratio, config);
        dropped.max(rendered)
    }

    // Marks `levels` ladder steps, counted down from the playing entry,
    // and everything above them as suspended. Index 0 stays.
    fn suspend_from(
        &mut self,
        playing_index: usize,
        levels: u32,
        now: Instant,
        config: &HeuristicsConfig,
    ) {
        let len = self.bitrates.len();
        let start = playing_index
            .saturating_sub(levels.saturating_sub(1) as usize)
            .max(1);
        if start >= len {
            self.bitrates[playing_index].restart_cycle();
            return;
        }
        let base = Duration::from_secs(config.base_revocation_secs);
        let mut extra = Duration::from_secs(config.revocation_collision_extra_secs.max(1));
        let mut assigned: Vec<Instant> = self
            .bitrates
            .iter()
            .filter_map(|entry| entry.revocation_time)
            .collect();
        for index in start..len {
            let entry = &mut self.bitrates[index];
            if entry.is_suspended() {
                continue;
            }
            let shift = entry.suspension_count.min(MAX_BACKOFF_SHIFT);
            let mut revocation = now + base * (1u32 << shift);
            // identical backoff terms land on the same instant; spread
            // them out so revocations do not fire as one storm
            while assigned.contains(&revocation) {
                revocation += extra;
                extra = Duration::from_secs((extra.as_secs() / 2).max(1));
            }
            assigned.push(revocation);
            entry.suspend(now, revocation);
            info!(
                stream = self.stream_index,
                bitrate = entry.bitrate,
                suspensions = entry.suspension_count,
                "bitrate suspended"
            );
        }
        for entry in &mut self.bitrates {
            if !entry.is_suspended() {
                entry.restart_cycle();
            }
        }
        self.refresh_next_revocation();
    }

    // Due entries come back for retesting; the rest sit out longer when
    // current readings are still poor. Cheap until the earliest
    // revocation is due.
    pub fn check_revocations(&mut self, now: Instant, config: &HeuristicsConfig) {
        let Some(due) = self.next_revocation else {
            return;
        };
        if now < due {
            return;
        }
        let still_poor = self.bitrates_to_suspend(config) > 0;
        let base = Duration::from_secs(config.base_revocation_secs);
        for entry in &mut self.bitrates {
            if !entry.is_suspended() {
                continue;
            }
            let Some(revocation) = entry.revocation_time else {
                continue;
            };
            if now >= revocation {
                info!(
                    stream = self.stream_index,
                    bitrate = entry.bitrate,
                    "suspension revoked, retesting"
                );
                entry.reset_test();
            } else if still_poor {
                let shift = entry.suspension_count.min(MAX_BACKOFF_SHIFT);
                entry.extend_revocation(revocation + base * (1u32 << shift));
                debug!(
                    stream = self.stream_index,
                    bitrate = entry.bitrate,
                    "revocation extended"
                );
            }
        }
        self.refresh_next_revocation();
    }

    // Minimizing the window produces spurious zero-render readings;
    // undo what they caused. Young suspensions are fully reverted, old
    // ones roll back one revocation step.
    pub fn undo_recent_suspensions(&mut self, now: Instant, config: &HeuristicsConfig) {
        let undo_window = Duration::from_secs(config.suspension_undo_window_secs);
        for entry in &mut self.bitrates {
            if !entry.is_suspended() {
                continue;
            }
            let Some(suspended_at) = entry.suspended_at else {
                continue;
            };
            if now.saturating_duration_since(suspended_at) <= undo_window {
                entry.suspension_count = entry.suspension_count.saturating_sub(1);
                entry.reset_test();
                info!(
                    stream = self.stream_index,
                    bitrate = entry.bitrate,
                    "recent suspension reverted"
                );
            } else if let Some(previous) = entry.previous_revocation_time.take() {
                entry.revocation_time = Some(previous);
                debug!(
                    stream = self.stream_index,
                    bitrate = entry.bitrate,
                    "revocation rolled back one step"
                );
            }
        }
        self.refresh_next_revocation();
        self.reset_windows();
    }

    fn refresh_next_revocation(&mut self) {
        self.next_revocation = self
            .bitrates
            .iter()
            .filter(|entry| entry.is_suspended())
            .filter_map(|entry| entry.revocation_time)
            .min();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ladder3(config: &HeuristicsConfig) -> FrameRateMediaInfo {
        FrameRateMediaInfo::new(0, &[500_000, 1_000_000, 2_000_000], config)
    }

    #[rstest]
    // dropped-FPS tiers
    #[case(9.0, 30.0, 30.0, 2)] // 30% dropped
    #[case(3.6, 30.0, 30.0, 1)] // 12% dropped
    #[case(1.5, 30.0, 30.0, 0)] // 5% dropped
    // rendered-FPS tiers
    #[case(0.0, 12.0, 30.0, 2)] // rendering at 40%
    #[case(0.0, 21.0, 30.0, 1)] // rendering at 70%
    #[case(0.0, 27.0, 30.0, 0)] // rendering at 90%
    // the worse of the two rules wins
    #[case(3.6, 12.0, 30.0, 2)]
    // no source rate, no opinion
    #[case(9.0, 0.0, 0.0, 0)]
    fn suspend_levels_follow_the_threshold_tiers(
        #[case] dropped: f64,
        #[case] rendered: f64,
        #[case] source: f64,
        #[case] expected: u32,
    ) {
        let config = HeuristicsConfig::default();
        let start = Instant::now();
        let mut monitor = FrameRateMediaInfo::new(0, &[1_000_000, 2_000_000], &config);
        for t in 1..=4 {
            monitor.test_frame_rate(
                start + Duration::from_secs(t),
                t,
                dropped,
                rendered,
                source,
                1,
                &config,
            );
        }
        assert_eq!(monitor.bitrates_to_suspend(&config), expected);
    }

    #[test]
    fn healthy_playback_never_suspends() {
        let config = HeuristicsConfig::default();
        let start = Instant::now();
        let mut monitor = ladder3(&config);
        for t in 1..=40 {
            monitor.test_frame_rate(
                start + Duration::from_secs(t),
                t,
                0.0,
                30.0,
                30.0,
                2,
                &config,
            );
        }
        for entry in &monitor.bitrates {
            assert!(entry.supported);
            assert!(!entry.is_suspended());
            assert_eq!(entry.suspension_count, 0);
        }
        assert!(monitor.next_revocation().is_none());
    }

    #[test]
    fn degraded_playback_suspends_the_run_above_the_floor_once() {
        let config = HeuristicsConfig::default();
        let start = Instant::now();
        let mut monitor = FrameRateMediaInfo::new(0, &[500_000, 1_000_000, 2_000_000, 3_000_000], &config);
        // heavy drops while the lowest entry plays: evaluation fires at
        // tic 15 (snapshot 1, safety ends at 5, observation ends at 15)
        for t in 1..=15 {
            monitor.test_frame_rate(
                start + Duration::from_secs(t),
                t,
                9.0,
                30.0,
                30.0,
                0,
                &config,
            );
        }
        assert!(!monitor.bitrates[0].is_suspended());
        for entry in &monitor.bitrates[1..] {
            assert!(entry.is_suspended());
            assert!(!entry.supported);
            assert!(entry.tested);
            assert_eq!(entry.suspension_count, 1);
        }
        // collision spreading keeps the revocation times distinct
        let times: Vec<Instant> = monitor.bitrates[1..]
            .iter()
            .map(|entry| entry.revocation_time.unwrap())
            .collect();
        assert_eq!(times[0], start + Duration::from_secs(15 + 60));
        assert!(times[1] > times[0] - Duration::from_secs(1));
        assert_ne!(times[0], times[1]);
        assert_ne!(times[1], times[2]);
        assert_ne!(times[0], times[2]);
        // further bad observation windows find nothing left to suspend
        for t in 16..=60 {
            monitor.test_frame_rate(
                start + Duration::from_secs(t),
                t,
                9.0,
                30.0,
                30.0,
                0,
                &config,
            );
        }
        for entry in &monitor.bitrates[1..] {
            assert_eq!(entry.suspension_count, 1);
        }
        assert!(!monitor.bitrates[0].is_suspended());
    }

    #[test]
    fn repeated_suspensions_double_the_revocation_period() {
        let config = HeuristicsConfig::default();
        let start = Instant::now();
        let mut monitor = ladder3(&config);
        // first failing cycle at the top entry suspends indices 1 and 2
        for t in 1..=15 {
            monitor.test_frame_rate(
                start + Duration::from_secs(t),
                t,
                9.0,
                30.0,
                30.0,
                2,
                &config,
            );
        }
        assert_eq!(
            monitor.bitrates[1].revocation_time,
            Some(start + Duration::from_secs(15 + 60))
        );
        // well past every revocation time everything comes back
        monitor.check_revocations(start + Duration::from_secs(300), &config);
        assert!(monitor.bitrates[1].supported);
        assert_eq!(monitor.bitrates[1].suspension_count, 1);
        // the second failing cycle backs off twice as far
        for t in 16..=30 {
            monitor.test_frame_rate(
                start + Duration::from_secs(300 + t),
                t,
                9.0,
                30.0,
                30.0,
                2,
                &config,
            );
        }
        assert_eq!(
            monitor.bitrates[1].revocation_time,
            Some(start + Duration::from_secs(330 + 120))
        );
        assert_eq!(monitor.bitrates[1].suspension_count, 2);
    }

    #[test]
    fn due_suspensions_are_revoked_and_pending_ones_extended() {
        let config = HeuristicsConfig::default();
        let start = Instant::now();
        let mut monitor = ladder3(&config);
        for t in 1..=15 {
            monitor.test_frame_rate(
                start + Duration::from_secs(t),
                t,
                9.0,
                30.0,
                30.0,
                0,
                &config,
            );
        }
        // index 1 revokes at +75s, index 2 was pushed to +91s by the
        // collision term
        assert_eq!(
            monitor.bitrates[1].revocation_time,
            Some(start + Duration::from_secs(75))
        );
        assert_eq!(
            monitor.bitrates[2].revocation_time,
            Some(start + Duration::from_secs(91))
        );
        // readings are still poor at +80s: index 1 is due and comes
        // back, index 2 sits out another doubled period
        monitor.check_revocations(start + Duration::from_secs(80), &config);
        assert!(monitor.bitrates[1].supported);
        assert_eq!(monitor.bitrates[1].state, FrameRateTestState::Init);
        assert!(monitor.bitrates[2].is_suspended());
        assert_eq!(
            monitor.bitrates[2].revocation_time,
            Some(start + Duration::from_secs(91 + 120))
        );
        assert_eq!(
            monitor.bitrates[2].previous_revocation_time,
            Some(start + Duration::from_secs(91))
        );
    }

    #[test]
    fn minimize_undo_reverts_young_and_rolls_back_old_suspensions() {
        let config = HeuristicsConfig::default();
        let start = Instant::now();
        let mut monitor = ladder3(&config);
        // an old suspension whose revocation was extended once
        monitor.bitrates[2].suspend(start, start + Duration::from_secs(120));
        monitor.bitrates[2].extend_revocation(start + Duration::from_secs(240));
        // a fresh suspension inside the undo window
        monitor.bitrates[1].suspend(
            start + Duration::from_secs(100),
            start + Duration::from_secs(160),
        );

        monitor.undo_recent_suspensions(start + Duration::from_secs(110), &config);

        assert!(monitor.bitrates[1].supported);
        assert_eq!(monitor.bitrates[1].suspension_count, 0);
        assert_eq!(monitor.bitrates[1].state, FrameRateTestState::Init);

        assert!(monitor.bitrates[2].is_suspended());
        assert_eq!(
            monitor.bitrates[2].revocation_time,
            Some(start + Duration::from_secs(120))
        );
        assert_eq!(monitor.bitrates[2].previous_revocation_time, None);
        assert_eq!(
            monitor.next_revocation(),
            Some(start + Duration::from_secs(120))
        );
    }
}
