//! Per-bitrate runtime state and the frame-rate test state machine.

use std::time::Instant;

use crate::config::HeuristicsConfig;
use crate::sliding_window::SlidingWindow;

// The frame-rate test runs on whichever ladder entry is playing:
//
//   Init -> SafetyPeriod -> ObservationPeriod -> Init | Suspended
//
// Init snapshots the cumulative tic counter and falls through to the
// safety period in the same evaluation. The safety period discards the
// first tics after a switch (longer after a seek/minimize transient,
// when readings are bogus); the observation period re-snapshots and,
// once it has run its course, hands the suspend decision back to the
// monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRateTestState {
    Init,
    SafetyPeriod,
    ObservationPeriod,
    Suspended,
}

// What one tic of the test asked the monitor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStep {
    Idle,
    EvaluateSuspension,
}

// Runtime state for one (stream, bitrate) ladder entry. Created when the
// ladder is established and mutated for the stream's lifetime.
#[derive(Debug, Clone)]
pub struct BitrateInfo {
    pub bitrate: u64,
    pub stream_index: usize,
    pub state: FrameRateTestState,
    // Went through at least one full observation window.
    pub tested: bool,
    // Cleared while suspended; selection skips unsupported entries.
    pub supported: bool,
    // Inside the configured bitrate range.
    pub usable: bool,
    // Measured bits/sec of downloaded chunks at this bitrate.
    pub encoded_bitrate: SlidingWindow,
    pub suspension_count: u32,
    pub suspended_at: Option<Instant>,
    pub revocation_time: Option<Instant>,
    pub previous_revocation_time: Option<Instant>,
    tic_snapshot: u64,
}

impl BitrateInfo {
    pub fn new(stream_index: usize, bitrate: u64, config: &HeuristicsConfig) -> BitrateInfo {
        BitrateInfo {
            bitrate,
            stream_index,
            state: FrameRateTestState::Init,
            tested: false,
            supported: true,
            usable: true,
            encoded_bitrate: SlidingWindow::new(
                config.encoded_bitrate_window_size,
                config.encoded_bitrate_up_fraction,
                config.encoded_bitrate_down_fraction,
            ),
            suspension_count: 0,
            suspended_at: None,
            revocation_time: None,
            previous_revocation_time: None,
            tic_snapshot: 0,
        }
    }

    // Rate used for selection: measured when samples exist, nominal
    // otherwise.
    pub fn effective_bitrate(&self) -> f64 {
        if self.encoded_bitrate.is_empty() {
            self.bitrate as f64
        } else {
            self.encoded_bitrate.kernel()
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.state == FrameRateTestState::Suspended
    }

    // Advances the test by one tic. Pure with respect to the rest of the
    // ladder: the monitor applies suspension side effects when
    // `EvaluateSuspension` comes back.
    pub fn advance_test(
        &mut self,
        tics: u64,
        transient: bool,
        config: &HeuristicsConfig,
    ) -> TestStep {
        match self.state {
            FrameRateTestState::Init => {
                self.tic_snapshot = tics;
                self.state = FrameRateTestState::SafetyPeriod;
                // same-evaluation fall-through: a zero-length safety
                // period must not cost a tic
                self.step_safety(tics, transient, config)
            }
            FrameRateTestState::SafetyPeriod => self.step_safety(tics, transient, config),
            FrameRateTestState::ObservationPeriod => {
                if tics.saturating_sub(self.tic_snapshot) >= config.observation_tics {
                    TestStep::EvaluateSuspension
                } else {
                    TestStep::Idle
                }
            }
            FrameRateTestState::Suspended => TestStep::Idle,
        }
    }

    fn step_safety(&mut self, tics: u64, transient: bool, config: &HeuristicsConfig) -> TestStep {
        let required = if transient {
            config.transient_safety_tics
        } else {
            config.safety_tics
        };
        if tics.saturating_sub(self.tic_snapshot) >= required {
            self.state = FrameRateTestState::ObservationPeriod;
            self.tic_snapshot = tics;
        }
        TestStep::Idle
    }

    pub fn suspend(&mut self, now: Instant, revocation_time: Instant) {
        self.state = FrameRateTestState::Suspended;
        self.supported = false;
        self.tested = true;
        self.suspension_count += 1;
        self.suspended_at = Some(now);
        self.revocation_time = Some(revocation_time);
        self.previous_revocation_time = None;
    }

    pub fn extend_revocation(&mut self, until: Instant) {
        self.previous_revocation_time = self.revocation_time;
        self.revocation_time = Some(until);
    }

    // Back to the top of the test cycle, eligible for retesting. The
    // suspension count survives so repeat offenders back off further.
    pub fn reset_test(&mut self) {
        self.state = FrameRateTestState::Init;
        self.tested = false;
        self.supported = true;
        self.suspended_at = None;
        self.revocation_time = None;
        self.previous_revocation_time = None;
    }

    // Cycle restart without touching flags, for the "nothing to
    // suspend" outcome of an observation window.
    pub fn restart_cycle(&mut self) {
        self.state = FrameRateTestState::Init;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_falls_through_to_the_safety_period() {
        let config = HeuristicsConfig::default();
        let mut entry = BitrateInfo::new(0, 1_000_000, &config);
        assert_eq!(entry.advance_test(7, false, &config), TestStep::Idle);
        assert_eq!(entry.state, FrameRateTestState::SafetyPeriod);
        // snapshot was taken at tic 7, so the safety period ends at 11
        assert_eq!(entry.advance_test(10, false, &config), TestStep::Idle);
        assert_eq!(entry.state, FrameRateTestState::SafetyPeriod);
        assert_eq!(entry.advance_test(11, false, &config), TestStep::Idle);
        assert_eq!(entry.state, FrameRateTestState::ObservationPeriod);
    }

    #[test]
    fn observation_period_requests_the_evaluation() {
        let config = HeuristicsConfig::default();
        let mut entry = BitrateInfo::new(0, 1_000_000, &config);
        entry.advance_test(1, false, &config);
        entry.advance_test(5, false, &config);
        assert_eq!(entry.state, FrameRateTestState::ObservationPeriod);
        assert_eq!(entry.advance_test(14, false, &config), TestStep::Idle);
        assert_eq!(
            entry.advance_test(15, false, &config),
            TestStep::EvaluateSuspension
        );
    }

    #[test]
    fn transient_stretches_the_safety_period() {
        let config = HeuristicsConfig::default();
        let mut entry = BitrateInfo::new(0, 1_000_000, &config);
        entry.advance_test(1, true, &config);
        assert_eq!(entry.state, FrameRateTestState::SafetyPeriod);
        entry.advance_test(5, true, &config);
        assert_eq!(entry.state, FrameRateTestState::SafetyPeriod);
        entry.advance_test(9, true, &config);
        assert_eq!(entry.state, FrameRateTestState::ObservationPeriod);
    }

    #[test]
    fn suspension_flags_and_backoff_counter() {
        let config = HeuristicsConfig::default();
        let mut entry = BitrateInfo::new(0, 1_000_000, &config);
        let now = Instant::now();
        entry.suspend(now, now + std::time::Duration::from_secs(60));
        assert!(entry.is_suspended());
        assert!(!entry.supported);
        assert!(entry.tested);
        assert_eq!(entry.suspension_count, 1);
        assert_eq!(entry.advance_test(100, false, &config), TestStep::Idle);

        entry.reset_test();
        assert!(entry.supported);
        assert!(!entry.tested);
        assert_eq!(entry.suspension_count, 1);
        assert_eq!(entry.state, FrameRateTestState::Init);
    }
}
