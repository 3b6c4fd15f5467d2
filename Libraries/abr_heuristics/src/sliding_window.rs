//! Outlier-aware sliding window over a stream of samples.

use std::time::Instant;

// Fixed-capacity ring of samples with a running sum. `kernel` is the
// arithmetic mean of the window and `slope` the kernel delta per second
// between the two most recent adds. A sample deviating from the kernel
// by more than the configured fractions wipes the window and restarts
// from that sample, so a level shift shows up immediately instead of
// bleeding in over `capacity` adds.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: Vec<f64>,
    head: usize,
    len: usize,
    sum: f64,
    max_up_fraction: f64,
    max_down_fraction: f64,
    kernel: f64,
    slope: f64,
    last_add: Option<Instant>,
}

impl SlidingWindow {
    pub fn new(capacity: usize, max_up_fraction: f64, max_down_fraction: f64) -> SlidingWindow {
        debug_assert!(capacity > 0, "window capacity must be positive");
        debug_assert!(max_up_fraction >= 0.0 && max_down_fraction >= 0.0);
        SlidingWindow {
            samples: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
            sum: 0.0,
            max_up_fraction,
            max_down_fraction,
            kernel: 0.0,
            slope: 0.0,
            last_add: None,
        }
    }

    // Pushes one sample. `now` comes from the caller so tests can replay
    // a timeline without sleeping.
    pub fn add(&mut self, sample: f64, now: Instant) {
        if self.len > 0 && self.is_outlier(sample) {
            self.reset();
        }
        if self.len == self.samples.len() {
            self.sum -= self.samples[self.head];
        } else {
            self.len += 1;
        }
        self.samples[self.head] = sample;
        self.head = (self.head + 1) % self.samples.len();
        self.sum += sample;

        let kernel = self.sum / self.len as f64;
        if let Some(previous) = self.last_add {
            let elapsed = now.saturating_duration_since(previous).as_secs_f64();
            self.slope = if elapsed > 0.0 {
                (kernel - self.kernel) / elapsed
            } else {
                0.0
            };
        }
        self.kernel = kernel;
        self.last_add = Some(now);
    }

    fn is_outlier(&self, sample: f64) -> bool {
        sample > self.kernel * (1.0 + self.max_up_fraction)
            || sample < self.kernel * (1.0 - self.max_down_fraction)
    }

    pub fn kernel(&self) -> f64 {
        self.kernel
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // Most favorable sample still in the window, zero when empty.
    pub fn min(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.samples[..self.len]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
        self.sum = 0.0;
        self.kernel = 0.0;
        self.slope = 0.0;
        self.last_add = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn kernel_averages_the_window() {
        let mut window = SlidingWindow::new(4, 10.0, 10.0);
        let start = Instant::now();
        for (i, sample) in [2.0, 4.0, 6.0].iter().enumerate() {
            window.add(*sample, start + Duration::from_secs(i as u64));
        }
        assert_eq!(window.len(), 3);
        assert!((window.kernel() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn capacity_evicts_the_oldest_sample() {
        let mut window = SlidingWindow::new(2, 10.0, 10.0);
        let start = Instant::now();
        window.add(1.0, start);
        window.add(2.0, start + Duration::from_secs(1));
        window.add(3.0, start + Duration::from_secs(2));
        assert_eq!(window.len(), 2);
        assert!((window.kernel() - 2.5).abs() < 1e-9);
        assert!((window.min() - 2.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(26.0)] // spike beyond the up fraction
    #[case(2.0)] // collapse below the down fraction
    fn outlier_resets_to_the_new_sample(#[case] outlier: f64) {
        let mut window = SlidingWindow::new(8, 0.5, 0.5);
        let start = Instant::now();
        for i in 0..5 {
            window.add(10.0, start + Duration::from_secs(i));
        }
        assert_eq!(window.len(), 5);
        window.add(outlier, start + Duration::from_secs(5));
        assert_eq!(window.len(), 1);
        assert!((window.kernel() - outlier).abs() < 1e-9);
    }

    #[test]
    fn slope_tracks_kernel_change_per_second() {
        let mut window = SlidingWindow::new(4, 10.0, 10.0);
        let start = Instant::now();
        window.add(10.0, start);
        assert_eq!(window.slope(), 0.0);
        window.add(14.0, start + Duration::from_secs(2));
        assert!((window.slope() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn min_reports_the_most_favorable_sample() {
        let mut window = SlidingWindow::new(4, 10.0, 10.0);
        assert_eq!(window.min(), 0.0);
        let start = Instant::now();
        window.add(5.0, start);
        window.add(3.0, start + Duration::from_secs(1));
        window.add(8.0, start + Duration::from_secs(2));
        assert!((window.min() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_everything() {
        let mut window = SlidingWindow::new(4, 10.0, 10.0);
        let start = Instant::now();
        window.add(5.0, start);
        window.add(6.0, start + Duration::from_secs(1));
        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.kernel(), 0.0);
        assert_eq!(window.slope(), 0.0);
        assert_eq!(window.min(), 0.0);
    }
}
