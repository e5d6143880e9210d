//! Timing helpers shared by the phase metrics.

use std::time::Instant;

/// Records the elapsed time into a histogram when dropped.
pub struct TimingGuard {
    start: Instant,
    histogram_name: &'static str,
    stage: &'static str,
}

impl TimingGuard {
    pub fn new(histogram_name: &'static str, stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name,
            stage,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.elapsed_secs();
        tracing::debug!(stage = self.stage, duration_secs = duration, "Stage finished");
        ::metrics::histogram!(self.histogram_name, "stage" => self.stage).record(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_timing_guard_measures_elapsed() {
        let guard = TimingGuard::new("test_stage_duration_seconds", "test");
        thread::sleep(Duration::from_millis(5));
        assert!(guard.elapsed_secs() >= 0.005);
    }
}
