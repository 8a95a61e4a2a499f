//! Periodic recorded-duration sampler

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Samples the recorded duration while a recording is active
pub struct RecordingTimer {
    interval: Interval,
    last: Duration,
}

impl RecordingTimer {
    /// First tick fires one period after start
    pub fn start(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            last: Duration::ZERO,
        }
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Clamp a new reading so reported samples never decrease
    pub fn sample(&mut self, recorded: Duration) -> Duration {
        self.last = self.last.max(recorded);
        self.last
    }
}

/// "MM:SS", minutes not wrapped at the hour
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
