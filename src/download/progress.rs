//! Transfer progress reporting.
//!
//! Purely observational: nothing here influences what is written to disk.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

use super::constants::{PROGRESS_INTERVAL, RATE_HISTORY_LEN};

/// Rolling window of recent throughput samples, newest first.
#[derive(Debug, Clone, Default)]
pub struct RateHistory {
    samples: VecDeque<f64>,
}

impl RateHistory {
    /// Records a throughput sample in bytes per second.
    pub fn push(&mut self, bytes_per_sec: f64) {
        self.samples.push_front(bytes_per_sec);
        self.samples.truncate(RATE_HISTORY_LEN);
    }

    /// Mean of the retained samples.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true when no sample was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Projects the time needed for `remaining` bytes at the average rate.
    #[must_use]
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.average()?;
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

/// Formats a byte count with three significant digits (`1.5MB`, `999B`).
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u32); 4] = [("T", 4), ("G", 3), ("M", 2), ("K", 1)];
    let value = bytes as f64;
    for (unit, power) in UNITS {
        let scale = 1024_f64.powi(power as i32);
        if value >= scale * 999.0 / 1024.0 {
            return format!("{}{unit}B", three_significant(value / scale));
        }
    }
    format!("{bytes}B")
}

fn three_significant(value: f64) -> String {
    let decimals = if value >= 100.0 {
        0
    } else if value >= 10.0 {
        1
    } else if value >= 1.0 {
        2
    } else {
        3
    };
    let rendered = format!("{value:.decimals$}");
    if rendered.contains('.') {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

/// Formats a duration as `1d2h3m4s`, omitting leading zero units.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        (total / 3_600) % 24,
        (total / 60) % 60,
        total % 60,
    );
    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d"));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

fn per_second(rate: f64) -> String {
    format!("{}/s", format_size(rate.max(0.0) as u64))
}

/// Emits progress lines for one range fetch at most every few seconds.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    total: u64,
    history: RateHistory,
    interval_start: Instant,
    interval_offset: u64,
}

impl ProgressReporter {
    pub(crate) fn new(total: u64, offset: u64) -> Self {
        let reporter = Self {
            total,
            history: RateHistory::default(),
            interval_start: Instant::now(),
            interval_offset: offset,
        };
        reporter.log(offset, None);
        reporter
    }

    /// Records that `offset` bytes are now on disk.
    pub(crate) fn advance(&mut self, offset: u64) {
        let elapsed = self.interval_start.elapsed();
        if elapsed >= PROGRESS_INTERVAL {
            self.sample(offset, elapsed);
        }
    }

    /// Logs a final line for the fetch.
    pub(crate) fn finish(&mut self, offset: u64) {
        let elapsed = self.interval_start.elapsed();
        self.sample(offset, elapsed);
    }

    fn sample(&mut self, offset: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            Some(offset.saturating_sub(self.interval_offset) as f64 / secs)
        } else {
            None
        };
        if let Some(rate) = rate {
            self.history.push(rate);
        }
        self.log(offset, rate);
        self.interval_start = Instant::now();
        self.interval_offset = offset;
    }

    fn log(&self, offset: u64, rate: Option<f64>) {
        let remaining = self.total.saturating_sub(offset);
        let percent = if self.total == 0 {
            100.0
        } else {
            offset as f64 / self.total as f64 * 100.0
        };
        let eta = self
            .history
            .eta(remaining)
            .map_or_else(|| "-".to_string(), format_duration);
        let rate = rate.map_or_else(|| "-".to_string(), per_second);
        let avg_rate = self
            .history
            .average()
            .map_or_else(|| "-".to_string(), per_second);
        info!(
            done = %format_size(offset),
            total = %format_size(self.total),
            percent = format_args!("{percent:.1}"),
            remaining = %format_size(remaining),
            rate = %rate,
            avg_rate = %avg_rate,
            eta = %eta,
            "progress"
        );
    }
}
