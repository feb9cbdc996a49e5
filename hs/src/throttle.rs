//! Throttled broadcast scheduler for manipulation samples
//!
//! A drag produces samples far faster than peers need them. Each manipulated
//! object gets a fixed window: the first `max_per_window` samples in a window
//! go out immediately and the rest are dropped, never queued. The final pose
//! is remembered so that releasing control can always publish it.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::ManipulationSample;

/// Throttle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Broadcast ceiling per window per object
    #[serde(rename = "max-per-window", default = "default_max_per_window")]
    pub max_per_window: u32,

    /// Window length in milliseconds
    #[serde(rename = "window-ms", default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_max_per_window() -> u32 {
    20
}

fn default_window_ms() -> u64 {
    1000
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_ms: default_window_ms(),
        }
    }
}

impl ThrottleConfig {
    /// Window length as a Duration, never shorter than 1ms
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.max(1))
    }
}

/// Verdict for one offered sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Broadcast,
    Dropped,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
    last: ManipulationSample,
}

/// Totals across all objects since the throttle was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleStats {
    pub broadcast: u64,
    pub dropped: u64,
}

/// Per-object fixed-window broadcast limiter
#[derive(Debug)]
pub struct BroadcastThrottle {
    max_per_window: u32,
    window: Duration,
    objects: HashMap<String, Window>,
    stats: ThrottleStats,
}

impl BroadcastThrottle {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            max_per_window: config.max_per_window,
            window: config.window(),
            objects: HashMap::new(),
            stats: ThrottleStats::default(),
        }
    }

    /// Offer a sample taken at `now`
    ///
    /// The first sample for an object opens its window; later windows start
    /// at whole multiples of the window length after that, the way a
    /// repeating timer started with the drag would tick.
    pub fn offer(&mut self, sample: ManipulationSample, now: Instant) -> Admission {
        let window = self.window;
        let state = self.objects.entry(sample.target.clone()).or_insert_with(|| Window {
            started: now,
            count: 0,
            last: sample.clone(),
        });

        let elapsed = now.saturating_duration_since(state.started);
        if elapsed >= window {
            // Into the current window; kept in u128 so long idle gaps cannot wrap
            let into = elapsed.as_nanos() % window.as_nanos();
            let into = Duration::new((into / 1_000_000_000) as u64, (into % 1_000_000_000) as u32);
            state.started = now.checked_sub(into).unwrap_or(now);
            state.count = 0;
        }

        state.count += 1;
        state.last = sample;

        if state.count <= self.max_per_window {
            self.stats.broadcast += 1;
            Admission::Broadcast
        } else {
            self.stats.dropped += 1;
            debug!(target = %state.last.target, count = state.count, "BroadcastThrottle: sample dropped");
            Admission::Dropped
        }
    }

    /// Close the object's window and hand back its last sample
    pub fn finish(&mut self, target: &str) -> Option<ManipulationSample> {
        self.objects.remove(target).map(|w| w.last)
    }

    /// Forget an object without producing a final sample
    pub fn forget(&mut self, target: &str) {
        self.objects.remove(target);
    }

    pub fn is_tracking(&self, target: &str) -> bool {
        self.objects.contains_key(target)
    }

    pub fn stats(&self) -> ThrottleStats {
        self.stats
    }
}
