//! Animation clock
//!
//! One tokio interval task per live animation. Ticks go straight onto the
//! participant's event bus; destroying the animation aborts its task, so no
//! tick is emitted after the destroy has been applied.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::debug;

use crate::events::EventEmitter;

#[derive(Default)]
pub struct AnimationClock {
    tickers: HashMap<String, JoinHandle<()>>,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking `name` every `period`; the first tick is one period out
    pub fn start(&mut self, name: &str, period: Duration, emitter: EventEmitter) {
        debug!(%name, ?period, "AnimationClock::start: called");
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            let mut tick: u64 = 0;
            loop {
                interval.tick().await;
                tick += 1;
                emitter.animation_tick(&task_name, tick);
            }
        });

        if let Some(previous) = self.tickers.insert(name.to_string(), handle) {
            previous.abort();
        }
    }

    /// Cancel future ticks; returns false if `name` was not running
    pub fn stop(&mut self, name: &str) -> bool {
        match self.tickers.remove(name) {
            Some(handle) => {
                debug!(%name, "AnimationClock::stop: aborting ticker");
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tickers.contains_key(name)
    }

    pub fn running(&self) -> usize {
        self.tickers.len()
    }
}

impl Drop for AnimationClock {
    fn drop(&mut self) {
        for (_, handle) in self.tickers.drain() {
            handle.abort();
        }
    }
}
