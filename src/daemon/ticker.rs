//! Periodic driver for the timer engine.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::clock::Clock;
use super::timer::TimerEngine;

/// Default tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Calls [`TimerEngine::tick`] on a fixed period until shut down.
pub struct Ticker {
    engine: Arc<TimerEngine>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl Ticker {
    /// Creates a ticker with the default one-second period.
    pub fn new(engine: Arc<TimerEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            clock,
            period: DEFAULT_TICK_PERIOD,
        }
    }

    /// Overrides the tick period.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Runs the tick loop.
    ///
    /// Returns once `shutdown` carries `true` or its sender is dropped.
    /// Missed ticks are skipped rather than replayed; the engine works from
    /// absolute timestamps, so one late tick catches up.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.engine.tick(self.clock.now_millis());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("ticker stopped");
                        return;
                    }
                }
            }
        }
    }
}
