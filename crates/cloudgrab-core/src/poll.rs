use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const PROGRESS_EVERY_TICKS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Predicate held on this tick (1-based)
    Ready { ticks: u32 },
    TimedOut { ticks: u32 },
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn ticks(&self) -> u32 {
        match self {
            PollOutcome::Ready { ticks } | PollOutcome::TimedOut { ticks } => *ticks,
        }
    }
}

/// Bounded "wait until true" loop: one predicate evaluation per tick, at most `max_ticks` evaluations.
#[derive(Debug, Clone)]
pub struct Poller {
    max_ticks: u32,
    tick: Duration,
    label: &'static str,
}

impl Poller {
    pub fn new(label: &'static str, max_ticks: u32, tick: Duration) -> Self {
        Self { max_ticks, tick, label }
    }

    /// Errors from the predicate count as "not ready yet" for that tick.
    pub async fn wait_until<F, Fut, E>(&self, mut predicate: F) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        for tick in 1..=self.max_ticks {
            match predicate().await {
                Ok(true) => {
                    debug!("{} ready after {} tick(s)", self.label, tick);
                    return PollOutcome::Ready { ticks: tick };
                }
                Ok(false) => {}
                Err(e) => {
                    debug!("{} check failed on tick {}, treating as not ready: {}", self.label, tick, e);
                }
            }

            sleep(self.tick).await;

            if tick % PROGRESS_EVERY_TICKS == 0 {
                info!("Still waiting for {}... ({}/{} ticks)", self.label, tick, self.max_ticks);
            }
        }

        PollOutcome::TimedOut { ticks: self.max_ticks }
    }
}
