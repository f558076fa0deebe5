//! Named suspension points.
//!
//! Every wait in brewd goes through a [`Sleeper`] together with the [`Pause`]
//! it belongs to, so timing can be asserted in tests without real sleeps.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

/// Why the monitor is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Pause {
    /// Full cycle wait after a trusted sample was handled.
    Cadence,
    /// Half-cycle wait after an inconclusive sample.
    Backoff,
    /// Wait between the two reads of one debounce window.
    InterRead,
    /// Lets the pot finish dripping before announcing fresh coffee.
    DripDown,
    /// Dark period of the still-brewing blink.
    Blink,
    /// Wait between startup reachability attempts.
    ConnectRetry,
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, pause: Pause, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, pause: Pause, duration: Duration) {
        trace!("Sleeping {:?} ({})", duration, pause);
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper for tests: returns immediately and remembers what was asked of it.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    pauses: std::sync::Arc<std::sync::Mutex<Vec<(Pause, Duration)>>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause requested so far, in order
    pub fn pauses(&self) -> Vec<(Pause, Duration)> {
        self.pauses.lock().unwrap().clone()
    }

    /// Only the kinds of the pauses requested so far
    pub fn kinds(&self) -> Vec<Pause> {
        self.pauses().into_iter().map(|(p, _)| p).collect()
    }

    pub fn clear(&self) {
        self.pauses.lock().unwrap().clear();
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, pause: Pause, duration: Duration) {
        self.pauses.lock().unwrap().push((pause, duration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_display() {
        assert_eq!(Pause::DripDown.to_string(), "drip_down");
        assert_eq!(Pause::ConnectRetry.to_string(), "connect_retry");
    }

    #[tokio::test]
    async fn test_recording_sleeper_keeps_order() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(Pause::InterRead, Duration::from_secs(5)).await;
        sleeper.sleep(Pause::Cadence, Duration::from_secs(5)).await;

        assert_eq!(sleeper.kinds(), vec![Pause::InterRead, Pause::Cadence]);

        sleeper.clear();
        assert!(sleeper.pauses().is_empty());
    }
}
