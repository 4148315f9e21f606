use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::FrameRate;

/// Ready-signal counter shared between the coordinator and the reporter.
#[derive(Debug, Clone, Default)]
pub struct FrameRateCounter {
    ready: Arc<AtomicU32>,
}

impl FrameRateCounter {
    pub fn record_ready(&self) {
        self.ready.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the count since the last call and resets it.
    pub fn take(&self) -> u32 {
        self.ready.swap(0, Ordering::Relaxed)
    }
}

/// Reports the number of ready signals seen in each `period`.
pub async fn run(
    counter: FrameRateCounter,
    period: Duration,
    reports: Option<Sender<FrameRate>>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let fps = counter.take();
                info!(fps, "frame rate");
                if let Some(tx) = reports.as_ref()
                    && tx.send(FrameRate(fps)).await.is_err()
                {
                    debug!("frame-rate listener gone");
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn take_resets_the_window() {
        let counter = FrameRateCounter::default();
        counter.record_ready();
        counter.clone().record_ready();
        assert_eq!(counter.take(), 2);
        assert_eq!(counter.take(), 0);
    }

    #[tokio::test]
    async fn reports_each_window() {
        let counter = FrameRateCounter::default();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            counter.clone(),
            Duration::from_millis(20),
            Some(tx),
            cancel.clone(),
        ));

        for _ in 0..5 {
            counter.record_ready();
        }
        assert_eq!(rx.recv().await, Some(FrameRate(5)));
        assert_eq!(rx.recv().await, Some(FrameRate(0)));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
