use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;

/// What drives a full resync.
#[derive(Debug)]
pub enum ResyncTrigger {
    /// Fire every period, first tick one period after start
    Interval(Duration),
    /// Fire once per received message; stops when every sender is dropped
    Channel(mpsc::Receiver<()>),
}

impl ResyncTrigger {
    pub(crate) fn into_ticker(self) -> ResyncTicker {
        match self {
            ResyncTrigger::Interval(period) => {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ResyncTicker::Interval(interval)
            }
            ResyncTrigger::Channel(rx) => ResyncTicker::Channel(rx),
        }
    }
}

pub(crate) enum ResyncTicker {
    Interval(Interval),
    Channel(mpsc::Receiver<()>),
}

impl ResyncTicker {
    /// Next tick, `None` once the trigger can never fire again.
    pub(crate) async fn tick(&mut self) -> Option<()> {
        match self {
            ResyncTicker::Interval(interval) => {
                interval.tick().await;
                Some(())
            }
            ResyncTicker::Channel(rx) => rx.recv().await,
        }
    }
}
