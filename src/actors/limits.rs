//! LimitMonitorActor - Periodically checks all datasources against their limits
//!
//! ```text
//! Ticker (check_interval) → LimitChecker::check_all() → log every transition
//!     ↑
//!     └─── Commands (CheckNow)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::limits::{LimitChecker, ThresholdState, Transitions};

use super::messages::LimitCommand;

/// Actor that runs the limit checker on a timer
pub struct LimitMonitorActor {
    checker: Arc<LimitChecker>,

    command_rx: mpsc::Receiver<LimitCommand>,

    stop: CancellationToken,

    interval_duration: Duration,
}

impl LimitMonitorActor {
    pub fn new(
        checker: Arc<LimitChecker>,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<LimitCommand>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            checker,
            command_rx,
            stop,
            interval_duration,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting limit monitor, checking every {}s",
            self.interval_duration.as_secs()
        );

        let mut ticker = interval_at(
            Instant::now() + self.interval_duration,
            self.interval_duration,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => {
                    debug!("stop requested");
                    break;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        LimitCommand::CheckNow { respond_to } => {
                            debug!("received CheckNow command");
                            let transitions = self.check().await;
                            let _ = respond_to.send(transitions);
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }

        debug!("limit monitor stopped");
    }

    async fn check(&self) -> Transitions {
        let transitions = self.checker.check_all().await;
        report(&transitions);
        transitions
    }
}

/// Log every transition, recoveries at info level and the rest as warnings
pub fn report(transitions: &Transitions) {
    for (name, transition) in transitions {
        match transition.current {
            ThresholdState::Normal => info!(
                "{name} recovered: {} -> {} (value {})",
                transition.previous, transition.current, transition.value
            ),
            _ => warn!(
                "{name} changed state: {} -> {} (value {})",
                transition.previous, transition.current, transition.value
            ),
        }
    }
}

/// Handle for controlling a LimitMonitorActor
#[derive(Clone)]
pub struct LimitMonitorHandle {
    sender: mpsc::Sender<LimitCommand>,
}

impl LimitMonitorHandle {
    pub fn spawn(
        checker: Arc<LimitChecker>,
        interval_duration: Duration,
        stop: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = LimitMonitorActor::new(checker, interval_duration, cmd_rx, stop);
        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Check every datasource now
    pub async fn check_now(&self) -> Result<Transitions> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LimitCommand::CheckNow { respond_to: tx })
            .await
            .context("failed to send CheckNow command")?;

        rx.await.context("failed to receive response")
    }
}
