//! SourceActor - Runs one plugin on its own self-correcting timer
//!
//! ## Message Flow
//!
//! ```text
//! Timer → read_data() → Datasource::update() for every datasource → next delay
//!   ↑                                                                  │
//!   └──────────────── max(1s, interval - elapsed) ─────────────────────┘
//!                     or the full interval after a failed cycle
//! ```
//!
//! The loop races the timer against the cancellation token and the command
//! channel. A cycle is never interrupted: a stop request is only observed
//! between cycles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

use crate::plugin::{CycleReport, Plugin};
use crate::store::TimeSeriesStore;

use super::messages::{PluginState, SourceCommand};

/// Delay before the first cycle of every plugin
pub const INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Shortest wait between two cycles
pub const MIN_DELAY: Duration = Duration::from_secs(1);

/// Wait after a successful cycle that took `elapsed`
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed).max(MIN_DELAY)
}

/// Actor that owns a single plugin
pub struct SourceActor {
    plugin: Plugin,

    store: Arc<dyn TimeSeriesStore>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SourceCommand>,

    /// Lifecycle state published to the handles
    state_tx: watch::Sender<PluginState>,

    stop: CancellationToken,

    interval: Duration,
}

impl SourceActor {
    pub fn new(
        plugin: Plugin,
        store: Arc<dyn TimeSeriesStore>,
        command_rx: mpsc::Receiver<SourceCommand>,
        state_tx: watch::Sender<PluginState>,
        stop: CancellationToken,
    ) -> Self {
        let interval = Duration::from_secs(plugin.update_interval());

        Self {
            plugin,
            store,
            command_rx,
            state_tx,
            stop,
            interval,
        }
    }

    /// Run the actor's main loop until the cancellation token fires
    #[instrument(skip(self), fields(plugin = %self.plugin.name()))]
    pub async fn run(mut self) {
        self.state_tx.send_replace(PluginState::Running);
        debug!(
            "starting source actor, first cycle in {}s",
            INITIAL_DELAY.as_secs()
        );

        let mut delay = INITIAL_DELAY;

        loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => {
                    debug!("stop requested");
                    self.state_tx.send_replace(PluginState::Stopping);
                    break;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SourceCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let (next, result) = self.cycle().await;
                            delay = next;
                            let _ = respond_to.send(result);
                        }
                    }
                }

                _ = tokio::time::sleep(delay) => {
                    let (next, _) = self.cycle().await;
                    delay = next;
                }
            }
        }

        self.state_tx.send_replace(PluginState::Stopped);
        debug!("source actor stopped");
    }

    /// Run one cycle and compute the wait before the next one
    async fn cycle(&mut self) -> (Duration, Result<CycleReport>) {
        let started = Instant::now();
        let result = self.plugin.update(self.store.as_ref()).await;

        let delay = match &result {
            Ok(report) => {
                let delay = next_delay(self.interval, started.elapsed());
                trace!(
                    "updated {} datasources, next cycle in {}s",
                    report.updated.len(),
                    delay.as_secs()
                );
                delay
            }
            Err(e) => {
                error!("cycle failed: {e:#}");
                debug!(
                    "ignoring the error and waiting the full interval of {}s",
                    self.interval.as_secs()
                );
                self.interval
            }
        };

        (delay, result)
    }
}

/// Handle for controlling a SourceActor
///
/// It can be cloned and shared across tasks.
#[derive(Clone)]
pub struct SourceHandle {
    sender: mpsc::Sender<SourceCommand>,

    state: watch::Receiver<PluginState>,

    name: String,
}

impl SourceHandle {
    /// Spawn a new source actor observing `stop`
    ///
    /// Returns the handle and the task running the actor.
    pub fn spawn(
        plugin: Plugin,
        store: Arc<dyn TimeSeriesStore>,
        stop: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(PluginState::Idle);

        let name = plugin.name().to_string();
        let actor = SourceActor::new(plugin, store, cmd_rx, state_tx, stop);

        let task = tokio::spawn(actor.run());

        let handle = Self {
            sender: cmd_tx,
            state: state_rx,
            name,
        };
        (handle, task)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> PluginState {
        *self.state.borrow()
    }

    /// Run a cycle now and return its report
    pub async fn poll_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SourceCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Wait until the actor has left its loop
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        // a closed channel means the actor is gone as well
        let _ = state.wait_for(|s| *s == PluginState::Stopped).await;
    }
}
