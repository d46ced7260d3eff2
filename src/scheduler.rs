//! Scheduler
//!
//! Spawns one [`SourceActor`](crate::actors::SourceActor) per plugin and
//! optionally the limit monitor, all sharing one cancellation token.
//! Stopping is idempotent; joining waits for in-flight cycles to finish.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::actors::{LimitMonitorHandle, SourceHandle};
use crate::limits::LimitChecker;
use crate::plugin::Plugin;
use crate::store::TimeSeriesStore;

pub struct Scheduler {
    store: Arc<dyn TimeSeriesStore>,
    stop: CancellationToken,
    sources: Vec<SourceHandle>,
    limit_monitor: Option<LimitMonitorHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self::with_token(store, CancellationToken::new())
    }

    /// Use an externally owned cancellation token
    pub fn with_token(store: Arc<dyn TimeSeriesStore>, stop: CancellationToken) -> Self {
        Self {
            store,
            stop,
            sources: vec![],
            limit_monitor: None,
            tasks: vec![],
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Start running `plugin` on its own timer
    pub fn spawn(&mut self, plugin: Plugin) -> SourceHandle {
        info!(
            "scheduling plugin {} every {}s ({} datasources)",
            plugin.name(),
            plugin.update_interval(),
            plugin.datasources().len()
        );

        let (handle, task) = SourceHandle::spawn(plugin, self.store.clone(), self.stop.clone());
        self.sources.push(handle.clone());
        self.tasks.push(task);
        handle
    }

    pub fn spawn_all(&mut self, plugins: impl IntoIterator<Item = Plugin>) {
        for plugin in plugins {
            self.spawn(plugin);
        }
    }

    /// Start checking limits every `check_interval`
    pub fn spawn_limit_monitor(
        &mut self,
        checker: Arc<LimitChecker>,
        check_interval: Duration,
    ) -> LimitMonitorHandle {
        let (handle, task) = LimitMonitorHandle::spawn(checker, check_interval, self.stop.clone());
        self.limit_monitor = Some(handle.clone());
        self.tasks.push(task);
        handle
    }

    pub fn sources(&self) -> &[SourceHandle] {
        &self.sources
    }

    pub fn source(&self, name: &str) -> Option<&SourceHandle> {
        self.sources.iter().find(|handle| handle.name() == name)
    }

    pub fn limit_monitor(&self) -> Option<&LimitMonitorHandle> {
        self.limit_monitor.as_ref()
    }

    /// Request every task to stop after its current cycle
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            debug!("stopping {} tasks", self.tasks.len());
        }
        self.stop.cancel();
    }

    /// Wait for every task to exit
    pub async fn join(self) {
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!("scheduled task failed: {e}");
            }
        }
        debug!("all scheduled tasks stopped");
    }

    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}
