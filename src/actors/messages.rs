//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to one actor via mpsc
//! 2. **State**: Lifecycle state is published through a watch channel
//! 3. **Stop**: Shutdown is not a command, every actor observes the shared
//!    cancellation token instead

use tokio::sync::oneshot;

use crate::limits::Transitions;
use crate::plugin::CycleReport;

/// Commands that can be sent to a SourceActor
#[derive(Debug)]
pub enum SourceCommand {
    /// Run a cycle immediately (bypassing the timer)
    ///
    /// The timer restarts from the end of this cycle.
    PollNow {
        /// Channel to send the cycle result back
        respond_to: oneshot::Sender<anyhow::Result<CycleReport>>,
    },
}

/// Commands that can be sent to the LimitMonitorActor
#[derive(Debug)]
pub enum LimitCommand {
    /// Check every datasource now and return the transitions
    CheckNow {
        respond_to: oneshot::Sender<Transitions>,
    },
}

/// Lifecycle of a scheduled plugin
///
/// ```text
/// IDLE -> RUNNING -> STOPPING -> STOPPED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Spawned, loop not yet entered
    Idle,

    /// Waiting for or executing cycles
    Running,

    /// Stop observed, leaving the loop
    Stopping,

    /// Loop exited
    Stopped,
}
