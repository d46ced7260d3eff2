//! Actor-based scheduling
//!
//! Each plugin runs inside its own actor task. A separate actor runs the
//! limit checker. All actors observe one shared cancellation token.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │    Scheduler    │── CancellationToken ──┐
//!                 └────────┬────────┘                       │
//!                          │ spawns                         │
//!        ┌─────────────────┼──────────────────┐             │
//!        │                 │                  │             │
//! ┌──────▼──────┐   ┌──────▼──────┐   ┌───────▼────────┐    │
//! │ SourceActor │   │ SourceActor │   │ LimitMonitor   │◄───┘
//! │ (loadavg)   │   │ (df)        │   │ Actor          │
//! └──────┬──────┘   └──────┬──────┘   └───────┬────────┘
//!        │ update          │ update           │ fetch
//!        └─────────────────┴──────────────────┘
//!                          │
//!                  ┌───────▼────────┐
//!                  │ TimeSeriesStore│
//!                  └────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel (`PollNow`, `CheckNow`)
//! 2. **Request/Response**: oneshot channels carry the results back
//! 3. **State**: Source actors publish their lifecycle through a watch channel

pub mod limits;
pub mod messages;
pub mod source;

pub use limits::{LimitMonitorActor, LimitMonitorHandle};
pub use messages::{LimitCommand, PluginState, SourceCommand};
pub use source::{SourceActor, SourceHandle};
