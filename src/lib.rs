//! Sensor monitoring
//!
//! Independent sources are polled on their own schedules, every value is
//! persisted into a fixed-step round-robin series and the latest values are
//! checked against warning and critical limits.
//!
//! ```text
//! Scheduler ──► SourceActor ──► Plugin::update ──► Datasource::update ──► TimeSeriesStore
//!     │                                                                        ▲
//!     └──────► LimitMonitorActor ──► LimitChecker::check_all ──────────────────┘
//!                                        └──► <state_dir>/<datasource>.txt
//! ```

pub mod actors;
pub mod archive;
pub mod config;
pub mod datasource;
pub mod error;
pub mod interval;
pub mod limits;
pub mod plugin;
pub mod sample;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod util;

pub use datasource::{Datasource, DatasourceKind, DatasourceOptions};
pub use limits::{LimitChecker, ThresholdState, Transition};
pub use plugin::{CycleReport, Plugin, Source};
pub use sample::{Readings, SampleValue};
pub use scheduler::Scheduler;
