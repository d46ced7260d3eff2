//! Round-robin time-series stores
//!
//! ## Design
//!
//! - **Trait-based**: `TimeSeriesStore` allows swapping implementations
//! - **Async**: All operations are async so they never block the scheduler
//! - **Command-style**: create / update / fetch, failures carry the output
//!
//! ## Backends
//!
//! - **rrdtool** (default): spawns the `rrdtool` binary for every operation
//! - **In-Memory**: No persistence, for tests and dry runs
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use sensor_monitoring::sample::SampleValue;
//! use sensor_monitoring::store::{RrdTool, TimeSeriesStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = RrdTool::new("rrdtool");
//!     store.update(Path::new("/var/lib/smt/data/loadavg.5min.rrd"), &SampleValue::Float(0.4)).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod rrdtool;

pub use backend::{FetchedRows, SeriesLayout, SignalDefinition, TimeSeriesStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use rrdtool::RrdTool;
