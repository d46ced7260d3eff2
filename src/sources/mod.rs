//! Bundled sources
//!
//! Every adapter comes with a `configure` function that builds a ready
//! [`Plugin`](crate::plugin::Plugin) from the current state of the machine.
//! Options from the configuration file are applied afterwards through
//! [`Plugin::configure_datasource`](crate::plugin::Plugin::configure_datasource).
//!
//! | Plugin        | Datasources                  | Interval |
//! |---------------|------------------------------|----------|
//! | `cpu`         | one counter per CPU mode     | 300s     |
//! | `loadavg`     | `1min`, `5min`, `15min`      | 300s     |
//! | `memory`      | `used`, `free`, `available`, `swap` | 300s |
//! | `users`       | `logins`, `users`            | 120s     |
//! | `df_*`        | one per mount point          | 900s     |
//! | `net_traffic` | `<iface>:in`, `<iface>:out`  | 120s     |
//! | `temperature` | one per hardware component   | 300s     |

use std::collections::HashMap;

use crate::datasource::DatasourceOptions;

pub mod cpu;
pub mod df;
pub mod loadavg;
pub mod memory;
pub mod net;
pub mod temperature;
pub mod users;

pub use cpu::CpuSource;
pub use df::{DfSource, DiskUsage};
pub use loadavg::LoadAvgSource;
pub use memory::MemorySource;
pub use net::NetSource;
pub use temperature::TemperatureSource;
pub use users::UsersSource;

/// Per-datasource options from the configuration file, keyed by datasource
/// name
pub type Overrides = HashMap<String, DatasourceOptions>;
