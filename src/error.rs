//! Error types shared across the crate
//!
//! - [`ConfigurationError`] is raised while plugins and datasources are being
//!   built. It is fatal for the offending plugin only.
//! - [`LimitError`] is returned by the limit checker. `NoLimitsConfigured` is
//!   an expected outcome for datasources without thresholds.
//!
//! Store failures live in [`crate::store::StorageError`].

use thiserror::Error;

use crate::store::StorageError;

/// Invalid plugin, datasource, archive or interval configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid datasource kind {0:?}")]
    InvalidKind(String),

    #[error("invalid consolidation function {0:?}")]
    InvalidConsolidationFunction(String),

    #[error("unknown archive template {0:?}")]
    UnknownTemplate(String),

    #[error("invalid interval value {0:?}")]
    InvalidInterval(String),

    #[error("datasource with name {0:?} already exists in this plugin")]
    DuplicateDatasourceName(String),

    #[error("datasource with safe name {0:?} already exists in this plugin")]
    DuplicateSafeName(String),

    #[error("could not find datasource {0:?}")]
    DatasourceNotFound(String),

    #[error("invalid datasource {name:?}: {reason}")]
    InvalidDatasource { name: String, reason: String },

    #[error("invalid plugin {name:?}: {reason}")]
    InvalidPlugin { name: String, reason: String },
}

/// Errors produced while checking the limits of a datasource
#[derive(Debug, Error)]
pub enum LimitError {
    /// Neither a warning nor a critical interval is configured
    #[error("could not find any limits for datasource {0:?}")]
    NoLimitsConfigured(String),

    #[error("failed to read metadata file {path}: {source}")]
    MetadataIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata file {path}: {source}")]
    MetadataFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    StateWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}
