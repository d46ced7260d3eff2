//! Integration tests for persistence, scheduling and limit checking

#[path = "integration/helpers.rs"]
mod helpers;

#[path = "integration/persistence.rs"]
mod persistence;

#[path = "integration/scheduling.rs"]
mod scheduling;

#[path = "integration/limits_pipeline.rs"]
mod limits_pipeline;
