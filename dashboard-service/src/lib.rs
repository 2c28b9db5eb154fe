pub mod anomaly;
pub mod calendar;
pub mod config;
pub mod heatmap;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod sinks;
pub mod sources;
pub mod timestamp;
pub mod transform;
pub mod web;

pub use pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineParams};
