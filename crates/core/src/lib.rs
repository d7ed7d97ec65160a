pub mod error;
pub mod logging;

pub mod cache;
pub mod hierarchy;
pub mod inject;
pub mod model;
pub mod pipeline;
pub mod scan;

pub use error::{AutoregError, Result};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, PipelineState};
