//! Orchestration: per-symbol pipeline, batch runner, scheduler and HTTP surface.

pub mod bootstrap;
pub mod http;
pub mod pipeline;
pub mod scheduler;

pub use http::{create_router, start_server, AppState};
pub use pipeline::{
    BatchRunner, BatchSummary, PipelineContext, SymbolOutcome, SymbolPipeline, SymbolReport,
};
pub use scheduler::{cron_for_interval, parse_schedule, JobScheduler, LatestBatch};
