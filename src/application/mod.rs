pub mod aggregator;
pub mod context;
pub mod pipeline;
pub mod sink;
pub mod worker_pool;

pub use aggregator::{AckMode, AggregatorConfig, AggregatorStats, WindowAggregator};
pub use context::{Lifecycle, PipelineContext, PipelineStatus};
pub use pipeline::{
    Pipeline, PipelineError, PipelineMode, Sources, StartOutcome, StopOutcome,
};
pub use sink::{DecisionSink, SinkReport};
pub use worker_pool::{WorkerError, WorkerPool};
