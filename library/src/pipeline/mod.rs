//! Pull-based pipeline evaluation.
//!
//! A task's pipeline is instantiated by a [`PipelineEvaluator`] which pulls
//! inputs from upstream nodes, evaluating each node at most once per pass.

pub mod build;
pub mod context;
pub mod evaluator;
pub mod monitor;

pub use build::{BuildReport, BuildRequest, Builder, TaskOutcome};
pub use context::{
    BuildContext, FileReadContext, FileWriteContext, FilterContext, GlobalSettings, LogLevel,
};
pub use evaluator::{EvaluatorState, PipelineCallable, PipelineEvaluator};
pub use monitor::{CancellationToken, LogMonitor, Monitor, NullMonitor, ProgressMonitor, SubMonitor};
