//! The incremental lint-caching engine: discovery, digesting, dependency
//! mapping and tool execution over a source/mirror tree pair.
#![forbid(unsafe_code)]

pub mod depmap;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod mirror;
pub mod orchestrate;
pub mod progress;
pub mod runner;
pub mod tool;

pub use error::CoreError;
pub use orchestrate::{run_pipeline, run_pipeline_with, DEFAULT_PROBE_COMMAND};
pub use progress::{LineProgress, NullProgress, Phase, ProgressEvent, ProgressSink};
pub use runner::{execute_tool_ontree, MergedLog, RunnerOptions};
pub use tool::{toolstamp_is_uptodate, SimpleCommand, Tool};
