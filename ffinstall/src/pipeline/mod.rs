//! The install pipeline and its presentation boundary.
//!
//! [`InstallPipeline::run`] drives one install from cleanup to smoke test.
//! Display updates leave the pipeline through a [`StatusSink`]; the usual
//! sink is a [`ChannelSink`] feeding [`PipelineEvent`] values to a consumer
//! loop on another thread.

mod context;
mod runner;
mod smoke;
mod stage;

pub use context::{
    InstallRequest, PipelineSettings, RunContext, EXECUTABLE_STEM, EXTRACT_DIR_NAME,
    VERSION_FLAG, VERSION_HEADER,
};
pub use runner::{InstallPipeline, InstallReport, PipelineOutcome};
pub use smoke::{parse_version_line, run_smoke_test, SmokeTest};
pub use stage::{
    ChannelSink, InstallStage, PipelineEvent, StatusSink, DOWNLOAD_RANGE, EXTRACT_RANGE,
};
