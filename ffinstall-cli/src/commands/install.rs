//! `install`: the interactive install flow.
//!
//! 1. Show the latest upstream version
//! 2. Resolve build and scope (flags, then prompts, then config)
//! 3. Fetch the published digest and confirm
//! 4. Run the pipeline on a worker thread while the progress view renders
//!    its events on this one

use std::sync::mpsc;
use std::thread;

use clap::Args;
use ffinstall::catalog::{BuildKind, CatalogFeed};
use ffinstall::config::ConfigFile;
use ffinstall::manager::{has_privilege, InstallScope, PathRegistration};
use ffinstall::pipeline::{
    ChannelSink, InstallPipeline, InstallReport, InstallRequest, InstallStage, PipelineOutcome,
    SmokeTest,
};
use tracing::warn;

use super::common::{BuildChoice, ScopeChoice};
use crate::error::CliError;
use crate::ui::{self, ProgressView};

/// Arguments for the install command.
#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Build to install (prompted for when omitted)
    #[arg(short, long, value_enum)]
    pub build: Option<BuildChoice>,

    /// Install for the current user or for all users (prompted for when omitted)
    #[arg(short, long, value_enum)]
    pub scope: Option<ScopeChoice>,

    /// Skip prompts, using flags and configured defaults
    #[arg(short, long)]
    pub yes: bool,
}

pub fn run(args: InstallArgs, config: &ConfigFile) -> Result<(), CliError> {
    let pipeline = InstallPipeline::from_config(config)?;
    let fetcher = pipeline.fetcher();
    let feed = CatalogFeed::with_version_url(fetcher.as_ref(), config.feed.version_url.clone());

    match feed.latest_version() {
        Ok(version) => println!("Latest FFmpeg release: {}", version),
        Err(e) => {
            println!("Latest FFmpeg release: unknown");
            ui::warning(&format!("Could not fetch the latest version: {}", e));
        }
    }

    let interactive = !args.yes && ui::is_interactive();
    let build: BuildKind = match args.build {
        Some(choice) => choice.into(),
        None if interactive => ui::select_build(config.install.build)?,
        None => config.install.build,
    };
    let scope: InstallScope = match args.scope {
        Some(choice) => choice.into(),
        None if interactive => ui::select_scope(config.install.scope)?,
        None => config.install.scope,
    };

    if scope.requires_elevation() && !has_privilege(scope) {
        return Err(CliError::PrivilegeRequired);
    }

    let spec = build.spec();
    let digest = match feed.expected_digest(&spec) {
        Ok(digest) => digest,
        Err(e) => {
            warn!(error = %e, "Digest manifest unavailable");
            ui::warning(&format!(
                "Could not fetch the published checksum, the download will not be verified: {}",
                e
            ));
            None
        }
    };

    println!();
    println!("Build:        {} ({})", spec.name, spec.approximate_size);
    println!("Install for:  {}", scope);
    println!(
        "Install root: {}",
        pipeline.settings().install_root(scope).display()
    );
    println!("Search path:  {}", pipeline.store().location(scope));
    println!();

    if interactive
        && !ui::confirm("Any existing installation in the install root will be replaced. Continue?")?
    {
        println!("Installation cancelled.");
        return Ok(());
    }

    let request = InstallRequest::new(spec, scope).with_expected_digest(digest);
    let outcome = run_with_progress(&pipeline, request)?;

    match outcome {
        PipelineOutcome::Done(report) => {
            print_report(&report);
            Ok(())
        }
        PipelineOutcome::Failed { stage, error } => Err(CliError::Install {
            stage: stage_activity(stage),
            source: error,
        }),
    }
}

/// Run the pipeline on a worker thread and render its events here.
fn run_with_progress(
    pipeline: &InstallPipeline,
    request: InstallRequest,
) -> Result<PipelineOutcome, CliError> {
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        let worker = scope.spawn(move || pipeline.run(request, &ChannelSink::new(tx)));
        ProgressView::new().consume(rx);
        worker.join().map_err(|_| CliError::WorkerPanicked)
    })
}

fn print_report(report: &InstallReport) {
    println!();
    ui::success(&format!(
        "{} installed to {}",
        report.build.name,
        report.layout.payload_dir.display()
    ));

    match &report.registration {
        PathRegistration::Added { .. } => println!(
            "  Added {} to the {} search path",
            report.layout.bin_dir.display(),
            report.scope
        ),
        PathRegistration::AlreadyPresent => println!(
            "  {} was already on the search path",
            report.layout.bin_dir.display()
        ),
    }

    match &report.smoke {
        SmokeTest::Passed { version } => println!("  ffmpeg reports version {}", version),
        SmokeTest::Failed { reason } => ui::warning(&format!(
            "The installed ffmpeg did not run cleanly: {}",
            reason
        )),
    }

    println!();
    println!("Restart your terminal to start using ffmpeg.");
}

/// Lowercase activity phrase for error messages.
fn stage_activity(stage: InstallStage) -> &'static str {
    match stage {
        InstallStage::Pending => "starting",
        InstallStage::CleaningUp => "cleaning up",
        InstallStage::Downloading => "downloading",
        InstallStage::Verifying => "verifying",
        InstallStage::Extracting => "extracting",
        InstallStage::Installing => "installing",
        InstallStage::Testing | InstallStage::Done => "testing",
    }
}
