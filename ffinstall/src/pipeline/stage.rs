//! Pipeline stages and the events they emit toward the presentation layer.

use std::sync::mpsc::Sender;

use crate::manager::ProgressRange;

/// Stages of an install run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstallStage {
    /// Run not started yet (or rejected before starting).
    Pending,
    /// Removing the previous installation.
    CleaningUp,
    /// Downloading the archive, or checking a previous download.
    Downloading,
    /// Verifying the archive digest.
    Verifying,
    /// Extracting and locating the payload.
    Extracting,
    /// Copying the payload and registering the search path.
    Installing,
    /// Running the installed executable.
    Testing,
    /// Installation complete.
    Done,
}

impl InstallStage {
    /// Get a human-readable name for the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::CleaningUp => "Cleaning up",
            Self::Downloading => "Downloading",
            Self::Verifying => "Verifying",
            Self::Extracting => "Extracting",
            Self::Installing => "Installing",
            Self::Testing => "Testing",
            Self::Done => "Done",
        }
    }

    /// Overall progress reported when the stage is entered.
    pub fn checkpoint(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::CleaningUp => 10,
            Self::Downloading => DOWNLOAD_RANGE.start,
            Self::Verifying => 50,
            Self::Extracting => EXTRACT_RANGE.start,
            Self::Installing => 95,
            Self::Testing | Self::Done => 100,
        }
    }
}

/// Share of the progress bar used by the archive download.
pub const DOWNLOAD_RANGE: ProgressRange = ProgressRange::new(10, 40);

/// Share of the progress bar used by extraction.
pub const EXTRACT_RANGE: ProgressRange = ProgressRange::new(50, 80);

/// A display update produced by a running pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Short description of the current activity.
    Status(String),
    /// Overall completion percentage.
    Progress(u8),
    /// Completion unknown for the current transfer.
    Indeterminate,
    /// Transfer rate; `None` clears the display.
    Speed(Option<String>),
    /// Log line for the user.
    Log(String),
    /// Non-fatal problem.
    Warning(String),
}

/// Receiver of pipeline display updates.
///
/// Implementations must not block for long: the pipeline calls them
/// between chunks of work.
pub trait StatusSink: Send {
    fn set_status(&self, text: &str);
    fn set_progress(&self, percent: u8);
    fn set_indeterminate(&self);
    fn set_speed(&self, rate: Option<&str>);
    fn append_log(&self, text: &str);
    fn warn(&self, text: &str);
}

/// Forwards updates over a channel to a single consumer loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<PipelineEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: PipelineEvent) {
        // A departed consumer only means nobody is watching any more
        let _ = self.tx.send(event);
    }
}

impl StatusSink for ChannelSink {
    fn set_status(&self, text: &str) {
        self.send(PipelineEvent::Status(text.to_string()));
    }

    fn set_progress(&self, percent: u8) {
        self.send(PipelineEvent::Progress(percent));
    }

    fn set_indeterminate(&self) {
        self.send(PipelineEvent::Indeterminate);
    }

    fn set_speed(&self, rate: Option<&str>) {
        self.send(PipelineEvent::Speed(rate.map(str::to_string)));
    }

    fn append_log(&self, text: &str) {
        self.send(PipelineEvent::Log(text.to_string()));
    }

    fn warn(&self, text: &str) {
        self.send(PipelineEvent::Warning(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_stage_checkpoints_increase() {
        let stages = [
            InstallStage::Pending,
            InstallStage::CleaningUp,
            InstallStage::Downloading,
            InstallStage::Verifying,
            InstallStage::Extracting,
            InstallStage::Installing,
            InstallStage::Testing,
            InstallStage::Done,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].checkpoint() <= pair[1].checkpoint());
        }
        assert_eq!(InstallStage::Verifying.checkpoint(), 50);
        assert_eq!(InstallStage::Installing.checkpoint(), 95);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(InstallStage::CleaningUp.name(), "Cleaning up");
        assert_eq!(InstallStage::Downloading.name(), "Downloading");
        assert_eq!(InstallStage::Done.name(), "Done");
    }

    #[test]
    fn test_channel_sink_forwards_events_in_order() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);

        sink.set_status("Downloading...");
        sink.set_progress(25);
        sink.set_speed(Some("1.5 MB/s"));
        sink.set_speed(None);
        sink.warn("no digest");
        drop(sink);

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                PipelineEvent::Status("Downloading...".to_string()),
                PipelineEvent::Progress(25),
                PipelineEvent::Speed(Some("1.5 MB/s".to_string())),
                PipelineEvent::Speed(None),
                PipelineEvent::Warning("no digest".to_string()),
            ]
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelSink::new(tx).append_log("nobody listening");
    }
}
