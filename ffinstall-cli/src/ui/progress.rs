//! Progress display for an install run.
//!
//! The pipeline runs on a worker thread and sends [`PipelineEvent`]s over a
//! channel; this view is the only consumer and owns all display state.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use console::style;
use ffinstall::pipeline::PipelineEvent;
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "[{bar:40.cyan/blue}] {pos:>3}% {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const TICK_INTERVAL: Duration = Duration::from_millis(120);

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress bar plus scrolling log lines above it.
pub struct ProgressView {
    bar: ProgressBar,
    status: String,
    speed: Option<String>,
    indeterminate: bool,
}

impl Default for ProgressView {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressView {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(100))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(bar_style());
        Self {
            bar,
            status: String::new(),
            speed: None,
            indeterminate: false,
        }
    }

    /// Render events until the sending side hangs up.
    pub fn consume(mut self, events: Receiver<PipelineEvent>) {
        for event in events {
            self.handle(event);
        }
        self.bar.finish_and_clear();
    }

    fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Status(text) => {
                self.status = text;
                self.refresh_message();
            }
            PipelineEvent::Progress(percent) => {
                if self.indeterminate {
                    self.indeterminate = false;
                    self.bar.disable_steady_tick();
                    self.bar.set_style(bar_style());
                }
                self.bar.set_position(u64::from(percent));
            }
            PipelineEvent::Indeterminate => {
                if !self.indeterminate {
                    self.indeterminate = true;
                    self.bar.set_style(spinner_style());
                    self.bar.enable_steady_tick(TICK_INTERVAL);
                }
            }
            PipelineEvent::Speed(rate) => {
                self.speed = rate;
                self.refresh_message();
            }
            PipelineEvent::Log(text) => self.bar.println(format!("  {}", text)),
            PipelineEvent::Warning(text) => self
                .bar
                .println(format!("  {} {}", style("warning:").yellow(), text)),
        }
    }

    fn refresh_message(&self) {
        let message = match &self.speed {
            Some(rate) => format!("{} ({})", self.status, rate),
            None => self.status.clone(),
        };
        self.bar.set_message(message);
    }
}
