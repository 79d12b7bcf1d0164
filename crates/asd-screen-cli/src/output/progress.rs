//! Progress bar adapter using indicatif.

use asd_screen_core::{ProgressEvent, ProgressSink};
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};

/// Progress bar adapter for CLI output.
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress bar.
    ///
    /// # Arguments
    ///
    /// * `total` - Total number of items (images or epochs), if known
    /// * `quiet` - If true, suppress all output
    /// * `show_bar` - If true, show progress bar; otherwise show per-item status
    #[must_use]
    pub fn new(total: Option<u64>, quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = if show_bar {
            let bar = total.map_or_else(IndicatifBar::new_spinner, IndicatifBar::new);

            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }

            Some(bar)
        } else {
            None
        };

        Self { bar, quiet }
    }

    /// Clears the bar once a run that has no `Finished` event is over.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for ProgressBar {
    fn on_event(&self, event: ProgressEvent) {
        if self.quiet {
            return;
        }

        match event {
            ProgressEvent::Started { path, index, total } => {
                if let Some(bar) = &self.bar {
                    if let Some(t) = total {
                        bar.set_length(t as u64);
                    }
                    bar.set_position(index as u64);
                    bar.set_message(path);
                }
            }
            ProgressEvent::Completed { report } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                } else {
                    eprintln!(
                        "{}: {} ({:.2})",
                        report.path, report.final_label, report.final_confidence
                    );
                }
            }
            ProgressEvent::Rejected { path, reason } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                eprintln!("WARN: Rejected {path}: {reason}");
            }
            ProgressEvent::Finished {
                processed,
                rejected,
            } => {
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(format!(
                        "Done: {processed} screened, {rejected} rejected"
                    ));
                }
            }
            ProgressEvent::StageStarted {
                model,
                stage,
                epochs,
                learning_rate,
            } => {
                let line = format!("{model}: {stage} ({epochs} epochs, lr {learning_rate:e})");
                match &self.bar {
                    Some(bar) => bar.set_message(line),
                    None => eprintln!("{line}"),
                }
            }
            ProgressEvent::EpochCompleted {
                model,
                stage,
                epoch,
                train,
                valid,
            } => {
                let line = format!(
                    "{model} {stage} epoch {}: loss {:.4} acc {:.3} | val_loss {:.4} val_acc {:.3}",
                    epoch + 1,
                    train.loss,
                    train.accuracy,
                    valid.loss,
                    valid.accuracy
                );
                match &self.bar {
                    Some(bar) => {
                        bar.inc(1);
                        bar.set_message(line);
                    }
                    None => eprintln!("{line}"),
                }
            }
            ProgressEvent::Evaluated { model, metrics } => {
                let line = format!(
                    "{model}: test loss {:.4} accuracy {:.3}",
                    metrics.loss, metrics.accuracy
                );
                match &self.bar {
                    Some(bar) => bar.println(line),
                    None => eprintln!("{line}"),
                }
            }
        }
    }
}
