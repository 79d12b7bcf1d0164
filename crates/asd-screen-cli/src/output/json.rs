//! JSON output adapter.

use anyhow::Result;
use asd_screen_core::{RejectionReport, ReportOutput, ScreeningReport};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;

/// One line of `predict` output: a verdict or a rejection.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutputRecord {
    /// Screened image.
    Report(ScreeningReport),
    /// Rejected or failed image.
    Rejection(RejectionReport),
}

/// JSON Lines output adapter.
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    /// Creates a new JSON output writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a new JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Writes any serializable value as a single JSON document.
    #[allow(clippy::significant_drop_tightening)]
    pub fn write_value<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> Result<()> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        Ok(())
    }

    /// Writes a batch of records as a JSON array.
    pub fn write_array(&self, records: &[OutputRecord], pretty: bool) -> Result<()> {
        self.write_value(records, pretty)
    }
}

impl ReportOutput for JsonOutput {
    fn write(&self, report: &ScreeningReport) -> Result<()> {
        self.write_value(report, false)
    }

    fn write_rejection(&self, rejection: &RejectionReport) -> Result<()> {
        self.write_value(rejection, false)
    }

    #[allow(clippy::significant_drop_tightening)]
    fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.flush()?;
        Ok(())
    }
}
