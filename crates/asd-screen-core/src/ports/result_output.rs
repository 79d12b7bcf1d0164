//! Output port for screening results.

use crate::domain::{RejectionReport, ScreeningReport};

/// Port for outputting screening results.
pub trait ReportOutput: Send + Sync {
    /// Writes a single screening report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write(&self, report: &ScreeningReport) -> anyhow::Result<()>;

    /// Writes a rejection record.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_rejection(&self, rejection: &RejectionReport) -> anyhow::Result<()>;

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&self) -> anyhow::Result<()>;
}
