use std::io::Write;

use serde_json::json;
use tracing::info;

use crate::{error::Result, runner::TrialResult};

pub const SUMMARY: &str = "*** Benchmark ends ***";

pub trait Reporter {
    /// Called once before the first trial of a sweep.
    fn begin(&mut self, _description: &str) -> Result<()> {
        Ok(())
    }

    fn record(&mut self, result: &TrialResult) -> Result<()>;

    /// Called once after the last trial of a sweep.
    fn finish(&mut self, trials: usize) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn begin(&mut self, description: &str) -> Result<()> {
        info!("running '{description}'");
        Ok(())
    }

    fn record(&mut self, result: &TrialResult) -> Result<()> {
        info!(
            "    {} forward: {} ms, {} gflops ... {} gflops/sec",
            result.label, result.elapsed_ms_per_run, result.estimated_work, result.throughput
        );
        Ok(())
    }

    fn finish(&mut self, trials: usize) -> Result<()> {
        info!(trials, "{SUMMARY}");
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonReporter<W: Write> {
    writer: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(writer: W) -> Self {
        JsonReporter { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn begin(&mut self, description: &str) -> Result<()> {
        info!("running '{description}'");
        Ok(())
    }

    fn record(&mut self, result: &TrialResult) -> Result<()> {
        serde_json::to_writer(&mut self.writer, result).map_err(std::io::Error::from)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self, trials: usize) -> Result<()> {
        writeln!(
            self.writer,
            "{}",
            json!({ "summary": SUMMARY, "trials": trials })
        )?;
        self.writer.flush()?;
        Ok(())
    }
}
