use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::{
    backend,
    device::Device,
    error::{BenchError, Result},
    estimate::estimate_work,
    op::{PoolingConfig, PoolingOp},
    shape::{PoolParams, ShapeParams},
    tensor::Blob,
};

pub const DEFAULT_RUNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    pub device: Device,
    pub runs: usize,
    /// When false, one untimed pass (and a barrier) runs before the timer
    /// starts.
    pub include_first_call: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            device: Device::Cpu,
            runs: DEFAULT_RUNS,
            include_first_call: true,
        }
    }
}

impl BenchConfig {
    /// `ACCELERATOR` selects the accelerator device, `NUM_RUNS` overrides the
    /// repetition count and must be a positive integer.
    pub fn from_env() -> Result<BenchConfig> {
        let runs = match std::env::var("NUM_RUNS") {
            Ok(raw) => parse_runs(&raw)?,
            Err(_) => DEFAULT_RUNS,
        };

        Ok(BenchConfig {
            device: Device::from_env(),
            runs,
            ..BenchConfig::default()
        })
    }
}

fn parse_runs(raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|&runs| runs > 0)
        .ok_or_else(|| {
            BenchError::Configuration(format!("NUM_RUNS must be a positive integer, got {raw:?}"))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub label: String,
    pub elapsed_ms_per_run: f64,
    pub estimated_work: f64,
    pub throughput: f64,
}

impl TrialResult {
    /// `throughput` is work per millisecond scaled to per second; a zero
    /// elapsed time reports zero throughput.
    pub fn new(label: impl Into<String>, elapsed_ms_per_run: f64, estimated_work: f64) -> Self {
        let throughput = if elapsed_ms_per_run > 0.0 {
            estimated_work / elapsed_ms_per_run * 1000.0
        } else {
            0.0
        };

        TrialResult {
            label: label.into(),
            elapsed_ms_per_run,
            estimated_work,
            throughput,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchRunner {
    config: BenchConfig,
}

impl BenchRunner {
    pub fn new(config: BenchConfig) -> BenchRunner {
        BenchRunner { config }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Runs one trial on a fresh pooling layer for the configured device.
    pub fn run(&self, shape: &ShapeParams, params: &PoolParams, label: &str) -> Result<TrialResult> {
        let mut layer = backend::pooling_layer(self.config.device)?;
        self.run_with(layer.as_mut(), shape, params, label)
    }

    /// Runs one trial against `op`.
    ///
    /// Buffers are allocated here and released before returning, on the error
    /// path as well.
    pub fn run_with(
        &self,
        op: &mut dyn PoolingOp,
        shape: &ShapeParams,
        params: &PoolParams,
        label: &str,
    ) -> Result<TrialResult> {
        let input = Blob::rand(shape.dims())?;
        let mut output = Blob::empty();

        let timed = self.time_forward(op, params, &input, &mut output, label);
        if timed.is_err() {
            // passes already queued still hold the buffers until drained
            if let Err(err) = op.synchronize() {
                debug!("{label}: drain after failed trial also failed: {err}");
            }
        }
        drop((input, output));

        Ok(TrialResult::new(label, timed?, estimate_work(shape, params)))
    }

    /// Milliseconds per forward pass, barrier included.
    fn time_forward(
        &self,
        op: &mut dyn PoolingOp,
        params: &PoolParams,
        input: &Blob,
        output: &mut Blob,
        label: &str,
    ) -> Result<f64> {
        op.configure(PoolingConfig::average(params));
        output.reshape(op.setup(input)?)?;

        if !self.config.include_first_call {
            op.forward(input, output)?;
            op.synchronize()?;
        }

        let runs = self.config.runs.max(1);
        debug!("{label}: {runs} forward passes on {}", op.device());

        let start = Instant::now();
        for _ in 0..runs {
            op.forward(input, output)?;
        }
        op.synchronize()?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        Ok(elapsed_ms / runs as f64)
    }
}
