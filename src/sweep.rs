use std::{fmt, iter};

use clap::ValueEnum;
use lazy_static::lazy_static;
use tracing::debug;

use crate::{
    error::Result,
    report::Reporter,
    runner::{BenchRunner, TrialResult},
    shape::{PoolParams, ShapeParams},
};

/// The field a sweep writes its current value into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Batch,
    ChannelsIn,
    /// Height and width together.
    InputDim,
    KernelSize,
    Pad,
    NumOutput,
}

impl Param {
    pub fn apply(&self, shape: &mut ShapeParams, params: &mut PoolParams, value: usize) {
        match self {
            Param::Batch => shape.batch_size = value,
            Param::ChannelsIn => shape.channels_in = value,
            Param::InputDim => {
                shape.height_in = value;
                shape.width_in = value;
            }
            Param::KernelSize => params.kernel_size = value,
            Param::Pad => params.pad = value,
            Param::NumOutput => params.num_output = value,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Param::Batch => "batch",
            Param::ChannelsIn => "channels_in",
            Param::InputDim => "height/width",
            Param::KernelSize => "kernel_size",
            Param::Pad => "pad",
            Param::NumOutput => "num_output",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Add(usize),
    Mul(usize),
}

impl Step {
    /// None once the sequence would stop growing or overflow.
    fn next(&self, value: usize) -> Option<usize> {
        let next = match self {
            Step::Add(n) => value.checked_add(*n),
            Step::Mul(n) => value.checked_mul(*n),
        };
        next.filter(|&next| next > value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Inclusive(usize),
    Exclusive(usize),
}

impl Bound {
    fn admits(&self, value: usize) -> bool {
        match self {
            Bound::Inclusive(max) => value <= *max,
            Bound::Exclusive(max) => value < *max,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialPoint {
    pub label: String,
    pub shape: ShapeParams,
    pub params: PoolParams,
}

impl TrialPoint {
    pub fn new(label: impl Into<String>, shape: ShapeParams, params: PoolParams) -> Self {
        TrialPoint {
            label: label.into(),
            shape,
            params,
        }
    }
}

/// One parameter varied over an ascending sequence, everything else fixed.
///
/// Bounds are hard-coded per sweep to stay within device memory.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    pub kind: SweepKind,
    pub description: &'static str,
    pub label: &'static str,
    pub varies: Param,
    pub start: usize,
    pub step: Step,
    pub bound: Bound,
    pub shape: ShapeParams,
    pub params: PoolParams,
}

impl ParamSweep {
    pub fn values(&self) -> Vec<usize> {
        iter::successors(Some(self.start), |&v| self.step.next(v))
            .take_while(|&v| self.bound.admits(v))
            .collect()
    }

    pub fn points(&self) -> Vec<TrialPoint> {
        self.values()
            .into_iter()
            .map(|value| {
                let (mut shape, mut params) = (self.shape, self.params);
                self.varies.apply(&mut shape, &mut params, value);
                TrialPoint::new(format!("{} = {}.", self.label, value), shape, params)
            })
            .collect()
    }
}

lazy_static! {
    // Values are in (kernel_size, pad, stride) order as the historical runs
    // used them; filter-size and groups therefore vary pad and kernel_size.
    pub static ref PARAM_SWEEPS: Vec<ParamSweep> = vec![
        ParamSweep {
            kind: SweepKind::InputSize,
            description: "vary input size",
            label: "inputDim",
            varies: Param::InputDim,
            start: 8,
            step: Step::Mul(2),
            bound: Bound::Inclusive(128),
            shape: ShapeParams::square(50, 384, 8),
            params: PoolParams::new(3, 2, 1, 256),
        },
        ParamSweep {
            kind: SweepKind::FilterSize,
            description: "vary filter size",
            label: "filterSize",
            varies: Param::Pad,
            start: 1,
            step: Step::Add(1),
            bound: Bound::Exclusive(10),
            shape: ShapeParams::square(50, 384, 55),
            params: PoolParams::new(2, 1, 1, 256),
        },
        ParamSweep {
            kind: SweepKind::ChannelsIn,
            description: "num input channels",
            label: "channels_in",
            varies: Param::ChannelsIn,
            start: 4,
            step: Step::Mul(2),
            bound: Bound::Inclusive(2048),
            shape: ShapeParams::square(50, 4, 55),
            params: PoolParams::new(3, 2, 1, 256),
        },
        ParamSweep {
            kind: SweepKind::BatchSize,
            description: "num batch size",
            label: "NUM_",
            varies: Param::Batch,
            start: 1,
            step: Step::Add(4),
            bound: Bound::Exclusive(60),
            shape: ShapeParams::square(1, 384, 55),
            params: PoolParams::new(2, 3, 1, 256),
        },
        ParamSweep {
            kind: SweepKind::Groups,
            description: "num groups",
            label: "num groups",
            varies: Param::KernelSize,
            start: 1,
            step: Step::Mul(2),
            bound: Bound::Inclusive(8),
            shape: ShapeParams::square(50, 384, 55),
            params: PoolParams::new(1, 3, 1, 256),
        },
        ParamSweep {
            kind: SweepKind::NumFilters,
            description: "num filters",
            label: "num filters",
            varies: Param::NumOutput,
            start: 2,
            step: Step::Mul(2),
            bound: Bound::Exclusive(10000),
            shape: ShapeParams::square(50, 384, 55),
            params: PoolParams::new(2, 3, 1, 2),
        },
    ];
}

/// Five fixed trials shaped like the AlexNet convolution layers.
pub fn alexnet_points() -> Vec<TrialPoint> {
    let batch = 50;
    [
        ("alexnet conv1", 3, 227, PoolParams::new(11, 1, 4, 96)),
        ("alexnet conv2", 96, 27, PoolParams::new(5, 2, 1, 256)),
        ("alexnet conv3", 256, 13, PoolParams::new(3, 1, 1, 384)),
        ("alexnet conv4", 384, 13, PoolParams::new(3, 2, 1, 384)),
        ("alexnet conv5", 384, 13, PoolParams::new(3, 2, 1, 256)),
    ]
    .into_iter()
    .map(|(label, channels, dim, params)| {
        TrialPoint::new(label, ShapeParams::square(batch, channels, dim), params)
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SweepKind {
    Alexnet,
    InputSize,
    FilterSize,
    ChannelsIn,
    BatchSize,
    Groups,
    NumFilters,
}

impl SweepKind {
    pub fn param_sweep(&self) -> Option<&'static ParamSweep> {
        PARAM_SWEEPS.iter().find(|sweep| sweep.kind == *self)
    }

    pub fn description(&self) -> &'static str {
        self.param_sweep()
            .map_or("alexnet", |sweep| sweep.description)
    }

    pub fn points(&self) -> Vec<TrialPoint> {
        match self.param_sweep() {
            Some(sweep) => sweep.points(),
            None => alexnet_points(),
        }
    }
}

/// Runs every point in order, reporting each result as soon as it is known.
/// The first failing trial aborts the sweep.
pub fn run_sweep(
    runner: &BenchRunner,
    description: &str,
    points: &[TrialPoint],
    reporter: &mut dyn Reporter,
) -> Result<Vec<TrialResult>> {
    reporter.begin(description)?;

    let mut results = Vec::with_capacity(points.len());
    for point in points {
        debug!("trial {:?}: {:?} {:?}", point.label, point.shape, point.params);
        let result = runner.run(&point.shape, &point.params, &point.label)?;
        reporter.record(&result)?;
        results.push(result);
    }

    reporter.finish(results.len())?;
    Ok(results)
}
