pub mod backend;
pub mod device;
pub mod error;
pub mod estimate;
pub mod op;
pub mod report;
pub mod runner;
pub mod shape;
pub mod sweep;
pub mod tensor;

pub use error::{BenchError, Result};
pub use estimate::{estimate_work, GFLOP_SCALE};
pub use runner::{BenchConfig, BenchRunner, TrialResult};
pub use shape::{PoolParams, PooledShape, ShapeParams};
