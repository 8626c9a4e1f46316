use crate::{device::Device, error::Result, shape::PoolParams, tensor::Blob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolMethod {
    #[default]
    Max,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolingConfig {
    pub method: PoolMethod,
    pub kernel_size: usize,
    pub pad: usize,
    pub stride: usize,
}

impl Default for PoolingConfig {
    fn default() -> Self {
        PoolingConfig {
            method: PoolMethod::default(),
            kernel_size: 1,
            pad: 0,
            stride: 1,
        }
    }
}

impl PoolingConfig {
    pub fn average(params: &PoolParams) -> PoolingConfig {
        PoolingConfig {
            method: PoolMethod::Average,
            kernel_size: params.kernel_size,
            pad: params.pad,
            stride: params.stride,
        }
    }
}

/// A pooling layer as seen by the benchmark harness.
///
/// `forward` may return before the work has finished; only `synchronize`
/// guarantees completion. After `setup`, `forward` must accept the same
/// buffers any number of times.
pub trait PoolingOp {
    fn device(&self) -> Device;

    fn configure(&mut self, config: PoolingConfig);

    /// Validates the input against the current config and returns the output
    /// shape.
    fn setup(&mut self, input: &Blob) -> Result<Vec<usize>>;

    fn forward(&mut self, input: &Blob, output: &Blob) -> Result<()>;

    /// Blocks until all previously issued forward passes have completed.
    fn synchronize(&mut self) -> Result<()>;
}
