use tracing::trace;

use crate::{
    device::Device,
    error::{BenchError, Result},
    op::{PoolMethod, PoolingConfig, PoolingOp},
    shape::pooled_dim,
    tensor::Blob,
};

/// Output shape for a pooling pass, or a configuration error when the input
/// and config cannot be combined.
pub fn output_shape(input_shape: &[usize], config: &PoolingConfig) -> Result<Vec<usize>> {
    if input_shape.len() != 4 {
        return Err(BenchError::Configuration(format!(
            "expected a 4d input, got shape {input_shape:?}"
        )));
    }
    if input_shape.contains(&0) {
        return Err(BenchError::Configuration(format!(
            "input shape {input_shape:?} has an empty dimension"
        )));
    }
    if config.kernel_size == 0 || config.stride == 0 {
        return Err(BenchError::Configuration(format!(
            "kernel size ({}) and stride ({}) must be positive",
            config.kernel_size, config.stride
        )));
    }

    let (batch, channels, height, width) =
        (input_shape[0], input_shape[1], input_shape[2], input_shape[3]);
    for (name, dim) in [("height", height), ("width", width)] {
        if config.kernel_size > dim + 2 * config.pad {
            return Err(BenchError::Configuration(format!(
                "kernel size {} exceeds padded {name} {}",
                config.kernel_size,
                dim + 2 * config.pad
            )));
        }
    }

    Ok(vec![
        batch,
        channels,
        pooled_dim(height, config.kernel_size, config.pad, config.stride),
        pooled_dim(width, config.kernel_size, config.pad, config.stride),
    ])
}

/// Clipped window `[start, end)` along one axis; empty when the window only
/// covers padding.
fn window(index: usize, dim: usize, config: &PoolingConfig) -> (usize, usize) {
    let start = (index * config.stride) as i64 - config.pad as i64;
    let end = (start + config.kernel_size as i64).min((dim + config.pad) as i64);

    let start = start.clamp(0, dim as i64) as usize;
    let end = end.clamp(0, dim as i64) as usize;
    (start, end.max(start))
}

pub fn pool2d(
    data: &[f32],
    shape: &[usize],
    output: &mut [f32],
    output_shape: &[usize],
    config: &PoolingConfig,
) -> Result<()> {
    if shape.len() != 4 || output_shape.len() != 4 {
        return Err(BenchError::Device(format!(
            "pool2d needs 4d shapes, got {shape:?} -> {output_shape:?}"
        )));
    }
    if data.len() != shape.iter().product::<usize>()
        || output.len() != output_shape.iter().product::<usize>()
    {
        return Err(BenchError::Device(format!(
            "buffer sizes ({}, {}) do not match shapes {shape:?} -> {output_shape:?}",
            data.len(),
            output.len()
        )));
    }

    let (batch, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
    let (pooled_height, pooled_width) = (output_shape[2], output_shape[3]);

    let mut out = output.iter_mut();
    for n in 0..batch {
        for c in 0..channels {
            let plane = &data[(n * channels + c) * height * width..][..height * width];
            for ph in 0..pooled_height {
                let (hstart, hend) = window(ph, height, config);
                for pw in 0..pooled_width {
                    let (wstart, wend) = window(pw, width, config);
                    let count = (hend - hstart) * (wend - wstart);

                    let value = if count == 0 {
                        0.0
                    } else {
                        let values = (hstart..hend)
                            .flat_map(move |h| plane[h * width + wstart..h * width + wend].iter());
                        match config.method {
                            PoolMethod::Average => values.sum::<f32>() / count as f32,
                            PoolMethod::Max => values.fold(f32::MIN, |acc, &x| acc.max(x)),
                        }
                    };

                    if let Some(slot) = out.next() {
                        *slot = value;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Pooling layer that runs every forward pass synchronously on the calling
/// thread.
#[derive(Debug, Default)]
pub struct CpuPool {
    config: PoolingConfig,
    output_shape: Option<Vec<usize>>,
}

impl CpuPool {
    pub fn new() -> CpuPool {
        CpuPool::default()
    }
}

impl PoolingOp for CpuPool {
    fn device(&self) -> Device {
        Device::Cpu
    }

    fn configure(&mut self, config: PoolingConfig) {
        self.config = config;
        self.output_shape = None;
    }

    fn setup(&mut self, input: &Blob) -> Result<Vec<usize>> {
        let shape = output_shape(input.shape(), &self.config)?;
        self.output_shape = Some(shape.clone());
        Ok(shape)
    }

    fn forward(&mut self, input: &Blob, output: &Blob) -> Result<()> {
        let output_shape = self
            .output_shape
            .as_ref()
            .ok_or_else(|| BenchError::Configuration("forward called before setup".into()))?;
        trace!("cpu pool2d {:?} -> {:?}", input.shape(), output_shape);

        let data = input.read();
        let mut out = output.write();
        pool2d(&data, input.shape(), &mut out, output_shape, &self.config)
    }

    fn synchronize(&mut self) -> Result<()> {
        Ok(())
    }
}
