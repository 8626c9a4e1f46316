/// Logical input dimensions, always in NCHW order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeParams {
    pub batch_size: usize,
    pub channels_in: usize,
    pub height_in: usize,
    pub width_in: usize,
}

impl ShapeParams {
    pub fn new(batch_size: usize, channels_in: usize, height_in: usize, width_in: usize) -> Self {
        ShapeParams {
            batch_size,
            channels_in,
            height_in,
            width_in,
        }
    }

    pub fn square(batch_size: usize, channels_in: usize, dim: usize) -> Self {
        ShapeParams::new(batch_size, channels_in, dim, dim)
    }

    pub fn dims(&self) -> Vec<usize> {
        vec![
            self.batch_size,
            self.channels_in,
            self.height_in,
            self.width_in,
        ]
    }
}

/// `num_output` does not influence average pooling; it is carried for labels
/// and to keep parity with convolution-style benchmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    pub kernel_size: usize,
    pub pad: usize,
    pub stride: usize,
    pub num_output: usize,
}

impl PoolParams {
    pub fn new(kernel_size: usize, pad: usize, stride: usize, num_output: usize) -> Self {
        PoolParams {
            kernel_size,
            pad,
            stride,
            num_output,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledShape {
    pub height: usize,
    pub width: usize,
}

impl PooledShape {
    pub fn from_params(shape: &ShapeParams, params: &PoolParams) -> Self {
        PooledShape {
            height: pooled_dim(shape.height_in, params.kernel_size, params.pad, params.stride),
            width: pooled_dim(shape.width_in, params.kernel_size, params.pad, params.stride),
        }
    }
}

/// `ceil((dim + 2 * pad - kernel) / stride) + 1`.
///
/// The quotient is rounded up, so the last window may start inside the
/// trailing padding. The pooling layer infers its output shape with this same
/// rule, keep the two in sync. Never returns less than 1.
pub fn pooled_dim(dim: usize, kernel_size: usize, pad: usize, stride: usize) -> usize {
    let span = (dim + 2 * pad) as i64 - kernel_size as i64;
    let stride = stride.max(1) as i64;
    let steps = span.div_euclid(stride) + i64::from(span.rem_euclid(stride) != 0);

    (steps + 1).max(1) as usize
}
