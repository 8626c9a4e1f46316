use crate::shape::{PoolParams, PooledShape, ShapeParams};

/// Scale applied to the raw operation count before it is reported as "gflops".
///
/// This is `1e-8`, ten times larger than a nano conversion. Historical results
/// were produced with this factor, so it is kept as is.
// TODO: switch to 1e-9 once historical result sets are re-baselined.
pub const GFLOP_SCALE: f64 = 10e-9;

/// Estimated compute-equivalent work of one average pooling forward pass.
///
/// Every output element costs the number of real input elements in its
/// clipped window plus one for the division.
pub fn estimate_work(shape: &ShapeParams, params: &PoolParams) -> f64 {
    let pooled = PooledShape::from_params(shape, params);

    let plane: f64 = (0..pooled.height)
        .flat_map(|ph| (0..pooled.width).map(move |pw| (ph, pw)))
        .map(|(ph, pw)| {
            let rows = window_extent(ph, shape.height_in, params);
            let cols = window_extent(pw, shape.width_in, params);
            (rows * cols) as f64 + 1.0
        })
        .sum();

    // every (batch, channel) plane sees the same windows
    let planes = (shape.batch_size * shape.channels_in) as f64;
    plane * planes * GFLOP_SCALE
}

/// Number of real (non-padding) positions covered by window `index` along one
/// axis.
fn window_extent(index: usize, dim: usize, params: &PoolParams) -> i64 {
    let (dim, kernel, pad, stride) = (
        dim as i64,
        params.kernel_size as i64,
        params.pad as i64,
        params.stride as i64,
    );

    let start = index as i64 * stride - pad;
    let end = (start + kernel).min(dim + pad);

    let start = start.max(0);
    let end = end.min(dim);

    (end - start).max(0)
}
