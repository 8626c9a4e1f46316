use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Parameter combination rejected by the pooling layer's setup step.
    #[error("invalid pooling configuration: {0}")]
    Configuration(String),

    /// Failure reported by the executing device, surfaced at the barrier.
    #[error("device error: {0}")]
    Device(String),

    #[error("failed to allocate {elements} f32 elements for {what}")]
    ResourceExhausted { what: &'static str, elements: usize },

    #[error("report sink failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
