use std::{
    io::{self, Write},
    sync::{Arc, Mutex, RwLock, Weak},
};

use poolbench::{
    device::Device,
    error::{BenchError, Result},
    op::{PoolMethod, PoolingConfig, PoolingOp},
    tensor::Blob,
};

pub fn assert_aprox_eq_rel(a: f64, b: f64, tolerance: f64) {
    let scale = a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
    assert!(
        (a - b).abs() / scale <= tolerance,
        "{a} and {b} differ by more than {tolerance} relative"
    );
}

/// Collects everything logged on the current thread while `f` runs.
pub fn captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let value = tracing::subscriber::with_default(subscriber, f);

    let bytes = captured.0.lock().unwrap().clone();
    (value, String::from_utf8(bytes).unwrap())
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Setup,
    Forward(usize),
    Synchronize,
    /// The nth forward fails and so does every barrier after it.
    ForwardThenSynchronize(usize),
}

/// Wraps a pooling layer, remembers every buffer it was handed and can
/// inject a failure at one stage.
pub struct TrackingOp<P: PoolingOp> {
    inner: P,
    pub fault: Option<Fault>,
    pub config: Option<PoolingConfig>,
    pub forwards: usize,
    pub synchronizes: usize,
    buffers: Vec<Weak<RwLock<Vec<f32>>>>,
}

impl<P: PoolingOp> TrackingOp<P> {
    pub fn new(inner: P) -> Self {
        TrackingOp {
            inner,
            fault: None,
            config: None,
            forwards: 0,
            synchronizes: 0,
            buffers: Vec::new(),
        }
    }

    pub fn failing_at(inner: P, fault: Fault) -> Self {
        TrackingOp {
            fault: Some(fault),
            ..TrackingOp::new(inner)
        }
    }

    pub fn tracked(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers
            .iter()
            .filter(|b| b.upgrade().is_some())
            .count()
    }

    pub fn method(&self) -> Option<PoolMethod> {
        self.config.map(|c| c.method)
    }
}

impl<P: PoolingOp> PoolingOp for TrackingOp<P> {
    fn device(&self) -> Device {
        self.inner.device()
    }

    fn configure(&mut self, config: PoolingConfig) {
        self.config = Some(config);
        self.inner.configure(config);
    }

    fn setup(&mut self, input: &Blob) -> Result<Vec<usize>> {
        self.buffers.push(input.downgrade());
        if self.fault == Some(Fault::Setup) {
            return Err(BenchError::Configuration("injected setup failure".into()));
        }
        self.inner.setup(input)
    }

    fn forward(&mut self, input: &Blob, output: &Blob) -> Result<()> {
        self.buffers.push(input.downgrade());
        self.buffers.push(output.downgrade());
        self.forwards += 1;
        if let Some(Fault::Forward(n) | Fault::ForwardThenSynchronize(n)) = self.fault {
            if n == self.forwards {
                return Err(BenchError::Device("injected forward failure".into()));
            }
        }
        self.inner.forward(input, output)
    }

    fn synchronize(&mut self) -> Result<()> {
        self.synchronizes += 1;
        self.inner.synchronize()?;
        if let Some(Fault::Synchronize | Fault::ForwardThenSynchronize(_)) = self.fault {
            return Err(BenchError::Device("injected barrier failure".into()));
        }
        Ok(())
    }
}
