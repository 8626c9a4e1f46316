use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use tracing::{debug, trace};

use crate::{
    backend::cpu,
    device::Device,
    error::{BenchError, Result},
    op::{PoolingConfig, PoolingOp},
    tensor::Blob,
};

struct Job {
    input: Blob,
    output: Blob,
    output_shape: Vec<usize>,
    config: PoolingConfig,
}

impl Job {
    // Consumes the job so the blobs are released before completion is signalled.
    fn run(self) -> Result<()> {
        let data = self.input.read();
        let mut out = self.output.write();
        cpu::pool2d(
            &data,
            self.input.shape(),
            &mut out,
            &self.output_shape,
            &self.config,
        )
    }
}

/// Pooling layer on an asynchronous, in-order device stream.
///
/// `forward` only enqueues work. Failures of enqueued passes are reported by
/// the next `synchronize`.
pub struct StreamPool {
    config: PoolingConfig,
    output_shape: Option<Vec<usize>>,
    queue: Option<Sender<Job>>,
    done: Receiver<Result<()>>,
    in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

impl StreamPool {
    pub fn new() -> Result<StreamPool> {
        let (queue, jobs) = mpsc::channel::<Job>();
        let (completed, done) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("pool-stream".into())
            .spawn(move || {
                for job in jobs {
                    if completed.send(job.run()).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| BenchError::Device(format!("failed to start device stream: {e}")))?;

        Ok(StreamPool {
            config: PoolingConfig::default(),
            output_shape: None,
            queue: Some(queue),
            done,
            in_flight: 0,
            worker: Some(worker),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl PoolingOp for StreamPool {
    fn device(&self) -> Device {
        Device::Accelerator
    }

    fn configure(&mut self, config: PoolingConfig) {
        self.config = config;
        self.output_shape = None;
    }

    fn setup(&mut self, input: &Blob) -> Result<Vec<usize>> {
        let shape = cpu::output_shape(input.shape(), &self.config)?;
        self.output_shape = Some(shape.clone());
        Ok(shape)
    }

    fn forward(&mut self, input: &Blob, output: &Blob) -> Result<()> {
        let output_shape = self
            .output_shape
            .clone()
            .ok_or_else(|| BenchError::Configuration("forward called before setup".into()))?;
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| BenchError::Device("device stream is closed".into()))?;

        trace!("enqueue pool2d {:?} -> {:?}", input.shape(), output_shape);
        queue
            .send(Job {
                input: input.clone(),
                output: output.clone(),
                output_shape,
                config: self.config,
            })
            .map_err(|_| BenchError::Device("device stream terminated".into()))?;
        self.in_flight += 1;

        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        debug!("synchronizing device stream, {} passes in flight", self.in_flight);

        let mut first_error = None;
        while self.in_flight > 0 {
            match self.done.recv() {
                Ok(Ok(())) => (),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    self.in_flight = 0;
                    return Err(BenchError::Device("device stream terminated".into()));
                }
            }
            self.in_flight -= 1;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for StreamPool {
    fn drop(&mut self) {
        // closing the queue lets the worker drain and exit
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
