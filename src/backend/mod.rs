pub mod cpu;
pub mod stream;

use crate::{device::Device, error::Result, op::PoolingOp};

pub fn pooling_layer(device: Device) -> Result<Box<dyn PoolingOp>> {
    match device {
        Device::Cpu => Ok(Box::new(cpu::CpuPool::new())),
        Device::Accelerator => Ok(Box::new(stream::StreamPool::new()?)),
    }
}
