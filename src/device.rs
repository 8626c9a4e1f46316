use std::fmt;

use clap::ValueEnum;

/// Where the operation under test executes. Chosen once per runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Device {
    #[default]
    Cpu,
    /// Asynchronous in-order stream; work completes at the barrier.
    Accelerator,
}

impl Device {
    pub fn from_env() -> Device {
        if std::env::var("ACCELERATOR").is_ok() {
            Device::Accelerator
        } else {
            Device::Cpu
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator => write!(f, "accelerator"),
        }
    }
}
