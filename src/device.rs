//! Device tags carried by every storage buffer.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Represents the device where a tensor's data resides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// CPU device
    #[default]
    Cpu,
    /// CUDA GPU device with a specific device ID.
    ///
    /// The tag exists in every build so configuration can name it; allocating on it
    /// without the `cuda` feature fails with [`Error::DeviceUnavailable`].
    Cuda(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    /// Parses `cpu`, `cuda` (ordinal 0) or `cuda:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse::<u32>()
                    .map(Device::Cuda)
                    .map_err(|_| Error::InvalidConfig(format!("bad CUDA ordinal in '{}'", other))),
                None => Err(Error::InvalidConfig(format!("unknown device '{}'", other))),
            },
        }
    }
}
