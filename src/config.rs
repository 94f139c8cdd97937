//! Explicit configuration handed to tensor factories.
//!
//! Nothing here is global: device selection and random-fill parameters are plain values
//! that callers construct (or read from the environment once) and pass along.

use crate::device::Device;
use crate::error::Error;

/// Environment variable consulted by [`TensorOptions::from_env`].
pub const DEVICE_ENV_VAR: &str = "GRAPHGRAD_DEVICE";

/// Where a new tensor lives and whether it records gradients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorOptions {
    pub device: Device,
    pub requires_grad: bool,
}

impl TensorOptions {
    pub fn new(device: Device, requires_grad: bool) -> Self {
        Self {
            device,
            requires_grad,
        }
    }

    pub fn on(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Reads the default device from `GRAPHGRAD_DEVICE` (`cpu`, `cuda`, `cuda:N`).
    /// Falls back to CPU when the variable is unset.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var(DEVICE_ENV_VAR) {
            Ok(value) => Ok(Self::default().on(value.parse()?)),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(Error::InvalidConfig(format!("{}: {}", DEVICE_ENV_VAR, e))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// U(low, high), `low` inclusive.
    Uniform { low: f32, high: f32 },
    /// N(mean, std_dev^2).
    Normal { mean: f32, std_dev: f32 },
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::Uniform {
            low: 0.0,
            high: 1.0,
        }
    }
}

/// Parameters for random fills. Defaults to uniform [0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RandomConfig {
    pub distribution: Distribution,
}

impl RandomConfig {
    pub fn uniform(low: f32, high: f32) -> Self {
        Self {
            distribution: Distribution::Uniform { low, high },
        }
    }

    pub fn normal(mean: f32, std_dev: f32) -> Self {
        Self {
            distribution: Distribution::Normal { mean, std_dev },
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self.distribution {
            Distribution::Uniform { low, high } => {
                if !(high > low) || !low.is_finite() || !high.is_finite() {
                    return Err(Error::InvalidConfig(format!(
                        "Upper bound ({}) must be greater than lower bound ({}) for uniform distribution",
                        high, low
                    )));
                }
            }
            Distribution::Normal { std_dev, .. } => {
                if !(std_dev >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "Standard deviation ({}) must be non-negative for normal distribution",
                        std_dev
                    )));
                }
            }
        }
        Ok(())
    }
}
