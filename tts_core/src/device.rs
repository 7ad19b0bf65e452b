//! Compute backend selection.
//!
//! Backends are checked in a fixed order, Apple (`mps`) → NVIDIA (`cuda`) →
//! `cpu`, and the first available one wins. The choice is made once at startup
//! and registered as the default ONNX Runtime execution provider so every
//! model session built afterwards runs on it.

use std::fmt;

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    ExecutionProviderDispatch,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("{0} backend requested but not available")]
    Unavailable(Device),

    #[error("onnx runtime error: {0}")]
    Runtime(String),
}

/// Selected compute backend, reported verbatim by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Mps,
    Cuda,
    Cpu,
}

impl Device {
    /// Probe order for automatic selection.
    pub const PREFERENCE_ORDER: [Device; 3] = [Device::Mps, Device::Cuda, Device::Cpu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Mps => "mps",
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    // Registration failures are errors, not a silent fallback to CPU
    fn execution_provider(&self) -> ExecutionProviderDispatch {
        let dispatch = match self {
            Device::Mps => CoreMLExecutionProvider::default().build(),
            Device::Cuda => CUDAExecutionProvider::default().build(),
            Device::Cpu => CPUExecutionProvider::default().build(),
        };
        dispatch.error_on_failure()
    }

    /// Whether this crate was built with support for the backend.
    ///
    /// ONNX Runtime lists every provider in its binary, but sessions can only
    /// use those enabled through the matching `ort` feature.
    pub fn compiled_in(&self) -> bool {
        match self {
            Device::Mps => cfg!(feature = "coreml"),
            Device::Cuda => cfg!(feature = "cuda"),
            Device::Cpu => true,
        }
    }

    /// Ask ONNX Runtime whether this backend can be used in this process.
    pub fn is_available(&self) -> bool {
        if !self.compiled_in() {
            return false;
        }
        let status = match self {
            Device::Mps => CoreMLExecutionProvider::default().is_available(),
            Device::Cuda => CUDAExecutionProvider::default().is_available(),
            Device::Cpu => return true,
        };
        match status {
            Ok(available) => available,
            Err(e) => {
                warn!("{} backend availability check failed: {e}", self);
                false
            }
        }
    }

    /// Make this backend the default for sessions created from now on.
    pub fn register(&self) -> Result<(), DeviceError> {
        ort::init()
            .with_execution_providers([self.execution_provider()])
            .commit()
            .map_err(|e| DeviceError::Runtime(e.to_string()))?;
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device preference from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    Force(Device),
}

impl DevicePreference {
    /// Parse from `TTS_DEVICE`. Unknown values mean `Auto`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Self::Force(Device::Cpu),
            "mps" | "metal" | "coreml" | "apple" => Self::Force(Device::Mps),
            "cuda" | "gpu" | "nvidia" => Self::Force(Device::Cuda),
            _ => Self::Auto,
        }
    }
}

/// Select a backend by probing ONNX Runtime.
pub fn select_device(preference: DevicePreference) -> Result<Device, DeviceError> {
    select_with(preference, Device::is_available)
}

/// Select a backend using `is_available` to decide availability.
pub fn select_with<F>(preference: DevicePreference, is_available: F) -> Result<Device, DeviceError>
where
    F: Fn(&Device) -> bool,
{
    match preference {
        DevicePreference::Force(device) => {
            if device == Device::Cpu || is_available(&device) {
                info!("Using {device} device (forced)");
                Ok(device)
            } else {
                Err(DeviceError::Unavailable(device))
            }
        }
        DevicePreference::Auto => {
            for device in Device::PREFERENCE_ORDER {
                if device == Device::Cpu || is_available(&device) {
                    info!("Auto-selected {device} device");
                    return Ok(device);
                }
            }
            Ok(Device::Cpu)
        }
    }
}
