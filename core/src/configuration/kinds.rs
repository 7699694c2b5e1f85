use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::configuration::limits::{BASE_STEP_M, SPARSE_BASE_STEP_M};
use crate::prelude::ServiceError;

/// Measurement output format produced by a service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Envelope,
    Iq,
    PowerBins,
    Sparse,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Envelope,
        ServiceKind::Iq,
        ServiceKind::PowerBins,
        ServiceKind::Sparse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Envelope => "envelope",
            ServiceKind::Iq => "iq",
            ServiceKind::PowerBins => "power_bins",
            ServiceKind::Sparse => "sparse",
        }
    }

    /// Native point spacing of the service before any step factor is applied.
    pub fn base_step_m(self) -> f32 {
        match self {
            ServiceKind::Sparse => SPARSE_BASE_STEP_M,
            _ => BASE_STEP_M,
        }
    }

    /// Whether sweeps are stitched from several hardware sub-sweeps.
    pub fn is_stitched(self) -> bool {
        !matches!(self, ServiceKind::Sparse)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceKind {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "envelope" => Ok(ServiceKind::Envelope),
            "iq" => Ok(ServiceKind::Iq),
            "power_bins" | "powerbins" => Ok(ServiceKind::PowerBins),
            "sparse" => Ok(ServiceKind::Sparse),
            other => Err(ServiceError::InvalidArgument(format!(
                "unknown service kind '{}'",
                other
            ))),
        }
    }
}

/// Predefined RX/TX setups trading depth resolution against SNR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    MaximizeDepthResolution,
    MaximizeSnr,
    /// Experimental: observes the direct TX/RX coupling close to the sensor.
    DirectLeakage,
}

impl Profile {
    pub fn register_value(self) -> u32 {
        match self {
            Profile::MaximizeDepthResolution => 0,
            Profile::MaximizeSnr => 1,
            Profile::DirectLeakage => 2,
        }
    }
}

impl TryFrom<u32> for Profile {
    type Error = ServiceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Profile::MaximizeDepthResolution),
            1 => Ok(Profile::MaximizeSnr),
            2 => Ok(Profile::DirectLeakage),
            other => Err(ServiceError::InvalidArgument(format!(
                "profile value {} is not defined",
                other
            ))),
        }
    }
}

impl FromStr for Profile {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "maximize_depth_resolution" | "depth_resolution" | "default" => {
                Ok(Profile::MaximizeDepthResolution)
            }
            "maximize_snr" | "snr" => Ok(Profile::MaximizeSnr),
            "direct_leakage" | "leakage" => Ok(Profile::DirectLeakage),
            other => Err(ServiceError::InvalidArgument(format!(
                "unknown profile '{}'",
                other
            ))),
        }
    }
}

/// How point averages are taken: in hardware (A) or by a measurement loop (B).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SamplingMode {
    #[default]
    A,
    B,
}

impl SamplingMode {
    pub fn register_value(self) -> u32 {
        match self {
            SamplingMode::A => 0,
            SamplingMode::B => 1,
        }
    }
}

impl TryFrom<u32> for SamplingMode {
    type Error = ServiceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SamplingMode::A),
            1 => Ok(SamplingMode::B),
            other => Err(ServiceError::InvalidArgument(format!(
                "sampling mode value {} is not defined",
                other
            ))),
        }
    }
}

impl FromStr for SamplingMode {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "a" | "A" => Ok(SamplingMode::A),
            "b" | "B" => Ok(SamplingMode::B),
            other => Err(ServiceError::InvalidArgument(format!(
                "unknown sampling mode '{}'",
                other
            ))),
        }
    }
}

/// Sample representation of IQ results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IqOutputFormat {
    #[default]
    Float,
    Int16,
}
