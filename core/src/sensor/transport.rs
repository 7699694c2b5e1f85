//! Byte-level access to the radar front end.
//!
//! The session never talks to the bus directly; it programs control
//! registers and requests frames through [`SensorTransport`]. Real hardware
//! integrations and the in-crate [`ScriptedSensor`](super::ScriptedSensor)
//! both implement this trait.

use std::time::Duration;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

pub type SensorId = u32;

/// Failure reported by a transport implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("bus transfer failed: {0}")]
    Bus(String),
    #[error("sensor interrupt not raised within {0:?}")]
    InterruptTimeout(Duration),
    #[error("sensor is not powered")]
    NotPowered,
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Control registers programmed before acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    /// Start point index on the base step grid (two's complement).
    SweepStart,
    PointCount,
    StepFactor,
    SamplingMode,
    Profile,
    SweepsPerFrame,
    /// Sweep rate in millihertz.
    SweepRate,
    /// Read/write scratch register used by the diagnostic self test.
    Scratch,
}

impl Register {
    pub const SWEEP_SETUP: [Register; 7] = [
        Register::SweepStart,
        Register::PointCount,
        Register::StepFactor,
        Register::SamplingMode,
        Register::Profile,
        Register::SweepsPerFrame,
        Register::SweepRate,
    ];

    pub fn address(self) -> u16 {
        match self {
            Register::SweepStart => 0x10,
            Register::PointCount => 0x11,
            Register::StepFactor => 0x12,
            Register::SamplingMode => 0x13,
            Register::Profile => 0x14,
            Register::SweepsPerFrame => 0x15,
            Register::SweepRate => 0x16,
            Register::Scratch => 0x7f,
        }
    }
}

/// Geometry of one frame as requested from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRequest {
    pub start_m: f32,
    pub step_m: f32,
    pub points: usize,
    pub sweeps: usize,
}

impl SweepRequest {
    pub fn sample_count(&self) -> usize {
        self.points * self.sweeps
    }

    /// Distance of point `index` within a sweep.
    pub fn distance_m(&self, index: usize) -> f32 {
        self.start_m + index as f32 * self.step_m
    }
}

/// Raw complex samples of one frame, sweep-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub samples: Vec<Complex<i16>>,
    pub points: usize,
    pub sweeps: usize,
}

impl RawFrame {
    pub fn new(samples: Vec<Complex<i16>>, points: usize, sweeps: usize) -> Self {
        Self {
            samples,
            points,
            sweeps,
        }
    }

    pub fn sweep(&self, index: usize) -> &[Complex<i16>] {
        let begin = index * self.points;
        &self.samples[begin..begin + self.points]
    }

    /// True if any component sits on the ADC rail.
    pub fn is_saturated(&self) -> bool {
        self.samples.iter().any(|sample| {
            sample.re == i16::MAX
                || sample.re == i16::MIN
                || sample.im == i16::MAX
                || sample.im == i16::MIN
        })
    }
}

/// Physical link to one radar sensor.
pub trait SensorTransport: Send {
    fn sensor_id(&self) -> SensorId;

    fn power_on(&mut self) -> TransportResult<()>;

    fn power_off(&mut self);

    fn write_register(&mut self, register: Register, value: u32) -> TransportResult<()>;

    fn read_register(&mut self, register: Register) -> TransportResult<u32>;

    /// Triggers one frame and waits up to `timeout` for the sensor interrupt.
    fn measure(&mut self, request: &SweepRequest, timeout: Duration) -> TransportResult<RawFrame>;
}

impl<T: SensorTransport + ?Sized> SensorTransport for Box<T> {
    fn sensor_id(&self) -> SensorId {
        (**self).sensor_id()
    }

    fn power_on(&mut self) -> TransportResult<()> {
        (**self).power_on()
    }

    fn power_off(&mut self) {
        (**self).power_off()
    }

    fn write_register(&mut self, register: Register, value: u32) -> TransportResult<()> {
        (**self).write_register(register, value)
    }

    fn read_register(&mut self, register: Register) -> TransportResult<u32> {
        (**self).read_register(register)
    }

    fn measure(&mut self, request: &SweepRequest, timeout: Duration) -> TransportResult<RawFrame> {
        (**self).measure(request, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation_is_detected_on_either_component() {
        let clean = RawFrame::new(vec![Complex::new(100, -100); 4], 4, 1);
        assert!(!clean.is_saturated());

        let mut samples = vec![Complex::new(0, 0); 4];
        samples[2].im = i16::MIN;
        assert!(RawFrame::new(samples, 2, 2).is_saturated());
    }

    #[test]
    fn sweeps_are_sliced_sweep_major() {
        let samples = (0..6).map(|i| Complex::new(i as i16, 0)).collect();
        let frame = RawFrame::new(samples, 3, 2);
        assert_eq!(frame.sweep(1)[0].re, 3);
    }

    #[test]
    fn register_addresses_are_unique() {
        let mut addresses: Vec<u16> = Register::SWEEP_SETUP.iter().map(|r| r.address()).collect();
        addresses.push(Register::Scratch.address());
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), Register::SWEEP_SETUP.len() + 1);
    }
}
