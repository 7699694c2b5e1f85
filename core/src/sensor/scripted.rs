//! Deterministic sensor for tests and dry runs.
//!
//! [`ScriptedSensor`] produces reproducible frames and lets a test inject bus
//! failures, latency and saturation through a [`ScriptedHandle`] that stays
//! usable after the sensor itself has been moved into a session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use num_complex::Complex;

use crate::sensor::transport::{
    RawFrame, Register, SensorId, SensorTransport, SweepRequest, TransportError, TransportResult,
};

#[derive(Debug, Default)]
struct ScriptState {
    powered: bool,
    power_cycles: u32,
    registers: HashMap<Register, u32>,
    register_writes: usize,
    measurements: u64,
    pending_failures: u32,
    pending_power_failures: u32,
    latency: Duration,
    saturate: bool,
}

/// In-memory [`SensorTransport`] with scripted behaviour.
#[derive(Debug)]
pub struct ScriptedSensor {
    sensor_id: SensorId,
    state: Arc<Mutex<ScriptState>>,
}

/// Shared control and inspection handle for a [`ScriptedSensor`].
#[derive(Debug, Clone)]
pub struct ScriptedHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSensor {
    pub fn new(sensor_id: SensorId) -> Self {
        Self {
            sensor_id,
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    pub fn handle(&self) -> ScriptedHandle {
        ScriptedHandle {
            state: self.state.clone(),
        }
    }

    fn transfer(&self) -> TransportResult<MutexGuard<'_, ScriptState>> {
        let mut state = lock(&self.state);
        if !state.powered {
            return Err(TransportError::NotPowered);
        }
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(TransportError::Bus("scripted transfer failure".into()));
        }
        Ok(state)
    }
}

impl ScriptedHandle {
    /// Makes the next `count` register or frame transfers fail.
    pub fn fail_next_transfers(&self, count: u32) {
        lock(&self.state).pending_failures = count;
    }

    /// Makes the next `count` power-up attempts fail.
    pub fn fail_next_power_ons(&self, count: u32) {
        lock(&self.state).pending_power_failures = count;
    }

    /// Delays every frame; frames slower than the interrupt timeout time out.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    pub fn set_saturated(&self, saturate: bool) {
        lock(&self.state).saturate = saturate;
    }

    pub fn is_powered(&self) -> bool {
        lock(&self.state).powered
    }

    pub fn power_cycles(&self) -> u32 {
        lock(&self.state).power_cycles
    }

    pub fn measurements(&self) -> u64 {
        lock(&self.state).measurements
    }

    pub fn register(&self, register: Register) -> Option<u32> {
        lock(&self.state).registers.get(&register).copied()
    }

    pub fn register_writes(&self) -> usize {
        lock(&self.state).register_writes
    }
}

/// Sample value of point `index` in sweep `sweep` of frame `frame`.
pub fn scripted_sample(frame: u64, sweep: usize, index: usize) -> Complex<i16> {
    let re = 1_000 + ((index * 37) % 500) as i16 + sweep as i16;
    let im = ((frame % 1_000) as i16) - 500;
    Complex::new(re, im)
}

impl SensorTransport for ScriptedSensor {
    fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    fn power_on(&mut self) -> TransportResult<()> {
        let mut state = lock(&self.state);
        if state.pending_power_failures > 0 {
            state.pending_power_failures -= 1;
            return Err(TransportError::Bus("scripted power-up failure".into()));
        }
        if !state.powered {
            state.powered = true;
            state.power_cycles += 1;
        }
        Ok(())
    }

    fn power_off(&mut self) {
        lock(&self.state).powered = false;
    }

    fn write_register(&mut self, register: Register, value: u32) -> TransportResult<()> {
        let mut state = self.transfer()?;
        state.registers.insert(register, value);
        state.register_writes += 1;
        Ok(())
    }

    fn read_register(&mut self, register: Register) -> TransportResult<u32> {
        let state = self.transfer()?;
        Ok(state.registers.get(&register).copied().unwrap_or(0))
    }

    fn measure(&mut self, request: &SweepRequest, timeout: Duration) -> TransportResult<RawFrame> {
        let latency = {
            let state = self.transfer()?;
            state.latency
        };
        if !latency.is_zero() {
            thread::sleep(latency.min(timeout));
            if latency > timeout {
                return Err(TransportError::InterruptTimeout(timeout));
            }
        }

        let mut state = lock(&self.state);
        state.measurements += 1;
        let frame_number = state.measurements;
        let mut samples = Vec::with_capacity(request.sample_count());
        for sweep in 0..request.sweeps {
            for index in 0..request.points {
                samples.push(scripted_sample(frame_number, sweep, index));
            }
        }
        if state.saturate {
            if let Some(first) = samples.first_mut() {
                first.re = i16::MAX;
            }
        }
        Ok(RawFrame::new(samples, request.points, request.sweeps))
    }
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SweepRequest {
        SweepRequest {
            start_m: 0.2,
            step_m: 0.06,
            points: 4,
            sweeps: 2,
        }
    }

    #[test]
    fn transfers_require_power() {
        let mut sensor = ScriptedSensor::new(1);
        assert_eq!(
            sensor.write_register(Register::PointCount, 4),
            Err(TransportError::NotPowered)
        );
        sensor.power_on().unwrap();
        sensor.write_register(Register::PointCount, 4).unwrap();
        assert_eq!(sensor.handle().register(Register::PointCount), Some(4));
    }

    #[test]
    fn injected_failures_are_consumed_in_order() {
        let mut sensor = ScriptedSensor::new(1);
        sensor.power_on().unwrap();
        sensor.handle().fail_next_transfers(2);
        let timeout = Duration::from_millis(10);
        assert!(sensor.measure(&request(), timeout).is_err());
        assert!(sensor.measure(&request(), timeout).is_err());
        let frame = sensor.measure(&request(), timeout).unwrap();
        assert_eq!(frame.samples.len(), 8);
        assert_eq!(sensor.handle().measurements(), 1);
    }

    #[test]
    fn slow_frames_time_out() {
        let mut sensor = ScriptedSensor::new(1);
        sensor.power_on().unwrap();
        sensor.handle().set_latency(Duration::from_millis(20));
        assert!(matches!(
            sensor.measure(&request(), Duration::from_millis(5)),
            Err(TransportError::InterruptTimeout(_))
        ));
    }
}
