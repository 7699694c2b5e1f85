use std::collections::HashMap;
use std::time::Duration;

use anyhow::bail;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rsscore::sensor::{
    RawFrame, Register, SensorId, SensorTransport, SweepRequest, TransportError, TransportResult,
};
use rsscore::num_complex::{Complex, Complex32};
use serde::{Deserialize, Serialize};

use crate::generator::template::{carrier_phase, pulse_envelope};

/// A point target seen by the synthetic sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflector {
    pub distance_m: f32,
    /// Peak amplitude in ADC counts.
    pub amplitude: f32,
    /// Distance change per frame, for slowly moving targets.
    #[serde(default)]
    pub drift_m: f32,
}

/// Scene rendered by [`SyntheticSensor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub reflectors: Vec<Reflector>,
    /// Uniform noise amplitude in ADC counts.
    pub noise: f32,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            reflectors: vec![
                Reflector {
                    distance_m: 0.35,
                    amplitude: 4_000.0,
                    drift_m: 0.0,
                },
                Reflector {
                    distance_m: 0.55,
                    amplitude: 1_500.0,
                    drift_m: 0.0,
                },
            ],
            noise: 40.0,
            seed: 0,
        }
    }
}

impl SceneConfig {
    /// Rejects values the renderer cannot sample from.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.noise.is_finite() || self.noise < 0.0 {
            bail!("scene noise must be a finite, non-negative amplitude, got {}", self.noise);
        }
        for (index, reflector) in self.reflectors.iter().enumerate() {
            let fields = [
                ("distance_m", reflector.distance_m),
                ("amplitude", reflector.amplitude),
                ("drift_m", reflector.drift_m),
            ];
            for (name, value) in fields {
                if !value.is_finite() {
                    bail!("reflector {} has a non-finite {}: {}", index, name, value);
                }
            }
        }
        Ok(())
    }
}

/// [`SensorTransport`] that renders a [`SceneConfig`] instead of reading hardware.
pub struct SyntheticSensor {
    sensor_id: SensorId,
    scene: SceneConfig,
    rng: StdRng,
    powered: bool,
    registers: HashMap<Register, u32>,
    frames: u64,
}

impl SyntheticSensor {
    pub fn new(sensor_id: SensorId, scene: SceneConfig) -> Self {
        Self {
            sensor_id,
            rng: StdRng::seed_from_u64(scene.seed),
            scene,
            powered: false,
            registers: HashMap::new(),
            frames: 0,
        }
    }

    fn ensure_powered(&self) -> TransportResult<()> {
        if self.powered {
            Ok(())
        } else {
            Err(TransportError::NotPowered)
        }
    }

    fn render(&mut self, distance_m: f32) -> Complex<i16> {
        let frame = self.frames as f32;
        let mut value = Complex32::new(0.0, 0.0);
        for reflector in &self.scene.reflectors {
            let target = reflector.distance_m + reflector.drift_m * frame;
            let amplitude = reflector.amplitude * pulse_envelope(distance_m - target);
            value += Complex32::from_polar(amplitude, carrier_phase(target));
        }
        if self.scene.noise > 0.0 {
            let noise = self.scene.noise;
            value += Complex32::new(
                self.rng.gen_range(-noise..noise),
                self.rng.gen_range(-noise..noise),
            );
        }
        Complex::new(saturate(value.re), saturate(value.im))
    }
}

fn saturate(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl SensorTransport for SyntheticSensor {
    fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    fn power_on(&mut self) -> TransportResult<()> {
        self.powered = true;
        Ok(())
    }

    fn power_off(&mut self) {
        self.powered = false;
    }

    fn write_register(&mut self, register: Register, value: u32) -> TransportResult<()> {
        self.ensure_powered()?;
        self.registers.insert(register, value);
        Ok(())
    }

    fn read_register(&mut self, register: Register) -> TransportResult<u32> {
        self.ensure_powered()?;
        Ok(self.registers.get(&register).copied().unwrap_or_default())
    }

    fn measure(&mut self, request: &SweepRequest, _timeout: Duration) -> TransportResult<RawFrame> {
        self.ensure_powered()?;
        self.frames += 1;
        let mut samples = Vec::with_capacity(request.sample_count());
        for _ in 0..request.sweeps {
            for index in 0..request.points {
                samples.push(self.render(request.distance_m(index)));
            }
        }
        Ok(RawFrame::new(samples, request.points, request.sweeps))
    }
}
