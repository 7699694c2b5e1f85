use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::configuration::limits::*;
use crate::configuration::{SamplingMode, ServiceConfiguration, ServiceKind};
use crate::prelude::{ServiceError, ServiceResult};
use crate::sensor::{Register, SweepRequest};

/// What an activated configuration actually produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub kind: ServiceKind,
    pub actual_start_m: f32,
    pub actual_length_m: f32,
    pub actual_step_size_m: f32,
    /// Number of values in every result payload.
    pub data_length: usize,
    pub stitch_count: u16,
    /// Only reported by the power bins service.
    pub actual_bin_count: Option<u16>,
    pub actual_sweep_rate_hz: f32,
    pub points_per_sweep: usize,
    pub sweeps_per_frame: usize,
    step_factor: u32,
}

impl Metadata {
    /// Snaps the requested geometry onto the sensor grid and checks that the
    /// result fits the sensor.
    pub fn derive(config: &ServiceConfiguration) -> ServiceResult<Self> {
        config.validate()?;
        let kind = config.kind();
        let base = kind.base_step_m();

        let step_factor = ((config.step_size_m() / base).round() as u32).clamp(1, MAX_STEP_FACTOR);
        let actual_step_size_m = step_factor as f32 * base;
        let actual_start_m = (config.start_m() / actual_step_size_m).round() * actual_step_size_m;
        let points_per_sweep =
            ((config.length_m() / actual_step_size_m - GRID_EPSILON).ceil() as usize).max(1);
        let actual_length_m = points_per_sweep as f32 * actual_step_size_m;

        if actual_start_m + actual_length_m > MAX_RANGE_M + GRID_EPSILON {
            return Err(ServiceError::Configuration(format!(
                "range {:.3}..{:.3} m exceeds the sensor maximum of {} m",
                actual_start_m,
                actual_start_m + actual_length_m,
                MAX_RANGE_M
            )));
        }
        if config.profile() == crate::configuration::Profile::DirectLeakage
            && actual_start_m > DIRECT_LEAKAGE_MAX_START_M
        {
            return Err(ServiceError::Configuration(format!(
                "direct leakage profile requires a start within {} m, got {:.3} m",
                DIRECT_LEAKAGE_MAX_START_M, actual_start_m
            )));
        }

        let stitch_count = if kind.is_stitched() {
            let segments =
                ((actual_length_m / SUBSWEEP_LENGTH_M - GRID_EPSILON).ceil() as u16).max(1);
            segments - 1
        } else {
            0
        };

        let sweeps_per_frame = match kind {
            ServiceKind::Sparse => usize::from(config.sweeps_per_frame()),
            _ => 1,
        };

        let (data_length, actual_bin_count) = match kind {
            ServiceKind::Envelope | ServiceKind::Iq => (points_per_sweep, None),
            ServiceKind::PowerBins => {
                let bins = usize::from(config.requested_bin_count()).min(points_per_sweep);
                (bins, Some(bins as u16))
            }
            ServiceKind::Sparse => (points_per_sweep * sweeps_per_frame, None),
        };
        if data_length > MAX_DATA_LENGTH {
            return Err(ServiceError::Configuration(format!(
                "{} values per result exceed the limit of {}; shorten the range or raise the step size",
                data_length, MAX_DATA_LENGTH
            )));
        }

        let actual_sweep_rate_hz = match kind {
            ServiceKind::Sparse => {
                let mut max_rate = SPARSE_POINT_RATE_HZ / points_per_sweep as f32;
                if config.sampling_mode() == SamplingMode::B {
                    max_rate /= 2.0;
                }
                config.sweep_rate_hz().min(max_rate)
            }
            _ => config.sweep_rate_hz(),
        };

        Ok(Self {
            kind,
            actual_start_m,
            actual_length_m,
            actual_step_size_m,
            data_length,
            stitch_count,
            actual_bin_count,
            actual_sweep_rate_hz,
            points_per_sweep,
            sweeps_per_frame,
            step_factor,
        })
    }

    pub fn actual_end_m(&self) -> f32 {
        self.actual_start_m + self.actual_length_m
    }

    pub fn sweep_request(&self) -> SweepRequest {
        SweepRequest {
            start_m: self.actual_start_m,
            step_m: self.actual_step_size_m,
            points: self.points_per_sweep,
            sweeps: self.sweeps_per_frame,
        }
    }

    /// Time between two results when streaming.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f32(self.sweeps_per_frame as f32 / self.actual_sweep_rate_hz)
    }

    /// Register values that program this geometry into the sensor.
    pub fn register_setup(&self, config: &ServiceConfiguration) -> Vec<(Register, u32)> {
        let base = self.kind.base_step_m();
        let start_index = (self.actual_start_m / base).round() as i32;
        Register::SWEEP_SETUP
            .iter()
            .map(|&register| {
                let value = match register {
                    Register::SweepStart => start_index as u32,
                    Register::PointCount => self.points_per_sweep as u32,
                    Register::StepFactor => self.step_factor,
                    Register::SamplingMode => config.sampling_mode().register_value(),
                    Register::Profile => config.profile().register_value(),
                    Register::SweepsPerFrame => self.sweeps_per_frame as u32,
                    Register::SweepRate => (self.actual_sweep_rate_hz * 1000.0).round() as u32,
                    Register::Scratch => 0,
                };
                (register, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Profile;

    #[test]
    fn envelope_defaults_snap_to_the_base_grid() {
        let metadata = Metadata::derive(&ServiceConfiguration::envelope()).unwrap();
        assert_eq!(metadata.points_per_sweep, 1034);
        assert_eq!(metadata.data_length, 1034);
        assert_eq!(metadata.stitch_count, 8);
        assert!((metadata.actual_start_m - 0.2).abs() < BASE_STEP_M);
        assert!(metadata.actual_length_m >= 0.5);
        assert_eq!(metadata.actual_bin_count, None);
    }

    #[test]
    fn sparse_data_length_covers_every_sweep_of_the_frame() {
        let mut config = ServiceConfiguration::sparse();
        config.set_sweeps_per_frame(8).unwrap();
        let metadata = Metadata::derive(&config).unwrap();
        assert_eq!(metadata.points_per_sweep, 6);
        assert_eq!(metadata.data_length, 48);
        assert_eq!(metadata.stitch_count, 0);
        assert!((metadata.actual_start_m - 0.18).abs() < 1e-5);
    }

    #[test]
    fn sparse_sweep_rate_is_capped_by_sampling_mode() {
        let mut config = ServiceConfiguration::sparse();
        config.set_sweep_rate_hz(10_000.0).unwrap();
        let mode_a = Metadata::derive(&config).unwrap();
        assert!((mode_a.actual_sweep_rate_hz - 10_000.0).abs() < 1e-3);

        config.set_sampling_mode(SamplingMode::B).unwrap();
        let mode_b = Metadata::derive(&config).unwrap();
        assert!((mode_b.actual_sweep_rate_hz - 5_000.0).abs() < 1e-3);
    }

    #[test]
    fn power_bins_never_exceed_available_points() {
        let mut config = ServiceConfiguration::power_bins();
        config.set_requested_bin_count(32).unwrap();
        config.set_length_m(0.005).unwrap();
        let metadata = Metadata::derive(&config).unwrap();
        assert_eq!(metadata.points_per_sweep, 11);
        assert_eq!(metadata.actual_bin_count, Some(11));
        assert_eq!(metadata.data_length, 11);
    }

    #[test]
    fn range_beyond_the_sensor_is_a_configuration_error() {
        let mut config = ServiceConfiguration::sparse();
        config.set_start_m(6.0).unwrap();
        config.set_length_m(1.5).unwrap();
        assert!(matches!(
            Metadata::derive(&config),
            Err(ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn oversized_results_are_rejected() {
        let mut config = ServiceConfiguration::envelope();
        config.set_start_m(0.0).unwrap();
        config.set_length_m(5.0).unwrap();
        assert!(matches!(
            Metadata::derive(&config),
            Err(ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn direct_leakage_needs_a_close_start() {
        let mut config = ServiceConfiguration::envelope();
        config.set_profile(Profile::DirectLeakage).unwrap();
        assert!(Metadata::derive(&config).is_err());
        config.set_start_m(0.0).unwrap();
        config.set_length_m(0.06).unwrap();
        assert!(Metadata::derive(&config).is_ok());
    }

    #[test]
    fn every_valid_configuration_has_consistent_lengths() {
        for kind in ServiceKind::ALL {
            for &length in &[0.05_f32, 0.3, 1.0, 2.0] {
                let mut config = ServiceConfiguration::new(kind);
                config.set_length_m(length).unwrap();
                if let Ok(metadata) = Metadata::derive(&config) {
                    let expected = match kind {
                        ServiceKind::PowerBins => {
                            usize::from(metadata.actual_bin_count.unwrap_or_default())
                        }
                        _ => metadata.points_per_sweep * metadata.sweeps_per_frame,
                    };
                    assert_eq!(metadata.data_length, expected);
                    assert_eq!(metadata.sweep_request().sample_count(),
                        metadata.points_per_sweep * metadata.sweeps_per_frame);
                    assert!(metadata.actual_length_m + 1e-6 >= length);
                }
            }
        }
    }

    #[test]
    fn register_setup_encodes_negative_starts() {
        let mut config = ServiceConfiguration::iq();
        config.set_start_m(-0.1).unwrap();
        config.set_length_m(0.2).unwrap();
        let metadata = Metadata::derive(&config).unwrap();
        let setup = metadata.register_setup(&config);
        let (_, start) = setup
            .iter()
            .find(|(register, _)| *register == Register::SweepStart)
            .unwrap();
        assert!((*start as i32) < 0);
        assert_eq!(setup.len(), Register::SWEEP_SETUP.len());
    }
}
