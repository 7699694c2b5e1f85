//! Service configuration objects and their validated setters.
//!
//! A configuration is created for one [`ServiceKind`] and starts out with the
//! defaults of that kind. Every setter validates its input and leaves the
//! previous value untouched when it fails.

pub mod kinds;
pub mod limits;
pub mod options;

use serde::{Deserialize, Serialize};

pub use kinds::{IqOutputFormat, Profile, SamplingMode, ServiceKind};
pub use options::SessionOptions;

use crate::prelude::{ServiceError, ServiceResult};
use crate::sensor::SensorId;
use limits::*;

/// Acquisition parameters for a single service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    kind: ServiceKind,
    sensor_id: SensorId,
    start_m: f32,
    length_m: f32,
    step_size_m: f32,
    sweep_rate_hz: f32,
    sampling_mode: SamplingMode,
    profile: Profile,
    requested_bin_count: u16,
    sweeps_per_frame: u8,
    running_average_factor: f32,
    compensate_phase: bool,
    depth_lowpass_cutoff_ratio: f32,
    iq_output_format: IqOutputFormat,
}

impl ServiceConfiguration {
    /// Creates a configuration populated with the defaults for `kind`.
    pub fn new(kind: ServiceKind) -> Self {
        let (start_m, length_m) = match kind {
            ServiceKind::Sparse => (0.18, 0.36),
            _ => (0.2, 0.5),
        };
        Self {
            kind,
            sensor_id: 1,
            start_m,
            length_m,
            step_size_m: kind.base_step_m(),
            sweep_rate_hz: 100.0,
            sampling_mode: SamplingMode::A,
            profile: Profile::default(),
            requested_bin_count: 8,
            sweeps_per_frame: MAX_SWEEPS_PER_FRAME,
            running_average_factor: 0.7,
            compensate_phase: true,
            depth_lowpass_cutoff_ratio: MAX_CUTOFF_RATIO,
            iq_output_format: IqOutputFormat::Float,
        }
    }

    pub fn envelope() -> Self {
        Self::new(ServiceKind::Envelope)
    }

    pub fn iq() -> Self {
        Self::new(ServiceKind::Iq)
    }

    pub fn power_bins() -> Self {
        Self::new(ServiceKind::PowerBins)
    }

    pub fn sparse() -> Self {
        Self::new(ServiceKind::Sparse)
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    pub fn set_sensor_id(&mut self, sensor_id: SensorId) -> ServiceResult<()> {
        if sensor_id == 0 {
            return Err(ServiceError::OutOfRange(
                "sensor id must be at least 1".into(),
            ));
        }
        self.sensor_id = sensor_id;
        Ok(())
    }

    pub fn start_m(&self) -> f32 {
        self.start_m
    }

    pub fn set_start_m(&mut self, start_m: f32) -> ServiceResult<()> {
        check_bounds("range start", start_m, MIN_START_M, MAX_RANGE_M)?;
        self.start_m = start_m;
        Ok(())
    }

    pub fn length_m(&self) -> f32 {
        self.length_m
    }

    pub fn set_length_m(&mut self, length_m: f32) -> ServiceResult<()> {
        check_finite("range length", length_m)?;
        if length_m <= 0.0 || length_m > MAX_RANGE_M {
            return Err(ServiceError::OutOfRange(format!(
                "range length {} m outside (0, {}]",
                length_m, MAX_RANGE_M
            )));
        }
        self.length_m = length_m;
        Ok(())
    }

    pub fn step_size_m(&self) -> f32 {
        self.step_size_m
    }

    pub fn set_step_size_m(&mut self, step_size_m: f32) -> ServiceResult<()> {
        let base = self.kind.base_step_m();
        check_bounds(
            "step size",
            step_size_m,
            base,
            base * MAX_STEP_FACTOR as f32,
        )?;
        self.step_size_m = step_size_m;
        Ok(())
    }

    pub fn sweep_rate_hz(&self) -> f32 {
        self.sweep_rate_hz
    }

    pub fn set_sweep_rate_hz(&mut self, sweep_rate_hz: f32) -> ServiceResult<()> {
        check_bounds(
            "sweep rate",
            sweep_rate_hz,
            MIN_SWEEP_RATE_HZ,
            MAX_SWEEP_RATE_HZ,
        )?;
        self.sweep_rate_hz = sweep_rate_hz;
        Ok(())
    }

    pub fn sampling_mode(&self) -> SamplingMode {
        self.sampling_mode
    }

    pub fn set_sampling_mode(&mut self, sampling_mode: SamplingMode) -> ServiceResult<()> {
        self.require_kind(
            "sampling mode",
            &[ServiceKind::Iq, ServiceKind::Sparse],
        )?;
        self.sampling_mode = sampling_mode;
        Ok(())
    }

    /// Sets the sampling mode from its raw register encoding.
    pub fn set_sampling_mode_raw(&mut self, value: u32) -> ServiceResult<()> {
        let mode = SamplingMode::try_from(value)?;
        self.set_sampling_mode(mode)
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn set_profile(&mut self, profile: Profile) -> ServiceResult<()> {
        self.profile = profile;
        Ok(())
    }

    /// Sets the profile from its raw register encoding.
    pub fn set_profile_raw(&mut self, value: u32) -> ServiceResult<()> {
        let profile = Profile::try_from(value)?;
        self.set_profile(profile)
    }

    pub fn requested_bin_count(&self) -> u16 {
        self.requested_bin_count
    }

    pub fn set_requested_bin_count(&mut self, bins: u16) -> ServiceResult<()> {
        self.require_kind("requested bin count", &[ServiceKind::PowerBins])?;
        if bins == 0 || bins > MAX_BIN_COUNT {
            return Err(ServiceError::OutOfRange(format!(
                "bin count {} outside [1, {}]",
                bins, MAX_BIN_COUNT
            )));
        }
        self.requested_bin_count = bins;
        Ok(())
    }

    pub fn sweeps_per_frame(&self) -> u8 {
        self.sweeps_per_frame
    }

    pub fn set_sweeps_per_frame(&mut self, sweeps: u8) -> ServiceResult<()> {
        self.require_kind("sweeps per frame", &[ServiceKind::Sparse])?;
        if sweeps == 0 || sweeps > MAX_SWEEPS_PER_FRAME {
            return Err(ServiceError::OutOfRange(format!(
                "sweeps per frame {} outside [1, {}]",
                sweeps, MAX_SWEEPS_PER_FRAME
            )));
        }
        self.sweeps_per_frame = sweeps;
        Ok(())
    }

    pub fn running_average_factor(&self) -> f32 {
        self.running_average_factor
    }

    /// Weight of the history against the newest sweep; 0.0 disables filtering.
    pub fn set_running_average_factor(&mut self, factor: f32) -> ServiceResult<()> {
        self.require_kind(
            "running average factor",
            &[ServiceKind::Envelope, ServiceKind::Iq],
        )?;
        check_bounds("running average factor", factor, 0.0, 1.0)?;
        self.running_average_factor = factor;
        Ok(())
    }

    pub fn compensate_phase(&self) -> bool {
        self.compensate_phase
    }

    pub fn set_compensate_phase(&mut self, compensate_phase: bool) -> ServiceResult<()> {
        self.require_kind("compensate phase", &[ServiceKind::Envelope])?;
        self.compensate_phase = compensate_phase;
        Ok(())
    }

    pub fn depth_lowpass_cutoff_ratio(&self) -> f32 {
        self.depth_lowpass_cutoff_ratio
    }

    /// Cutoff of the depth-domain low-pass filter relative to the sample
    /// frequency; 0.5 turns the filter off.
    pub fn set_depth_lowpass_cutoff_ratio(&mut self, ratio: f32) -> ServiceResult<()> {
        self.require_kind("depth lowpass cutoff ratio", &[ServiceKind::Iq])?;
        check_bounds("depth lowpass cutoff ratio", ratio, 0.0, MAX_CUTOFF_RATIO)?;
        self.depth_lowpass_cutoff_ratio = ratio;
        Ok(())
    }

    pub fn iq_output_format(&self) -> IqOutputFormat {
        self.iq_output_format
    }

    pub fn set_iq_output_format(&mut self, format: IqOutputFormat) -> ServiceResult<()> {
        self.require_kind("iq output format", &[ServiceKind::Iq])?;
        self.iq_output_format = format;
        Ok(())
    }

    /// Re-checks every field, e.g. after deserializing a configuration.
    pub fn validate(&self) -> ServiceResult<()> {
        let mut scratch = ServiceConfiguration::new(self.kind);
        scratch.set_sensor_id(self.sensor_id)?;
        scratch.set_start_m(self.start_m)?;
        scratch.set_length_m(self.length_m)?;
        scratch.set_step_size_m(self.step_size_m)?;
        scratch.set_sweep_rate_hz(self.sweep_rate_hz)?;
        check_bounds(
            "running average factor",
            self.running_average_factor,
            0.0,
            1.0,
        )?;
        check_bounds(
            "depth lowpass cutoff ratio",
            self.depth_lowpass_cutoff_ratio,
            0.0,
            MAX_CUTOFF_RATIO,
        )?;
        if self.requested_bin_count == 0 || self.requested_bin_count > MAX_BIN_COUNT {
            return Err(ServiceError::OutOfRange(format!(
                "bin count {} outside [1, {}]",
                self.requested_bin_count, MAX_BIN_COUNT
            )));
        }
        if self.sweeps_per_frame == 0 || self.sweeps_per_frame > MAX_SWEEPS_PER_FRAME {
            return Err(ServiceError::OutOfRange(format!(
                "sweeps per frame {} outside [1, {}]",
                self.sweeps_per_frame, MAX_SWEEPS_PER_FRAME
            )));
        }
        Ok(())
    }

    fn require_kind(&self, field: &str, kinds: &[ServiceKind]) -> ServiceResult<()> {
        if kinds.contains(&self.kind) {
            Ok(())
        } else {
            Err(ServiceError::InvalidArgument(format!(
                "{} does not apply to the {} service",
                field, self.kind
            )))
        }
    }
}

fn check_finite(field: &str, value: f32) -> ServiceResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ServiceError::InvalidArgument(format!(
            "{} must be a finite number",
            field
        )))
    }
}

fn check_bounds(field: &str, value: f32, min: f32, max: f32) -> ServiceResult<()> {
    check_finite(field, value)?;
    if value < min || value > max {
        return Err(ServiceError::OutOfRange(format!(
            "{} {} outside [{}, {}]",
            field, value, min, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_service_kind() {
        let sparse = ServiceConfiguration::sparse();
        assert_eq!(sparse.step_size_m(), SPARSE_BASE_STEP_M);
        assert_eq!(sparse.sweeps_per_frame(), MAX_SWEEPS_PER_FRAME);

        let envelope = ServiceConfiguration::envelope();
        assert_eq!(envelope.step_size_m(), BASE_STEP_M);
        assert_eq!(envelope.profile(), Profile::MaximizeDepthResolution);
        assert!(envelope.compensate_phase());
    }

    #[test]
    fn out_of_range_setters_keep_the_previous_value() {
        let mut config = ServiceConfiguration::sparse();
        config.set_sweeps_per_frame(8).unwrap();
        assert!(matches!(
            config.set_sweeps_per_frame(17),
            Err(ServiceError::OutOfRange(_))
        ));
        assert_eq!(config.sweeps_per_frame(), 8);

        config.set_sweep_rate_hz(250.0).unwrap();
        assert!(matches!(
            config.set_sweep_rate_hz(20_000.0),
            Err(ServiceError::OutOfRange(_))
        ));
        assert_eq!(config.sweep_rate_hz(), 250.0);

        assert!(matches!(
            config.set_start_m(-1.0),
            Err(ServiceError::OutOfRange(_))
        ));
        assert_eq!(config.start_m(), 0.18);
    }

    #[test]
    fn non_finite_values_are_invalid_arguments() {
        let mut config = ServiceConfiguration::envelope();
        assert!(matches!(
            config.set_length_m(f32::NAN),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert_eq!(config.length_m(), 0.5);
    }

    #[test]
    fn raw_enum_setters_reject_undefined_values() {
        let mut config = ServiceConfiguration::iq();
        config.set_sampling_mode_raw(1).unwrap();
        assert_eq!(config.sampling_mode(), SamplingMode::B);
        assert!(matches!(
            config.set_sampling_mode_raw(2),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert_eq!(config.sampling_mode(), SamplingMode::B);

        assert!(matches!(
            config.set_profile_raw(9),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert_eq!(config.profile(), Profile::MaximizeDepthResolution);
    }

    #[test]
    fn fields_of_other_services_are_rejected() {
        let mut config = ServiceConfiguration::envelope();
        assert!(matches!(
            config.set_sweeps_per_frame(4),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert!(matches!(
            config.set_requested_bin_count(4),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert!(config.set_running_average_factor(0.2).is_ok());
    }

    #[test]
    fn step_size_is_bounded_by_the_step_factor() {
        let mut config = ServiceConfiguration::iq();
        assert!(config.set_step_size_m(BASE_STEP_M * 4.0).is_ok());
        assert!(matches!(
            config.set_step_size_m(BASE_STEP_M * 0.5),
            Err(ServiceError::OutOfRange(_))
        ));
        assert!(matches!(
            config.set_step_size_m(BASE_STEP_M * 17.0),
            Err(ServiceError::OutOfRange(_))
        ));
    }

    #[test]
    fn validate_catches_values_injected_through_serde() {
        let config = ServiceConfiguration::power_bins();
        let mut value = serde_json::to_value(&config).unwrap();
        value["requested_bin_count"] = serde_json::json!(64);
        let decoded: ServiceConfiguration = serde_json::from_value(value).unwrap();
        assert!(matches!(
            decoded.validate(),
            Err(ServiceError::OutOfRange(_))
        ));
        assert!(config.validate().is_ok());
    }
}
