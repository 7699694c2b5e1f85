use anyhow::Context;
use clap::ValueEnum;
use rsscore::configuration::{IqOutputFormat, Profile, SamplingMode};
use rsscore::{ServiceConfiguration, ServiceKind, SessionOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::generator::SceneConfig;

/// How results are pulled out of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Synchronous single measurements.
    Once,
    /// Streaming with blocking `get_next`.
    Poll,
    /// Streaming into a subscribed handler.
    Callback,
}

/// Service fields overriding the defaults of the chosen service kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOverrides {
    pub start_m: Option<f32>,
    pub length_m: Option<f32>,
    pub step_size_m: Option<f32>,
    pub sweep_rate_hz: Option<f32>,
    pub sweeps_per_frame: Option<u8>,
    pub requested_bin_count: Option<u16>,
    pub profile: Option<Profile>,
    pub sampling_mode: Option<SamplingMode>,
    pub running_average_factor: Option<f32>,
    pub compensate_phase: Option<bool>,
    pub depth_lowpass_cutoff_ratio: Option<f32>,
    pub iq_output_format: Option<IqOutputFormat>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub service: ServiceKind,
    pub sensor_id: u32,
    #[serde(flatten)]
    pub overrides: ServiceOverrides,
    pub options: SessionOptions,
    pub scene: SceneConfig,
    pub cycles: usize,
    pub mode: DeliveryMode,
    /// Run the register self test before opening the session.
    pub diagnostics: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            service: ServiceKind::Envelope,
            sensor_id: 1,
            overrides: ServiceOverrides::default(),
            options: SessionOptions::default(),
            scene: SceneConfig::default(),
            cycles: 5,
            mode: DeliveryMode::Poll,
            diagnostics: false,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .scene
            .validate()
            .with_context(|| format!("validating scene in {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_service(service: ServiceKind) -> Self {
        Self {
            service,
            ..Default::default()
        }
    }

    /// Builds the service configuration, validating every override.
    pub fn service_configuration(&self) -> anyhow::Result<ServiceConfiguration> {
        let mut config = ServiceConfiguration::new(self.service);
        let o = &self.overrides;
        config
            .set_sensor_id(self.sensor_id)
            .context("applying sensor_id")?;
        if let Some(value) = o.start_m {
            config.set_start_m(value).context("applying start_m")?;
        }
        if let Some(value) = o.length_m {
            config.set_length_m(value).context("applying length_m")?;
        }
        if let Some(value) = o.step_size_m {
            config.set_step_size_m(value).context("applying step_size_m")?;
        }
        if let Some(value) = o.sweep_rate_hz {
            config
                .set_sweep_rate_hz(value)
                .context("applying sweep_rate_hz")?;
        }
        if let Some(value) = o.sweeps_per_frame {
            config
                .set_sweeps_per_frame(value)
                .context("applying sweeps_per_frame")?;
        }
        if let Some(value) = o.requested_bin_count {
            config
                .set_requested_bin_count(value)
                .context("applying requested_bin_count")?;
        }
        if let Some(value) = o.profile {
            config.set_profile(value).context("applying profile")?;
        }
        if let Some(value) = o.sampling_mode {
            config
                .set_sampling_mode(value)
                .context("applying sampling_mode")?;
        }
        if let Some(value) = o.running_average_factor {
            config
                .set_running_average_factor(value)
                .context("applying running_average_factor")?;
        }
        if let Some(value) = o.compensate_phase {
            config
                .set_compensate_phase(value)
                .context("applying compensate_phase")?;
        }
        if let Some(value) = o.depth_lowpass_cutoff_ratio {
            config
                .set_depth_lowpass_cutoff_ratio(value)
                .context("applying depth_lowpass_cutoff_ratio")?;
        }
        if let Some(value) = o.iq_output_format {
            config
                .set_iq_output_format(value)
                .context("applying iq_output_format")?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn overrides_reach_the_service_configuration() {
        let mut cfg = WorkflowConfig::from_service(ServiceKind::Sparse);
        cfg.overrides.sweeps_per_frame = Some(8);
        cfg.overrides.sweep_rate_hz = Some(100.0);
        let config = cfg.service_configuration().unwrap();
        assert_eq!(config.sweeps_per_frame(), 8);
        assert_eq!(config.sweep_rate_hz(), 100.0);
    }

    #[test]
    fn iq_filter_and_output_format_come_from_yaml() {
        let cfg: WorkflowConfig = serde_yaml::from_str(
            "service: iq\ndepth_lowpass_cutoff_ratio: 0.2\niq_output_format: int16\n",
        )
        .unwrap();
        let config = cfg.service_configuration().unwrap();
        assert_eq!(config.depth_lowpass_cutoff_ratio(), 0.2);
        assert_eq!(config.iq_output_format(), IqOutputFormat::Int16);

        let cfg: WorkflowConfig =
            serde_yaml::from_str("service: envelope\ncompensate_phase: false\n").unwrap();
        assert!(!cfg.service_configuration().unwrap().compensate_phase());
    }

    #[test]
    fn inapplicable_override_is_an_error() {
        let mut cfg = WorkflowConfig::from_service(ServiceKind::Envelope);
        cfg.overrides.requested_bin_count = Some(4);
        let err = cfg.service_configuration().unwrap_err();
        assert!(format!("{:#}", err).contains("requested_bin_count"));
    }

    #[test]
    fn shipped_workflows_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("workflows");
        for name in ["sparse_presence.yaml", "envelope_poll.yaml"] {
            let cfg = WorkflowConfig::load(dir.join(name)).unwrap();
            cfg.service_configuration().unwrap();
            cfg.options.validate().unwrap();
        }
    }

    #[test]
    fn config_load_rejects_infinite_noise() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"service: envelope\nscene:\n  noise: .inf\n")
            .unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("scene noise"));
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"service: power_bins\nrequested_bin_count: 6\nmode: callback\ncycles: 3\n\
              options:\n  queue_capacity: 4\n\
              scene:\n  noise: 0.0\n  reflectors:\n    - distance_m: 0.4\n      amplitude: 900.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();

        assert_eq!(cfg.service, ServiceKind::PowerBins);
        assert_eq!(cfg.mode, DeliveryMode::Callback);
        assert_eq!(cfg.options.queue_capacity, 4);
        assert_eq!(cfg.options.get_next_timeout_ms, 1_000);
        assert_eq!(cfg.scene.reflectors.len(), 1);
        assert_eq!(
            cfg.service_configuration().unwrap().requested_bin_count(),
            6
        );
    }
}
