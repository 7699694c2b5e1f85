use crate::generator::SyntheticSensor;
use crate::workflow::config::{DeliveryMode, WorkflowConfig};
use anyhow::{bail, Context};
use log::info;
use rsscore::telemetry::MetricsSnapshot;
use rsscore::{Measurement, MeasurementSummary, Metadata, RadarSystem, Session};
use std::sync::mpsc;

#[derive(Debug)]
pub struct WorkflowResult {
    pub metadata: Metadata,
    pub summaries: Vec<MeasurementSummary>,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Runs the workflow against a synthetic sensor, reporting every result to `observer`.
    pub fn execute<F>(&self, mut observer: F) -> anyhow::Result<WorkflowResult>
    where
        F: FnMut(&Metadata, &MeasurementSummary),
    {
        let service_config = self.config.service_configuration()?;
        self.config
            .scene
            .validate()
            .context("validating synthetic scene")?;
        let system = RadarSystem::new();
        system
            .register(Box::new(SyntheticSensor::new(
                self.config.sensor_id,
                self.config.scene.clone(),
            )))
            .context("registering synthetic sensor")?;
        if self.config.diagnostics {
            system
                .diagnostic_test(self.config.sensor_id)
                .context("running sensor diagnostics")?;
        }

        let session = Session::open(&system, service_config, self.config.options.clone())
            .context("opening session")?;
        let metadata = session.activate().context("activating session")?;
        info!(
            "{} service: {} values per result at {:.1} Hz",
            session.kind(),
            metadata.data_length,
            metadata.actual_sweep_rate_hz
        );

        let cycles = self.config.cycles;
        let mut summaries = Vec::with_capacity(cycles);
        let mut record = |measurement: &Measurement| {
            let summary = measurement.summary();
            observer(&metadata, &summary);
            summaries.push(summary);
        };

        match self.config.mode {
            DeliveryMode::Once => {
                for _ in 0..cycles {
                    let measurement = session.execute_once().context("executing measurement")?;
                    record(&measurement);
                }
            }
            DeliveryMode::Poll => {
                session.start().context("starting session")?;
                for _ in 0..cycles {
                    let measurement = session.get_next().context("polling for a result")?;
                    record(&measurement);
                }
            }
            DeliveryMode::Callback => {
                let (tx, rx) = mpsc::channel();
                session
                    .subscribe(move |measurement: &Measurement| {
                        let _ = tx.send(measurement.clone());
                    })
                    .context("subscribing handler")?;
                session.start().context("starting session")?;
                let timeout = self.config.options.get_next_timeout();
                for received in 0..cycles {
                    match rx.recv_timeout(timeout) {
                        Ok(measurement) => record(&measurement),
                        Err(err) => bail!(
                            "handler received {} of {} results: {}",
                            received,
                            cycles,
                            err
                        ),
                    }
                }
            }
        }

        session.destroy();
        Ok(WorkflowResult {
            metadata,
            summaries,
            metrics: session.metrics(),
        })
    }
}
