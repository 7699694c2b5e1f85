//! Measurement cycles and the background thread that repeats them.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::configuration::{ServiceConfiguration, ServiceKind};
use crate::prelude::{ServiceError, ServiceProcessor, ServiceResult};
use crate::processing::processor_for;
use crate::sensor::{SensorLink, SweepRequest};
use crate::service::{Measurement, Metadata, ResultInfo};
use crate::telemetry::SessionMetrics;

/// Everything needed to turn one sensor frame into one [`Measurement`].
pub struct Acquisition {
    link: SensorLink,
    processor: Box<dyn ServiceProcessor>,
    request: Option<SweepRequest>,
    sequence: u32,
    metrics: Arc<SessionMetrics>,
}

impl Acquisition {
    pub fn new(link: SensorLink, kind: ServiceKind, metrics: Arc<SessionMetrics>) -> Self {
        Self {
            link,
            processor: processor_for(kind),
            request: None,
            sequence: 0,
            metrics,
        }
    }

    pub fn sensor_id(&self) -> u32 {
        self.link.sensor_id()
    }

    /// Prepares the processor and programs the sensor for `metadata`.
    pub fn configure(
        &mut self,
        config: &ServiceConfiguration,
        metadata: &Metadata,
    ) -> ServiceResult<()> {
        self.request = None;
        self.processor.cleanup();
        self.processor.initialize(config, metadata)?;
        self.link.program(&metadata.register_setup(config))?;
        self.request = Some(metadata.sweep_request());
        Ok(())
    }

    /// Reads and processes one frame.
    pub fn cycle(&mut self) -> ServiceResult<Measurement> {
        let request = self
            .request
            .ok_or_else(|| ServiceError::InvalidState("acquisition is not configured".into()))?;
        let sequence = self.sequence.checked_add(1).ok_or_else(|| {
            ServiceError::InvalidState("result sequence numbers are exhausted".into())
        })?;
        let acquired = self.link.acquire(&request)?;
        let data_saturated = acquired.frame.is_saturated();
        let payload = self.processor.process(&acquired.frame)?;

        self.sequence = sequence;
        self.metrics.record_measurement(data_saturated);
        if data_saturated {
            warn!(
                "sensor {} frame {} saturated",
                self.link.sensor_id(),
                self.sequence
            );
        }
        debug!(
            "sensor {} produced result {} ({} values)",
            self.link.sensor_id(),
            self.sequence,
            payload.len()
        );

        Ok(Measurement {
            info: ResultInfo {
                sequence_number: self.sequence,
                data_saturated,
                sensor_communication_error: acquired.recovered,
            },
            payload,
        })
    }

    pub fn shutdown(&mut self) {
        self.request = None;
        self.processor.cleanup();
        self.link.power_off();
    }
}

/// Background thread running [`Acquisition::cycle`] at the frame rate.
pub struct Producer {
    stop: Option<Sender<()>>,
    handle: JoinHandle<Acquisition>,
}

impl Producer {
    pub fn spawn(
        mut acquisition: Acquisition,
        period: Duration,
        results: Sender<ServiceResult<Measurement>>,
        cancel: Receiver<()>,
    ) -> ServiceResult<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let sensor_id = acquisition.sensor_id();
        let handle = thread::Builder::new()
            .name(format!("rss-producer-{}", sensor_id))
            .spawn(move || {
                info!("producer for sensor {} started, period {:?}", sensor_id, period);
                let mut next = Instant::now();
                loop {
                    let delay = next.saturating_duration_since(Instant::now());
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(cancel) -> _ => break,
                        default(delay) => {}
                    }
                    // Skip missed slots instead of bursting to catch up.
                    next = (next + period).max(Instant::now());

                    let result = acquisition.cycle();
                    if let Err(err) = &result {
                        error!("measurement cycle on sensor {} failed: {}", sensor_id, err);
                    }
                    select! {
                        send(results, result) -> sent => {
                            if sent.is_err() {
                                break;
                            }
                        }
                        recv(stop_rx) -> _ => break,
                        recv(cancel) -> _ => break,
                    }
                }
                info!("producer for sensor {} stopped", sensor_id);
                acquisition
            })
            .map_err(|err| {
                ServiceError::InvalidState(format!("failed to spawn producer thread: {}", err))
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            handle,
        })
    }

    /// Stops the thread and hands the acquisition back; `None` if it panicked.
    pub fn stop(mut self) -> Option<Acquisition> {
        drop(self.stop.take());
        match self.handle.join() {
            Ok(acquisition) => Some(acquisition),
            Err(_) => {
                error!("producer thread panicked");
                None
            }
        }
    }
}
