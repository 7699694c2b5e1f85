use std::sync::Arc;
use std::time::Duration;

use log::{error, warn};

use crate::prelude::{ServiceError, ServiceResult};
use crate::sensor::registry::SensorLease;
use crate::sensor::transport::{RawFrame, Register, SensorTransport, SweepRequest, TransportResult};
use crate::telemetry::SessionMetrics;

/// A leased sensor wrapped with bounded transfer retries.
pub struct SensorLink {
    lease: SensorLease,
    retries: u8,
    interrupt_timeout: Duration,
    metrics: Arc<SessionMetrics>,
}

/// A frame together with whether any transfer had to be retried.
pub struct Acquired {
    pub frame: RawFrame,
    pub recovered: bool,
}

impl SensorLink {
    pub fn new(
        lease: SensorLease,
        retries: u8,
        interrupt_timeout: Duration,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            lease,
            retries,
            interrupt_timeout,
            metrics,
        }
    }

    pub fn sensor_id(&self) -> u32 {
        self.lease.sensor_id()
    }

    /// Powers the sensor and writes the sweep setup registers.
    pub fn program(&mut self, registers: &[(Register, u32)]) -> ServiceResult<()> {
        self.with_retries("power on", |transport| transport.power_on())?;
        for &(register, value) in registers {
            self.with_retries("register write", |transport| {
                transport.write_register(register, value)
            })?;
        }
        Ok(())
    }

    pub fn acquire(&mut self, request: &SweepRequest) -> ServiceResult<Acquired> {
        let timeout = self.interrupt_timeout;
        let (frame, failed_attempts) =
            self.with_retries("frame read", |transport| transport.measure(request, timeout))?;
        Ok(Acquired {
            frame,
            recovered: failed_attempts > 0,
        })
    }

    pub fn power_off(&mut self) {
        if let Ok(transport) = self.lease.transport_mut() {
            transport.power_off();
        }
    }

    fn with_retries<T>(
        &mut self,
        what: &str,
        mut transfer: impl FnMut(&mut dyn SensorTransport) -> TransportResult<T>,
    ) -> ServiceResult<(T, u32)> {
        let sensor_id = self.lease.sensor_id();
        let attempts = u32::from(self.retries) + 1;
        let mut failed = 0;
        loop {
            match transfer(self.lease.transport_mut()?) {
                Ok(value) => return Ok((value, failed)),
                Err(err) => {
                    failed += 1;
                    if failed >= attempts {
                        error!(
                            "sensor {} {} failed after {} attempts: {}",
                            sensor_id, what, attempts, err
                        );
                        self.metrics.record_communication_error();
                        return Err(ServiceError::Communication(format!(
                            "{} failed after {} attempts: {}",
                            what, attempts, err
                        )));
                    }
                    warn!(
                        "sensor {} {} attempt {}/{} failed: {}",
                        sensor_id, what, failed, attempts, err
                    );
                    self.metrics.record_retry();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ScriptedSensor;

    fn link(sensor: ScriptedSensor, retries: u8) -> (SensorLink, Arc<SessionMetrics>) {
        let metrics = Arc::new(SessionMetrics::new());
        let link = SensorLink::new(
            SensorLease::detached(Box::new(sensor)),
            retries,
            Duration::from_millis(50),
            metrics.clone(),
        );
        (link, metrics)
    }

    fn request() -> SweepRequest {
        SweepRequest {
            start_m: 0.0,
            step_m: 0.06,
            points: 3,
            sweeps: 1,
        }
    }

    #[test]
    fn recovered_frames_are_flagged() {
        let sensor = ScriptedSensor::new(1);
        let handle = sensor.handle();
        let (mut link, metrics) = link(sensor, 3);
        link.program(&[(Register::PointCount, 3)]).unwrap();

        handle.fail_next_transfers(2);
        let acquired = link.acquire(&request()).unwrap();
        assert!(acquired.recovered);
        assert_eq!(metrics.snapshot().retries, 2);

        let acquired = link.acquire(&request()).unwrap();
        assert!(!acquired.recovered);
    }

    #[test]
    fn exhausted_retries_surface_a_communication_error() {
        let sensor = ScriptedSensor::new(1);
        let handle = sensor.handle();
        let (mut link, metrics) = link(sensor, 1);
        link.program(&[]).unwrap();

        handle.fail_next_transfers(2);
        assert!(matches!(
            link.acquire(&request()),
            Err(ServiceError::Communication(_))
        ));
        assert_eq!(metrics.snapshot().communication_errors, 1);
    }

    #[test]
    fn power_on_is_retried_like_any_transfer() {
        let sensor = ScriptedSensor::new(1);
        let handle = sensor.handle();
        handle.fail_next_power_ons(1);
        let (mut link, metrics) = link(sensor, 1);
        link.program(&[(Register::PointCount, 3)]).unwrap();
        assert!(handle.is_powered());
        assert_eq!(metrics.snapshot().retries, 1);

        link.power_off();
        handle.fail_next_power_ons(2);
        assert!(matches!(
            link.program(&[]),
            Err(ServiceError::Communication(_))
        ));
        assert!(!handle.is_powered());
        assert_eq!(metrics.snapshot().communication_errors, 1);
    }

    #[test]
    fn power_off_releases_the_sensor_power() {
        let sensor = ScriptedSensor::new(1);
        let handle = sensor.handle();
        let (mut link, _) = link(sensor, 0);
        link.program(&[(Register::Profile, 1)]).unwrap();
        assert!(handle.is_powered());
        link.power_off();
        assert!(!handle.is_powered());
    }
}
