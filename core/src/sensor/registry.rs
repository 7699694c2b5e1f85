//! Exclusive ownership of sensors.
//!
//! [`RadarSystem`] keeps every known sensor transport and hands out at most one
//! [`SensorLease`] per sensor. Dropping the lease returns the transport.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{info, warn};

use crate::prelude::{ServiceError, ServiceResult};
use crate::sensor::transport::{Register, SensorId, SensorTransport};

type Transport = Box<dyn SensorTransport>;

enum Slot {
    Available(Transport),
    Leased,
}

type Slots = Mutex<BTreeMap<SensorId, Slot>>;

/// Patterns written to and read back from the scratch register during the
/// self test.
const DIAGNOSTIC_PATTERNS: [u32; 4] = [0x0000_0000, 0xffff_ffff, 0xa5a5_5a5a, 0x1234_5678];

/// Registry of the sensors attached to this host.
#[derive(Clone, Default)]
pub struct RadarSystem {
    slots: Arc<Slots>,
}

impl RadarSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, transport: Transport) -> ServiceResult<()> {
        let sensor_id = transport.sensor_id();
        let mut slots = lock(&self.slots);
        if slots.contains_key(&sensor_id) {
            return Err(ServiceError::InvalidArgument(format!(
                "sensor {} is already registered",
                sensor_id
            )));
        }
        slots.insert(sensor_id, Slot::Available(transport));
        info!("registered sensor {}", sensor_id);
        Ok(())
    }

    pub fn sensor_ids(&self) -> Vec<SensorId> {
        lock(&self.slots).keys().copied().collect()
    }

    pub fn is_leased(&self, sensor_id: SensorId) -> bool {
        matches!(lock(&self.slots).get(&sensor_id), Some(Slot::Leased))
    }

    /// Takes exclusive ownership of a sensor until the lease is dropped.
    pub fn acquire(&self, sensor_id: SensorId) -> ServiceResult<SensorLease> {
        let mut slots = lock(&self.slots);
        let slot = slots.get_mut(&sensor_id).ok_or_else(|| {
            ServiceError::InvalidArgument(format!("sensor {} is not registered", sensor_id))
        })?;
        match std::mem::replace(slot, Slot::Leased) {
            Slot::Available(transport) => Ok(SensorLease {
                sensor_id,
                transport: Some(transport),
                home: Arc::downgrade(&self.slots),
            }),
            Slot::Leased => Err(ServiceError::InvalidState(format!(
                "sensor {} is owned by another session",
                sensor_id
            ))),
        }
    }

    /// Powers the sensor and checks that the scratch register holds every
    /// written pattern.
    pub fn diagnostic_test(&self, sensor_id: SensorId) -> ServiceResult<()> {
        let mut lease = self.acquire(sensor_id)?;
        let transport = lease.transport_mut()?;
        transport
            .power_on()
            .map_err(|err| ServiceError::Communication(err.to_string()))?;

        let outcome = DIAGNOSTIC_PATTERNS.iter().try_for_each(|&pattern| {
            transport
                .write_register(Register::Scratch, pattern)
                .and_then(|_| transport.read_register(Register::Scratch))
                .map_err(|err| ServiceError::Communication(err.to_string()))
                .and_then(|read_back| {
                    if read_back == pattern {
                        Ok(())
                    } else {
                        Err(ServiceError::Communication(format!(
                            "scratch register read back {:#010x}, expected {:#010x}",
                            read_back, pattern
                        )))
                    }
                })
        });
        transport.power_off();

        match &outcome {
            Ok(()) => info!("sensor {} passed the diagnostic test", sensor_id),
            Err(err) => warn!("sensor {} failed the diagnostic test: {}", sensor_id, err),
        }
        outcome
    }
}

/// Exclusive handle to one sensor transport.
pub struct SensorLease {
    sensor_id: SensorId,
    transport: Option<Transport>,
    home: Weak<Slots>,
}

impl SensorLease {
    /// Wraps a transport that is not managed by a [`RadarSystem`].
    pub fn detached(transport: Transport) -> Self {
        Self {
            sensor_id: transport.sensor_id(),
            transport: Some(transport),
            home: Weak::new(),
        }
    }

    pub fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    pub fn transport_mut(&mut self) -> ServiceResult<&mut dyn SensorTransport> {
        // Only `Drop` takes the transport out.
        match self.transport.as_deref_mut() {
            Some(transport) => Ok(transport),
            None => Err(ServiceError::InvalidState(format!(
                "sensor {} was released",
                self.sensor_id
            ))),
        }
    }
}

impl Drop for SensorLease {
    fn drop(&mut self) {
        let (Some(transport), Some(slots)) = (self.transport.take(), self.home.upgrade()) else {
            return;
        };
        lock(&slots).insert(self.sensor_id, Slot::Available(transport));
        info!("released sensor {}", self.sensor_id);
    }
}

fn lock(slots: &Slots) -> MutexGuard<'_, BTreeMap<SensorId, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ScriptedSensor;

    #[test]
    fn second_acquire_fails_until_the_lease_is_dropped() {
        let system = RadarSystem::new();
        system.register(Box::new(ScriptedSensor::new(1))).unwrap();

        let lease = system.acquire(1).unwrap();
        assert!(system.is_leased(1));
        assert!(matches!(
            system.acquire(1),
            Err(ServiceError::InvalidState(_))
        ));

        drop(lease);
        assert!(!system.is_leased(1));
        assert!(system.acquire(1).is_ok());
    }

    #[test]
    fn unknown_and_duplicate_sensors_are_invalid_arguments() {
        let system = RadarSystem::new();
        system.register(Box::new(ScriptedSensor::new(2))).unwrap();
        assert!(matches!(
            system.register(Box::new(ScriptedSensor::new(2))),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert!(matches!(
            system.acquire(5),
            Err(ServiceError::InvalidArgument(_))
        ));
        assert_eq!(system.sensor_ids(), vec![2]);
    }

    #[test]
    fn diagnostic_test_passes_on_a_healthy_sensor_and_releases_it() {
        let system = RadarSystem::new();
        let sensor = ScriptedSensor::new(1);
        let handle = sensor.handle();
        system.register(Box::new(sensor)).unwrap();

        system.diagnostic_test(1).unwrap();
        assert!(!handle.is_powered());
        assert!(!system.is_leased(1));
    }

    #[test]
    fn diagnostic_test_reports_bus_failures() {
        let system = RadarSystem::new();
        let sensor = ScriptedSensor::new(1);
        sensor.handle().fail_next_transfers(1);
        system.register(Box::new(sensor)).unwrap();

        assert!(matches!(
            system.diagnostic_test(1),
            Err(ServiceError::Communication(_))
        ));
    }
}
