//! Service sessions.
//!
//! A [`Session`] owns one sensor through its lease and walks through
//! `Created -> Activated -> Running <-> Paused -> Destroyed`. While running,
//! a producer thread fills a bounded queue that is drained either by
//! [`Session::get_next`] or by a subscribed [`MeasurementHandler`] on a
//! dedicated delivery thread. Destroying the session cancels both threads,
//! wakes any blocked caller and returns the sensor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{info, warn};

use crate::configuration::{ServiceConfiguration, ServiceKind, SessionOptions};
use crate::prelude::{ServiceError, ServiceResult};
use crate::sensor::{RadarSystem, SensorId, SensorLease, SensorLink};
use crate::service::delivery::{BoxedHandler, Delivery, MeasurementHandler};
use crate::service::producer::{Acquisition, Producer};
use crate::service::{Measurement, Metadata, SessionState};
use crate::telemetry::{MetricsSnapshot, SessionMetrics};

type ResultQueue = ServiceResult<Measurement>;

struct Core {
    state: SessionState,
    config: ServiceConfiguration,
    metadata: Option<Metadata>,
    /// Held here unless the producer thread owns it.
    acquisition: Option<Acquisition>,
    producer: Option<Producer>,
    /// Subscribed handler while no delivery thread is running.
    handler: Option<BoxedHandler>,
    delivery: Option<Delivery>,
    /// Thread running the handler; kept after destroy so re-entrant calls are recognised.
    delivery_thread: Option<ThreadId>,
    /// Dropped on destroy to wake every blocked `select!`.
    cancel: Option<Sender<()>>,
}

impl Core {
    fn has_handler(&self) -> bool {
        self.handler.is_some() || self.delivery.is_some()
    }

    fn expect_state(&self, allowed: &[SessionState], operation: &str) -> ServiceResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ServiceError::InvalidState(format!(
                "cannot {} while the session is {}",
                operation, self.state
            )))
        }
    }

    fn acquisition_mut(&mut self) -> ServiceResult<&mut Acquisition> {
        self.acquisition.as_mut().ok_or_else(acquisition_lost)
    }

    fn attach_delivery(&mut self, delivery: Delivery) {
        self.delivery_thread = Some(delivery.thread_id());
        self.delivery = Some(delivery);
    }
}

fn acquisition_lost() -> ServiceError {
    ServiceError::InvalidState("sensor acquisition is no longer available".into())
}

fn destroyed() -> ServiceError {
    ServiceError::InvalidState("session was destroyed".into())
}

/// Measurement session for one service on one sensor.
pub struct Session {
    kind: ServiceKind,
    sensor_id: SensorId,
    options: SessionOptions,
    metrics: Arc<SessionMetrics>,
    cancelled: Arc<AtomicBool>,
    results_tx: Sender<ResultQueue>,
    results_rx: Receiver<ResultQueue>,
    cancel_rx: Receiver<()>,
    core: Mutex<Core>,
    /// Held for the whole of `destroy` so repeated calls return only once
    /// every thread has stopped.
    teardown: Mutex<()>,
}

impl Session {
    /// Creates a session on an already leased sensor.
    pub fn new(
        config: ServiceConfiguration,
        options: SessionOptions,
        lease: SensorLease,
    ) -> ServiceResult<Self> {
        config.validate()?;
        options.validate()?;
        if lease.sensor_id() != config.sensor_id() {
            return Err(ServiceError::InvalidArgument(format!(
                "configuration targets sensor {} but the lease is for sensor {}",
                config.sensor_id(),
                lease.sensor_id()
            )));
        }

        let sensor_id = lease.sensor_id();
        let kind = config.kind();
        let metrics = Arc::new(SessionMetrics::new());
        let link = SensorLink::new(
            lease,
            options.transfer_retries,
            options.interrupt_timeout(),
            metrics.clone(),
        );
        let acquisition = Acquisition::new(link, kind, metrics.clone());
        let (results_tx, results_rx) = bounded(options.queue_capacity);
        let (cancel_tx, cancel_rx) = bounded(0);
        info!("created {} session on sensor {}", kind, sensor_id);

        Ok(Self {
            kind,
            sensor_id,
            options,
            metrics,
            cancelled: Arc::new(AtomicBool::new(false)),
            results_tx,
            results_rx,
            cancel_rx,
            core: Mutex::new(Core {
                state: SessionState::Created,
                config,
                metadata: None,
                acquisition: Some(acquisition),
                producer: None,
                handler: None,
                delivery: None,
                delivery_thread: None,
                cancel: Some(cancel_tx),
            }),
            teardown: Mutex::new(()),
        })
    }

    /// Leases the configured sensor from `system` and creates a session on it.
    pub fn open(
        system: &RadarSystem,
        config: ServiceConfiguration,
        options: SessionOptions,
    ) -> ServiceResult<Self> {
        let lease = system.acquire(config.sensor_id())?;
        Self::new(config, options, lease)
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn configuration(&self) -> ServiceConfiguration {
        self.lock().config.clone()
    }

    /// Metadata of the active configuration.
    pub fn metadata(&self) -> ServiceResult<Metadata> {
        let core = self.lock();
        core.metadata.ok_or_else(|| {
            ServiceError::InvalidState(format!(
                "metadata is not available while the session is {}",
                core.state
            ))
        })
    }

    /// Derives the metadata and programs the sensor.
    pub fn activate(&self) -> ServiceResult<Metadata> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.expect_state(&[SessionState::Created], "activate")?;

        let metadata = Metadata::derive(&core.config)?;
        let acquisition = core.acquisition.as_mut().ok_or_else(acquisition_lost)?;
        if let Err(err) = acquisition.configure(&core.config, &metadata) {
            acquisition.shutdown();
            return Err(err);
        }
        core.metadata = Some(metadata);
        core.state = SessionState::Activated;
        info!(
            "activated {} on sensor {}: {:.3}..{:.3} m, {} values per result",
            self.kind,
            self.sensor_id,
            metadata.actual_start_m,
            metadata.actual_end_m(),
            metadata.data_length
        );
        Ok(metadata)
    }

    /// Applies `update` to a copy of the configuration and keeps it only if
    /// it is valid (and, once activated, derives consistent metadata).
    pub fn update_configuration<F>(&self, update: F) -> ServiceResult<()>
    where
        F: FnOnce(&mut ServiceConfiguration) -> ServiceResult<()>,
    {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.expect_state(
            &[SessionState::Created, SessionState::Activated],
            "update the configuration",
        )?;

        let mut candidate = core.config.clone();
        update(&mut candidate)?;
        candidate.validate()?;
        if candidate.sensor_id() != self.sensor_id {
            return Err(ServiceError::InvalidArgument(format!(
                "session is bound to sensor {}",
                self.sensor_id
            )));
        }
        if candidate == core.config {
            return Ok(());
        }

        if core.state == SessionState::Activated {
            let metadata = Metadata::derive(&candidate)?;
            let acquisition = core.acquisition.as_mut().ok_or_else(acquisition_lost)?;
            if let Err(err) = acquisition.configure(&candidate, &metadata) {
                if let Some(previous) = core.metadata {
                    if let Err(restore) = acquisition.configure(&core.config, &previous) {
                        warn!(
                            "sensor {} could not be restored to the previous configuration: {}",
                            self.sensor_id, restore
                        );
                    }
                }
                return Err(err);
            }
            core.metadata = Some(metadata);
            info!(
                "reconfigured sensor {}: {} values per result",
                self.sensor_id, metadata.data_length
            );
        }
        core.config = candidate;
        Ok(())
    }

    /// Starts streaming results.
    pub fn start(&self) -> ServiceResult<()> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.expect_state(&[SessionState::Activated], "start")?;
        self.launch(core)?;
        core.state = SessionState::Running;
        info!("session on sensor {} running", self.sensor_id);
        Ok(())
    }

    /// Stops the producer; queued results stay available.
    pub fn pause(&self) -> ServiceResult<()> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.expect_state(&[SessionState::Running], "pause")?;
        if let Some(producer) = core.producer.take() {
            core.acquisition = producer.stop();
        }
        core.state = SessionState::Paused;
        info!("session on sensor {} paused", self.sensor_id);
        Ok(())
    }

    pub fn resume(&self) -> ServiceResult<()> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.expect_state(&[SessionState::Paused], "resume")?;
        self.launch(core)?;
        core.state = SessionState::Running;
        info!("session on sensor {} resumed", self.sensor_id);
        Ok(())
    }

    /// Runs a single measurement cycle on the calling thread.
    pub fn execute_once(&self) -> ServiceResult<Measurement> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.expect_state(
            &[SessionState::Activated, SessionState::Paused],
            "execute a single measurement",
        )?;
        if core.has_handler() {
            return Err(ServiceError::InvalidState(
                "results are delivered to the subscribed handler".into(),
            ));
        }
        let measurement = core.acquisition_mut()?.cycle()?;
        self.metrics.record_delivered();
        Ok(measurement)
    }

    /// Waits up to the configured timeout for the next streamed result.
    pub fn get_next(&self) -> ServiceResult<Measurement> {
        self.get_next_timeout(self.options.get_next_timeout())
    }

    pub fn get_next_timeout(&self, timeout: Duration) -> ServiceResult<Measurement> {
        {
            let core = self.lock();
            core.expect_state(
                &[SessionState::Running, SessionState::Paused],
                "poll for results",
            )?;
            if core.has_handler() {
                return Err(ServiceError::InvalidState(
                    "results are delivered to the subscribed handler".into(),
                ));
            }
        }
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(destroyed());
        }

        select! {
            recv(self.results_rx) -> item => {
                if self.cancelled.load(Ordering::SeqCst) {
                    return Err(destroyed());
                }
                let measurement = item.map_err(|_| destroyed())??;
                self.metrics.record_delivered();
                Ok(measurement)
            }
            recv(self.cancel_rx) -> _ => Err(destroyed()),
            default(timeout) => Err(ServiceError::Timeout(timeout)),
        }
    }

    /// Registers the single handler that receives every streamed result.
    pub fn subscribe<H: MeasurementHandler>(&self, handler: H) -> ServiceResult<()> {
        let mut guard = self.lock();
        let core = &mut *guard;
        core.expect_state(
            &[
                SessionState::Created,
                SessionState::Activated,
                SessionState::Paused,
            ],
            "subscribe",
        )?;
        if core.has_handler() {
            return Err(ServiceError::InvalidState(
                "a handler is already subscribed".into(),
            ));
        }

        let handler: BoxedHandler = Box::new(handler);
        if core.state == SessionState::Paused {
            let delivery = self.spawn_delivery(handler)?;
            core.attach_delivery(delivery);
        } else {
            core.handler = Some(handler);
        }
        Ok(())
    }

    /// Removes the handler after it has received every queued result.
    pub fn unsubscribe(&self) -> ServiceResult<()> {
        let delivery = {
            let mut core = self.lock();
            core.expect_state(
                &[
                    SessionState::Created,
                    SessionState::Activated,
                    SessionState::Paused,
                ],
                "unsubscribe",
            )?;
            if core.handler.take().is_some() {
                return Ok(());
            }
            if core
                .delivery
                .as_ref()
                .is_some_and(|delivery| delivery.is_current_thread())
            {
                return Err(ServiceError::InvalidState(
                    "cannot unsubscribe from inside the handler".into(),
                ));
            }
            core.delivery_thread = None;
            core.delivery.take()
        };
        // Joined without the lock so a handler calling back into the session cannot deadlock.
        if let Some(delivery) = delivery {
            delivery.stop();
        }
        Ok(())
    }

    /// Stops acquisition and releases the sensor. Safe to call repeatedly
    /// and from inside the handler.
    ///
    /// Concurrent callers block until the first teardown has finished, so
    /// no handler is running once any of them returns. A call made from the
    /// handler itself returns without waiting for its own thread.
    pub fn destroy(&self) {
        let on_delivery_thread = self.lock().delivery_thread == Some(thread::current().id());
        let _teardown = if on_delivery_thread {
            match self.teardown.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // Another thread is tearing down and will join this one.
                Err(TryLockError::WouldBlock) => return,
            }
        } else {
            self.teardown
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        };

        let (previous, producer, delivery, acquisition) = {
            let mut core = self.lock();
            if core.state == SessionState::Destroyed {
                return;
            }
            let previous = core.state;
            core.state = SessionState::Destroyed;
            core.metadata = None;
            self.cancelled.store(true, Ordering::SeqCst);
            drop(core.cancel.take());
            core.handler = None;
            (
                previous,
                core.producer.take(),
                core.delivery.take(),
                core.acquisition.take(),
            )
        };

        let acquisition = match producer {
            Some(producer) => producer.stop(),
            None => acquisition,
        };
        if let Some(mut acquisition) = acquisition {
            acquisition.shutdown();
        }
        if let Some(delivery) = delivery {
            if delivery.is_current_thread() {
                delivery.detach();
            } else {
                delivery.stop();
            }
        }
        while self.results_rx.try_recv().is_ok() {}
        info!(
            "destroyed {} session on sensor {} (was {})",
            self.kind, self.sensor_id, previous
        );
    }

    fn launch(&self, core: &mut Core) -> ServiceResult<()> {
        let period = core
            .metadata
            .map(|metadata| metadata.frame_period())
            .ok_or_else(|| ServiceError::InvalidState("session is not activated".into()))?;
        if core.delivery.is_none() {
            if let Some(handler) = core.handler.take() {
                let delivery = self.spawn_delivery(handler)?;
                core.attach_delivery(delivery);
            }
        }
        let acquisition = core.acquisition.take().ok_or_else(acquisition_lost)?;
        core.producer = Some(Producer::spawn(
            acquisition,
            period,
            self.results_tx.clone(),
            self.cancel_rx.clone(),
        )?);
        Ok(())
    }

    fn spawn_delivery(&self, handler: BoxedHandler) -> ServiceResult<Delivery> {
        Delivery::spawn(
            handler,
            self.results_rx.clone(),
            self.cancel_rx.clone(),
            self.cancelled.clone(),
            self.metrics.clone(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.destroy();
    }
}
