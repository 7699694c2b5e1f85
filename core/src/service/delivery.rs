use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{error, info};

use crate::prelude::{ServiceError, ServiceResult};
use crate::service::Measurement;
use crate::telemetry::SessionMetrics;

/// Receives results pushed by a running session.
///
/// Every completed cycle reaches the handler exactly once, in sequence
/// order, on the session's delivery thread.
pub trait MeasurementHandler: Send + 'static {
    fn on_measurement(&mut self, measurement: &Measurement);

    /// Called for cycles that failed instead of producing a result.
    fn on_error(&mut self, error: &ServiceError) {
        error!("measurement failed: {}", error);
    }
}

impl<F> MeasurementHandler for F
where
    F: FnMut(&Measurement) + Send + 'static,
{
    fn on_measurement(&mut self, measurement: &Measurement) {
        self(measurement)
    }
}

pub type BoxedHandler = Box<dyn MeasurementHandler>;

/// Thread that feeds queued results to the subscribed handler.
pub struct Delivery {
    stop: Option<Sender<()>>,
    handle: JoinHandle<BoxedHandler>,
}

impl Delivery {
    pub fn spawn(
        mut handler: BoxedHandler,
        results: Receiver<ServiceResult<Measurement>>,
        cancel: Receiver<()>,
        cancelled: Arc<AtomicBool>,
        metrics: Arc<SessionMetrics>,
    ) -> ServiceResult<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("rss-delivery".into())
            .spawn(move || {
                let mut deliver = |item: ServiceResult<Measurement>| -> bool {
                    if cancelled.load(Ordering::SeqCst) {
                        return false;
                    }
                    match item {
                        Ok(measurement) => {
                            handler.on_measurement(&measurement);
                            metrics.record_delivered();
                        }
                        Err(err) => handler.on_error(&err),
                    }
                    true
                };
                loop {
                    select! {
                        recv(results) -> item => match item {
                            Ok(item) => {
                                if !deliver(item) {
                                    break;
                                }
                            }
                            Err(_) => break,
                        },
                        recv(stop_rx) -> _ => {
                            // Hand over what is already queued before leaving.
                            while let Ok(item) = results.try_recv() {
                                if !deliver(item) {
                                    break;
                                }
                            }
                            break;
                        }
                        recv(cancel) -> _ => break,
                    }
                }
                info!("delivery thread stopped");
                handler
            })
            .map_err(|err| {
                ServiceError::InvalidState(format!("failed to spawn delivery thread: {}", err))
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            handle,
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id()
    }

    /// Delivers what is queued, then returns the handler; `None` if it panicked.
    pub fn stop(mut self) -> Option<BoxedHandler> {
        drop(self.stop.take());
        match self.handle.join() {
            Ok(handler) => Some(handler),
            Err(_) => {
                error!("delivery thread panicked");
                None
            }
        }
    }

    /// Lets the thread finish on its own; used when stopping from inside the handler.
    pub fn detach(mut self) {
        drop(self.stop.take());
    }
}
