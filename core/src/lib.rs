//! Streaming acquisition core for pulsed coherent radar sensors.
//!
//! A [`ServiceConfiguration`] describes one of the four measurement services
//! (envelope, IQ, power bins, sparse). A [`Session`] binds it to a sensor
//! leased from a [`RadarSystem`], derives the [`Metadata`] on activation and
//! produces [`Measurement`]s either on demand, by polling, or through a
//! subscribed [`MeasurementHandler`].

pub mod configuration;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod sensor;
pub mod service;
pub mod telemetry;

pub use configuration::{ServiceConfiguration, ServiceKind, SessionOptions};
pub use prelude::{ServiceError, ServiceProcessor, ServiceResult};
pub use sensor::{RadarSystem, SensorLease, SensorTransport};
pub use service::{
    Measurement, MeasurementHandler, MeasurementSummary, Metadata, Payload, Session, SessionState,
};

pub use ndarray;
pub use num_complex;
