use crate::configuration::ServiceConfiguration;
use crate::sensor::RawFrame;
use crate::service::{Metadata, Payload};

/// Common error type for configuration, session and processing failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sensor communication error: {0}")]
    Communication(String),
    #[error("timed out after {0:?} waiting for a result")]
    Timeout(std::time::Duration),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Per-service post-processing applied to every raw frame read from the sensor.
///
/// A processor is initialized once per activation with the configuration and
/// the metadata derived from it, and must produce payloads whose length
/// matches `metadata.data_length`.
pub trait ServiceProcessor: Send {
    fn initialize(
        &mut self,
        config: &ServiceConfiguration,
        metadata: &Metadata,
    ) -> ServiceResult<()>;
    fn process(&mut self, frame: &RawFrame) -> ServiceResult<Payload>;
    fn cleanup(&mut self);
}
