use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prelude::{ServiceError, ServiceResult};

pub const MAX_QUEUE_CAPACITY: usize = 16;

/// Runtime behaviour of a session, independent of the sweep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Results buffered between the producer and the consumer.
    pub queue_capacity: usize,
    pub get_next_timeout_ms: u64,
    /// Additional attempts per sensor transfer before giving up.
    pub transfer_retries: u8,
    pub interrupt_timeout_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 2,
            get_next_timeout_ms: 1_000,
            transfer_retries: 3,
            interrupt_timeout_ms: 500,
        }
    }
}

impl SessionOptions {
    pub fn get_next_timeout(&self) -> Duration {
        Duration::from_millis(self.get_next_timeout_ms)
    }

    pub fn interrupt_timeout(&self) -> Duration {
        Duration::from_millis(self.interrupt_timeout_ms)
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ServiceError::OutOfRange(format!(
                "queue capacity {} outside [1, {}]",
                self.queue_capacity, MAX_QUEUE_CAPACITY
            )));
        }
        if self.get_next_timeout_ms == 0 || self.interrupt_timeout_ms == 0 {
            return Err(ServiceError::OutOfRange(
                "timeouts must be at least 1 ms".into(),
            ));
        }
        Ok(())
    }
}
