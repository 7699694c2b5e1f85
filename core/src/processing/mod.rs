pub mod buffer_pool;
pub mod envelope;
pub mod iq;
pub mod power_bins;
pub mod sparse;

use num_complex::{Complex, Complex32};

pub use buffer_pool::BufferPool;
pub use envelope::EnvelopeProcessor;
pub use iq::IqProcessor;
pub use power_bins::PowerBinsProcessor;
pub use sparse::SparseProcessor;

use crate::configuration::ServiceKind;
use crate::prelude::{ServiceError, ServiceProcessor, ServiceResult};
use crate::sensor::RawFrame;

/// Buffers each processor may hold at once.
const POOL_SIZE: usize = 2;

/// Creates the processor that turns raw frames into payloads of `kind`.
pub fn processor_for(kind: ServiceKind) -> Box<dyn ServiceProcessor> {
    match kind {
        ServiceKind::Envelope => Box::new(EnvelopeProcessor::new(POOL_SIZE)),
        ServiceKind::Iq => Box::new(IqProcessor::new(POOL_SIZE)),
        ServiceKind::PowerBins => Box::new(PowerBinsProcessor::new(POOL_SIZE)),
        ServiceKind::Sparse => Box::new(SparseProcessor::new()),
    }
}

fn not_initialized() -> ServiceError {
    ServiceError::InvalidState("processor not initialized".into())
}

/// Rejects frames whose geometry differs from the programmed one.
fn check_frame(frame: &RawFrame, points: usize, sweeps: usize) -> ServiceResult<()> {
    if frame.points != points || frame.sweeps < sweeps || frame.samples.len() < points * sweeps {
        return Err(ServiceError::Communication(format!(
            "sensor delivered {} sweeps of {} points ({} samples), expected {} of {}",
            frame.sweeps,
            frame.points,
            frame.samples.len(),
            sweeps,
            points
        )));
    }
    Ok(())
}

fn to_complex32(sample: Complex<i16>) -> Complex32 {
    Complex32::new(sample.re as f32, sample.im as f32)
}

/// Exponential average of `current` into `history`; empty history is seeded.
fn running_average(history: &mut Vec<Complex32>, current: &[Complex32], factor: f32) {
    if history.len() != current.len() {
        history.clear();
        history.extend_from_slice(current);
        return;
    }
    for (old, new) in history.iter_mut().zip(current) {
        *old = *old * factor + *new * (1.0 - factor);
    }
}
