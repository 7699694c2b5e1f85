use num_complex::Complex32;

use crate::configuration::ServiceConfiguration;
use crate::math::stats::StatsHelper;
use crate::prelude::{ServiceError, ServiceProcessor, ServiceResult};
use crate::processing::buffer_pool::BufferPool;
use crate::processing::{check_frame, not_initialized, to_complex32};
use crate::sensor::RawFrame;
use crate::service::{Metadata, Payload};

/// Mean signal power over equally sized depth bins.
pub struct PowerBinsProcessor {
    pool: BufferPool<Complex32>,
    geometry: Option<(usize, usize)>,
}

impl PowerBinsProcessor {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: BufferPool::with_capacity(pool_size),
            geometry: None,
        }
    }
}

impl ServiceProcessor for PowerBinsProcessor {
    fn initialize(
        &mut self,
        _config: &ServiceConfiguration,
        metadata: &Metadata,
    ) -> ServiceResult<()> {
        let bins = metadata.actual_bin_count.map(usize::from).ok_or_else(|| {
            ServiceError::Configuration("power bins metadata lacks a bin count".into())
        })?;
        self.geometry = Some((metadata.points_per_sweep, bins));
        Ok(())
    }

    fn process(&mut self, frame: &RawFrame) -> ServiceResult<Payload> {
        let (points, bins) = self.geometry.ok_or_else(not_initialized)?;
        check_frame(frame, points, 1)?;

        let mut sweep = self.pool.checkout(points)?;
        for (slot, &sample) in sweep.iter_mut().zip(frame.sweep(0)) {
            *slot = to_complex32(sample);
        }
        let powers = (0..bins)
            .map(|bin| {
                let begin = bin * points / bins;
                let end = (bin + 1) * points / bins;
                StatsHelper::mean_power(&sweep[begin..end])
            })
            .collect();
        self.pool.release(sweep);

        Ok(Payload::PowerBins(powers))
    }

    fn cleanup(&mut self) {
        self.pool.reset();
        self.geometry = None;
    }
}
