use log::debug;
use num_complex::Complex32;

use crate::configuration::{Profile, ServiceConfiguration};
use crate::math::stats::StatsHelper;
use crate::prelude::{ServiceProcessor, ServiceResult};
use crate::processing::buffer_pool::BufferPool;
use crate::processing::{check_frame, not_initialized, running_average, to_complex32};
use crate::sensor::RawFrame;
use crate::service::{Metadata, Payload};

/// Width of the depth smoothing window used by the SNR profile.
const SNR_SMOOTHING_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy)]
struct EnvelopeSettings {
    points: usize,
    running_average_factor: f32,
    compensate_phase: bool,
    smooth: bool,
}

/// Amplitude envelope of a coherently averaged sweep.
pub struct EnvelopeProcessor {
    pool: BufferPool<Complex32>,
    settings: Option<EnvelopeSettings>,
    history: Vec<Complex32>,
}

impl EnvelopeProcessor {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: BufferPool::with_capacity(pool_size),
            settings: None,
            history: Vec::new(),
        }
    }

    /// Rotates `current` so its phase lines up with the averaged history.
    fn align_phase(&self, current: &mut [Complex32]) {
        if self.history.len() != current.len() {
            return;
        }
        let correlation: Complex32 = current
            .iter()
            .zip(&self.history)
            .map(|(cur, old)| cur * old.conj())
            .sum();
        if correlation.norm_sqr() == 0.0 {
            return;
        }
        let rotation = Complex32::from_polar(1.0, -correlation.arg());
        for value in current.iter_mut() {
            *value *= rotation;
        }
    }
}

impl ServiceProcessor for EnvelopeProcessor {
    fn initialize(
        &mut self,
        config: &ServiceConfiguration,
        metadata: &Metadata,
    ) -> ServiceResult<()> {
        self.settings = Some(EnvelopeSettings {
            points: metadata.points_per_sweep,
            running_average_factor: config.running_average_factor(),
            compensate_phase: config.compensate_phase(),
            smooth: config.profile() == Profile::MaximizeSnr,
        });
        self.history.clear();
        Ok(())
    }

    fn process(&mut self, frame: &RawFrame) -> ServiceResult<Payload> {
        let settings = self.settings.ok_or_else(not_initialized)?;
        check_frame(frame, settings.points, 1)?;

        let mut current = self.pool.checkout(settings.points)?;
        for (slot, &sample) in current.iter_mut().zip(frame.sweep(0)) {
            *slot = to_complex32(sample);
        }
        if settings.compensate_phase {
            self.align_phase(&mut current);
        }
        running_average(
            &mut self.history,
            &current,
            settings.running_average_factor,
        );
        self.pool.release(current);

        let mut amplitudes: Vec<f32> = self.history.iter().map(|v| v.norm()).collect();
        if settings.smooth {
            amplitudes = StatsHelper::moving_average(&amplitudes, SNR_SMOOTHING_WINDOW);
        }
        debug!(
            "envelope peak {:?}",
            StatsHelper::peak(&amplitudes).map(|(index, _)| index)
        );

        Ok(Payload::Envelope(
            amplitudes
                .into_iter()
                .map(|v| v.round().clamp(0.0, u16::MAX as f32) as u16)
                .collect(),
        ))
    }

    fn cleanup(&mut self) {
        self.pool.reset();
        self.settings = None;
        self.history.clear();
    }
}
