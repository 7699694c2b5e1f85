use num_complex::{Complex, Complex32};

use crate::configuration::limits::MAX_CUTOFF_RATIO;
use crate::configuration::{IqOutputFormat, ServiceConfiguration};
use crate::math::fft::FftHelper;
use crate::prelude::{ServiceProcessor, ServiceResult};
use crate::processing::buffer_pool::BufferPool;
use crate::processing::{check_frame, not_initialized, running_average, to_complex32};
use crate::sensor::RawFrame;
use crate::service::{Metadata, Payload};

#[derive(Debug, Clone, Copy)]
struct IqSettings {
    points: usize,
    running_average_factor: f32,
    cutoff_ratio: f32,
    format: IqOutputFormat,
}

/// Averaged, optionally depth-filtered complex sweep.
pub struct IqProcessor {
    pool: BufferPool<Complex32>,
    settings: Option<IqSettings>,
    /// Planned only when the low-pass filter is active.
    fft: Option<FftHelper>,
    history: Vec<Complex32>,
}

impl IqProcessor {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: BufferPool::with_capacity(pool_size),
            settings: None,
            fft: None,
            history: Vec::new(),
        }
    }
}

impl ServiceProcessor for IqProcessor {
    fn initialize(
        &mut self,
        config: &ServiceConfiguration,
        metadata: &Metadata,
    ) -> ServiceResult<()> {
        let settings = IqSettings {
            points: metadata.points_per_sweep,
            running_average_factor: config.running_average_factor(),
            cutoff_ratio: config.depth_lowpass_cutoff_ratio(),
            format: config.iq_output_format(),
        };
        self.fft = (settings.cutoff_ratio < MAX_CUTOFF_RATIO)
            .then(|| FftHelper::new(settings.points));
        self.settings = Some(settings);
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
        if let Some(fft) = self.fft.as_mut() {
            fft.lowpass(&mut current, settings.cutoff_ratio);
        }
        running_average(
            &mut self.history,
            &current,
            settings.running_average_factor,
        );
        self.pool.release(current);

        let payload = match settings.format {
            IqOutputFormat::Float => Payload::Iq(self.history.clone()),
            IqOutputFormat::Int16 => Payload::IqInt16(
                self.history
                    .iter()
                    .map(|v| Complex::new(saturate_i16(v.re), saturate_i16(v.im)))
                    .collect(),
            ),
        };
        Ok(payload)
    }

    fn cleanup(&mut self) {
        self.pool.reset();
        self.settings = None;
        self.fft = None;
        self.history.clear();
    }
}

fn saturate_i16(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
