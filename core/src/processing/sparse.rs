use ndarray::Array2;

use crate::configuration::ServiceConfiguration;
use crate::prelude::{ServiceProcessor, ServiceResult};
use crate::processing::{check_frame, not_initialized};
use crate::sensor::RawFrame;
use crate::service::{Metadata, Payload};

/// Offset applied to signed samples so zero sits at mid-scale.
const MID_SCALE: i32 = 1 << 15;

/// Raw sweeps of one frame, unfiltered.
#[derive(Default)]
pub struct SparseProcessor {
    geometry: Option<(usize, usize)>,
}

impl SparseProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServiceProcessor for SparseProcessor {
    fn initialize(
        &mut self,
        _config: &ServiceConfiguration,
        metadata: &Metadata,
    ) -> ServiceResult<()> {
        self.geometry = Some((metadata.sweeps_per_frame, metadata.points_per_sweep));
        Ok(())
    }

    fn process(&mut self, frame: &RawFrame) -> ServiceResult<Payload> {
        let (sweeps, points) = self.geometry.ok_or_else(not_initialized)?;
        check_frame(frame, points, sweeps)?;

        let data = Array2::from_shape_fn((sweeps, points), |(sweep, point)| {
            (frame.samples[sweep * points + point].re as i32 + MID_SCALE) as u16
        });
        Ok(Payload::Sparse(data))
    }

    fn cleanup(&mut self) {
        self.geometry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn samples_are_shaped_sweeps_by_points() {
        let mut config = ServiceConfiguration::sparse();
        config.set_sweeps_per_frame(2).unwrap();
        let metadata = Metadata::derive(&config).unwrap();
        let points = metadata.points_per_sweep;

        let mut processor = SparseProcessor::new();
        processor.initialize(&config, &metadata).unwrap();
        let samples = (0..2 * points)
            .map(|i| Complex::new(i as i16 - 3, 0))
            .collect();
        let Payload::Sparse(data) = processor
            .process(&RawFrame::new(samples, points, 2))
            .unwrap()
        else {
            panic!("expected sparse payload");
        };

        assert_eq!(data.dim(), (2, points));
        assert_eq!(data[[0, 0]], 32_765);
        assert_eq!(data[[1, 0]], (points as i32 - 3 + MID_SCALE) as u16);
        assert_eq!(data.len(), metadata.data_length);
    }

    #[test]
    fn rail_values_map_to_the_ends_of_the_scale() {
        let mut config = ServiceConfiguration::sparse();
        config.set_sweeps_per_frame(1).unwrap();
        config.set_length_m(0.12).unwrap();
        let metadata = Metadata::derive(&config).unwrap();
        let mut processor = SparseProcessor::new();
        processor.initialize(&config, &metadata).unwrap();

        let frame = RawFrame::new(
            vec![Complex::new(i16::MIN, 0), Complex::new(i16::MAX, 0)],
            2,
            1,
        );
        let payload = processor.process(&frame).unwrap();
        assert_eq!(payload.magnitudes(), vec![0.0, 65_535.0]);
    }
}
