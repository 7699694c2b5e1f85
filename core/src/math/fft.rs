use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};

/// Forward/inverse FFT pair planned once per sweep length.
pub struct FftHelper {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            forward,
            inverse,
            scratch: vec![Complex32::zero(); scratch_len],
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn forward(&mut self, buffer: &mut [Complex32]) {
        self.forward.process_with_scratch(buffer, &mut self.scratch);
    }

    /// Inverse transform, normalized so that `inverse(forward(x)) == x`.
    pub fn inverse(&mut self, buffer: &mut [Complex32]) {
        self.inverse.process_with_scratch(buffer, &mut self.scratch);
        let scale = 1.0 / buffer.len().max(1) as f32;
        for value in buffer.iter_mut() {
            *value *= scale;
        }
    }

    /// Zeroes every bin whose normalized frequency exceeds `cutoff_ratio`.
    pub fn lowpass(&mut self, buffer: &mut [Complex32], cutoff_ratio: f32) {
        let size = buffer.len();
        if size == 0 {
            return;
        }
        self.forward(buffer);
        for (bin, value) in buffer.iter_mut().enumerate() {
            let folded = bin.min(size - bin);
            if folded as f32 / size as f32 > cutoff_ratio {
                *value = Complex32::zero();
            }
        }
        self.inverse(buffer);
    }
}
