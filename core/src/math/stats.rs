use num_complex::Complex32;

pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Mean of `|x|^2` over complex samples.
    pub fn mean_power(samples: &[Complex32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().map(|v| v.norm_sqr()).sum::<f32>() / samples.len() as f32
    }

    /// Index and value of the largest sample.
    pub fn peak(samples: &[f32]) -> Option<(usize, f32)> {
        samples
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (index, value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((index, value)),
            })
    }

    /// Centered moving average; the window shrinks at the edges.
    pub fn moving_average(samples: &[f32], window: usize) -> Vec<f32> {
        let half = window / 2;
        (0..samples.len())
            .map(|index| {
                let begin = index.saturating_sub(half);
                let end = (index + half + 1).min(samples.len());
                let slice = &samples[begin..end];
                slice.iter().sum::<f32>() / slice.len() as f32
            })
            .collect()
    }
}
