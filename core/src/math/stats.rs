pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f32>() / samples.len() as f32
    }

    /// Population standard deviation.
    pub fn std_dev(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let mean = Self::mean(samples);
        let var = samples.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>()
            / samples.len() as f32;
        var.sqrt()
    }

    /// Index of the largest finite value; the first one wins on ties.
    pub fn argmax(samples: &[f32]) -> Option<usize> {
        samples
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .fold(None, |best: Option<(usize, f32)>, (idx, &value)| match best {
                Some((_, current)) if current >= value => best,
                _ => Some((idx, value)),
            })
            .map(|(idx, _)| idx)
    }

    /// Largest finite value, `None` for empty or all-NaN input.
    pub fn max(samples: &[f32]) -> Option<f32> {
        Self::argmax(samples).map(|idx| samples[idx])
    }
}
