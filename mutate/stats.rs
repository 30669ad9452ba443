//! Small descriptive-statistics helpers shared by the evaluator and the summary pass.

use ndarray::ArrayView1;

/// Single-pass running mean and variance (Welford).
#[derive(Debug, Clone, Copy, Default)]
pub struct Moments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Moments {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Arithmetic mean, NaN when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.mean }
    }

    /// Sample variance with denominator `n - 1`, NaN for fewer than two values.
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            f64::NAN
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn sample_sd(&self) -> f64 {
        self.sample_variance().sqrt()
    }
}

impl FromIterator<f64> for Moments {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut moments = Moments::default();
        for value in iter {
            moments.push(value);
        }
        moments
    }
}

/// True when every value equals the first one, or the slice is empty.
pub fn all_equal(values: ArrayView1<f64>) -> bool {
    match values.first() {
        Some(&first) => values.iter().all(|&v| v == first),
        None => true,
    }
}

/// Squared Pearson correlation between two equally long series.
///
/// Returns `None` when either series is constant, because the correlation is
/// undefined there.
pub fn squared_correlation(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len());
    if a.len() < 2 || all_equal(a) || all_equal(b) {
        return None;
    }
    let mean_a = a.mean()?;
    let mean_b = b.mean()?;
    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    Some((sab * sab) / (saa * sbb))
}

/// Quantile of an ascending-sorted slice with linear interpolation between
/// order statistics (the "type 7" definition).
pub fn quantile_sorted(sorted: &[f64], probability: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * probability.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = h.ceil() as usize;
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}
