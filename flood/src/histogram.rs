//! Histogram & statistics kernel (spec.md §4.A).

/// A fixed-bin histogram over `[min_val, max_val]`. Bin `i` covers
/// `[min_val + i*width, min_val + (i+1)*width)`, except the last bin which is closed on
/// both ends.
#[derive(Debug, Clone)]
pub struct Histogram {
	pub counts: Vec<f64>,
	pub min_val: f64,
	pub max_val: f64,
}

impl Histogram {
	pub fn num_bins(&self) -> usize {
		self.counts.len()
	}

	pub fn bin_width(&self) -> f64 {
		(self.max_val - self.min_val) / self.counts.len() as f64
	}

	pub fn bin_center(&self, i: usize) -> f64 {
		self.min_val + self.bin_width() * (i as f64 + 0.5)
	}

	pub fn total(&self) -> f64 {
		self.counts.iter().sum()
	}

	/// Normalize counts into frequencies summing to 1. No-op (returns a zeroed histogram)
	/// if the total is 0.
	pub fn normalized(&self) -> Histogram {
		let total = self.total();
		if total <= 0.0 {
			return self.clone();
		}
		Histogram {
			counts: self.counts.iter().map(|&c| c / total).collect(),
			min_val: self.min_val,
			max_val: self.max_val,
		}
	}
}

/// Build a histogram over `samples`, honoring `valid`. Samples outside `[min, max]`, and
/// invalid samples, are discarded (spec.md §4.A).
pub fn histogram(samples: &[f32], valid: &[bool], num_bins: usize, min: f64, max: f64) -> Histogram {
	assert!(num_bins > 0, "num_bins must be > 0");
	let mut counts = vec![0.0; num_bins];
	if max > min {
		let width = (max - min) / num_bins as f64;
		for (&s, &v) in samples.iter().zip(valid.iter()) {
			if !v {
				continue;
			}
			let s = s as f64;
			if s < min || s > max {
				continue;
			}
			let mut bin = ((s - min) / width) as usize;
			if bin >= num_bins {
				bin = num_bins - 1;
			}
			counts[bin] += 1.0;
		}
	}
	Histogram { counts, min_val: min, max_val: max }
}

/// Smallest bin index `b` such that the cumulative mass through `b` is ≥ `p * total`.
/// Returns `None` for an empty histogram.
pub fn percentile(hist: &Histogram, p: f64) -> Option<usize> {
	let total = hist.total();
	if total <= 0.0 {
		return None;
	}
	let target = p * total;
	let mut cumulative = 0.0;
	for (i, &c) in hist.counts.iter().enumerate() {
		cumulative += c;
		if cumulative >= target {
			return Some(i);
		}
	}
	Some(hist.counts.len() - 1)
}

/// The histogram value (bin center) at the given percentile; `None` for an empty histogram.
pub fn percentile_value(hist: &Histogram, p: f64) -> Option<f64> {
	percentile(hist, p).map(|b| hist.bin_center(b))
}

/// Population mean over valid samples. `None` if there are no valid samples.
pub fn mean(samples: &[f32], valid: &[bool]) -> Option<f64> {
	let mut sum = 0.0;
	let mut count = 0usize;
	for (&s, &v) in samples.iter().zip(valid.iter()) {
		if v {
			sum += s as f64;
			count += 1;
		}
	}
	(count > 0).then(|| sum / count as f64)
}

/// Population standard deviation over valid samples (divides by N, matching spec.md §4.A).
/// `None` if there are no valid samples.
pub fn stddev(samples: &[f32], valid: &[bool]) -> Option<f64> {
	let mu = mean(samples, valid)?;
	let mut sum_sq = 0.0;
	let mut count = 0usize;
	for (&s, &v) in samples.iter().zip(valid.iter()) {
		if v {
			let d = s as f64 - mu;
			sum_sq += d * d;
			count += 1;
		}
	}
	(count > 0).then(|| (sum_sq / count as f64).sqrt())
}

/// Population mean of an already-collected `f64` sample set (used on tile-level
/// aggregates, e.g. per-tile means or thresholds, where every entry is already valid).
pub fn mean_f64(samples: &[f64]) -> Option<f64> {
	(!samples.is_empty()).then(|| samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation of an already-collected `f64` sample set.
pub fn stddev_f64(samples: &[f64]) -> Option<f64> {
	let mu = mean_f64(samples)?;
	let sum_sq: f64 = samples.iter().map(|&s| (s - mu).powi(2)).sum();
	Some((sum_sq / samples.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_input_is_explicit_none() {
		assert_eq!(mean(&[], &[]), None);
		assert_eq!(stddev(&[], &[]), None);
	}

	#[test]
	fn all_invalid_is_explicit_none() {
		assert_eq!(mean(&[1.0, 2.0], &[false, false]), None);
	}

	#[test]
	fn mean_and_stddev_ignore_invalid() {
		let samples = [10.0, 20.0, 9999.0];
		let valid = [true, true, false];
		assert_eq!(mean(&samples, &valid), Some(15.0));
		assert_eq!(stddev(&samples, &valid), Some(5.0));
	}

	#[test]
	fn histogram_discards_out_of_range_and_invalid() {
		let samples = [0.5, 1.5, 2.5, -1.0, 100.0];
		let valid = [true, true, true, true, false];
		let h = histogram(&samples, &valid, 3, 0.0, 3.0);
		// bins: [0,1) [1,2) [2,3]
		assert_eq!(h.counts, vec![1.0, 1.0, 1.0]);
	}

	#[test]
	fn last_bin_is_closed_both_ends() {
		let samples = [3.0];
		let valid = [true];
		let h = histogram(&samples, &valid, 3, 0.0, 3.0);
		assert_eq!(h.counts, vec![0.0, 0.0, 1.0]);
	}

	#[test]
	fn percentile_is_monotone_in_p() {
		let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
		let valid = vec![true; 100];
		let h = histogram(&samples, &valid, 100, 0.0, 100.0);
		let p10 = percentile(&h, 0.1).unwrap();
		let p90 = percentile(&h, 0.9).unwrap();
		assert!(p10 < p90);
	}

	#[test]
	fn normalization_preserves_shape() {
		let samples = [1.0, 1.0, 2.0, 3.0];
		let valid = [true; 4];
		let h = histogram(&samples, &valid, 3, 1.0, 4.0);
		let n = h.normalized();
		assert!((n.total() - 1.0).abs() < 1e-12);
	}
}
