//! Kittler–Illingworth minimum-error histogram thresholding (spec.md §4.B).

use crate::histogram::Histogram;

/// Result of running the optimizer on a single histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
	/// The split threshold value, `min + w * (t* - 0.5)`.
	pub threshold: f64,
	/// The bin index that minimized `J`.
	pub bin: usize,
	/// The minimized criterion value.
	pub criterion: f64,
}

/// Evaluate the Kittler–Illingworth criterion `J(t)` for every candidate split bin
/// `t` in `[1, K-1)` and return the split minimizing it. Bins where `P1`, `P2`, `σ1²`, or
/// `σ2²` are ≤ 0 are skipped (treated as `J = +∞`). Returns `None` if every candidate was
/// skipped (the failure sentinel named in spec.md §4.B/§7).
pub fn threshold(hist: &Histogram) -> Option<Split> {
	let h = hist.normalized();
	let k = h.num_bins();
	if k < 2 {
		return None;
	}
	let w = h.bin_width();
	let centers: Vec<f64> = (0..k).map(|i| h.bin_center(i)).collect();

	let mut best: Option<Split> = None;

	// Running prefix sums: mass, mass*value, mass*value^2.
	let mut prefix_mass = vec![0.0; k + 1];
	let mut prefix_mv = vec![0.0; k + 1];
	let mut prefix_mv2 = vec![0.0; k + 1];
	for i in 0..k {
		prefix_mass[i + 1] = prefix_mass[i] + h.counts[i];
		prefix_mv[i + 1] = prefix_mv[i] + h.counts[i] * centers[i];
		prefix_mv2[i + 1] = prefix_mv2[i] + h.counts[i] * centers[i] * centers[i];
	}
	let total_mass = prefix_mass[k];
	let total_mv = prefix_mv[k];
	let total_mv2 = prefix_mv2[k];

	for t in 1..k {
		let p1 = prefix_mass[t];
		let p2 = total_mass - p1;
		if p1 <= 0.0 || p2 <= 0.0 {
			continue;
		}

		let mu1 = prefix_mv[t] / p1;
		let mu2 = (total_mv - prefix_mv[t]) / p2;

		let sq1 = prefix_mv2[t] / p1 - mu1 * mu1;
		let sq2 = (total_mv2 - prefix_mv2[t]) / p2 - mu2 * mu2;
		if sq1 <= 0.0 || sq2 <= 0.0 {
			continue;
		}

		let j = 1.0 + 2.0 * (p1 * sq1.sqrt().ln() + p2 * sq2.sqrt().ln())
			- 2.0 * (p1 * p1.ln() + p2 * p2.ln());

		// Tie-break: lowest index wins, so only replace on strictly smaller criterion.
		let better = match &best {
			None => true,
			Some(b) => j < b.criterion,
		};
		if better {
			best = Some(Split { threshold: h.min_val + w * (t as f64 - 0.5), bin: t, criterion: j });
		}
	}

	best
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::histogram::histogram;

	fn gaussian(mu: f64, sigma: f64, n: usize, seed: u64) -> Vec<f32> {
		// Deterministic pseudo-random normal samples via Box-Muller over an LCG, so tests
		// don't depend on an external `rand` crate the core has no other use for.
		let mut state = seed;
		let mut next = move || {
			state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
			((state >> 33) as f64) / (u32::MAX as f64)
		};
		let mut out = Vec::with_capacity(n);
		while out.len() < n {
			let u1 = next().max(1e-12);
			let u2 = next();
			let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
			out.push((mu + sigma * z) as f32);
		}
		out
	}

	#[test]
	fn bimodal_gaussian_mixture_lands_near_midpoint() {
		let mut samples = gaussian(50.0, 5.0, 2000, 1);
		samples.extend(gaussian(150.0, 5.0, 2000, 2));
		let valid = vec![true; samples.len()];
		let hist = histogram(&samples, &valid, 256, 0.0, 255.0);
		let split = threshold(&hist).expect("should find a split");
		assert!(split.threshold >= 95.0 && split.threshold <= 105.0, "got {}", split.threshold);
	}

	#[test]
	fn threshold_invariant_to_normalization() {
		let samples: Vec<f32> = (0..256).map(|i| i as f32).collect();
		let valid = vec![true; 256];
		let raw = histogram(&samples, &valid, 64, 0.0, 256.0);
		let s1 = threshold(&raw).unwrap();
		let normalized = raw.normalized();
		let s2 = threshold(&normalized).unwrap();
		let half_bin = raw.bin_width() / 2.0;
		assert!((s1.threshold - s2.threshold).abs() <= half_bin + 1e-9);
	}

	#[test]
	fn degenerate_single_value_histogram_is_failure_sentinel() {
		let samples = [10.0; 50];
		let valid = [true; 50];
		let hist = histogram(&samples, &valid, 10, 0.0, 20.0);
		assert!(threshold(&hist).is_none());
	}

	#[test]
	fn tie_break_is_lowest_index() {
		// Two bins on either side of center with identical counts and symmetric values
		// should deterministically settle on the same split every run.
		let samples = [0.0, 0.0, 10.0, 10.0];
		let valid = [true; 4];
		let hist = histogram(&samples, &valid, 2, 0.0, 10.0);
		let a = threshold(&hist);
		let b = threshold(&hist);
		assert_eq!(a, b);
	}
}
