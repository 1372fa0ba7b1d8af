//! Piecewise-quadratic fuzzy membership functions (spec.md §4.C).

/// Z-shape (high→low) membership: 1 below `a`, 0 above `b`, quadratic in between.
/// Requires `a < b`.
pub fn z_shape(v: f32, a: f32, b: f32) -> f32 {
	debug_assert!(a < b, "z_shape requires a < b");
	let c = (a + b) / 2.0;
	let d = b - a;

	if v < a {
		1.0
	} else if v < c {
		1.0 - 2.0 * ((v - a) / d).powi(2)
	} else if v < b {
		2.0 * ((v - b) / d).powi(2)
	} else {
		0.0
	}
}

/// S-shape (low→high) membership: the mirror image of [`z_shape`]: 0 below `a`, 1 above
/// `b`. Requires `a < b`.
pub fn s_shape(v: f32, a: f32, b: f32) -> f32 {
	1.0 - z_shape(v, a, b)
}

/// Apply [`z_shape`] to an optional (possibly invalid) scalar. `None` propagates.
pub fn z_shape_opt(v: Option<f32>, a: f32, b: f32) -> Option<f32> {
	v.map(|v| z_shape(v, a, b))
}

/// Apply [`s_shape`] to an optional (possibly invalid) scalar. `None` propagates.
pub fn s_shape_opt(v: Option<f32>, a: f32, b: f32) -> Option<f32> {
	v.map(|v| s_shape(v, a, b))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn z_and_s_sum_to_one_everywhere() {
		let (a, b) = (10.0f32, 20.0);
		for i in -50..100 {
			let v = i as f32 * 0.5;
			let z = z_shape(v, a, b);
			let s = s_shape(v, a, b);
			assert!((z + s - 1.0).abs() < 1e-6, "v={v} z={z} s={s}");
		}
	}

	#[test]
	fn z_shape_endpoints() {
		assert_eq!(z_shape(0.0, 10.0, 20.0), 1.0);
		assert_eq!(z_shape(25.0, 10.0, 20.0), 0.0);
		assert_eq!(z_shape(15.0, 10.0, 20.0), 0.5);
	}

	#[test]
	fn invalid_input_propagates() {
		assert_eq!(z_shape_opt(None, 0.0, 1.0), None);
		assert_eq!(s_shape_opt(None, 0.0, 1.0), None);
	}

	#[test]
	fn monotone_z_decreasing_s_increasing() {
		let (a, b) = (0.0f32, 10.0);
		let mut prev_z = 2.0;
		let mut prev_s = -1.0;
		for i in 0..=20 {
			let v = i as f32 * 0.5;
			let z = z_shape(v, a, b);
			let s = s_shape(v, a, b);
			assert!(z <= prev_z + 1e-6);
			assert!(s >= prev_s - 1e-6);
			prev_z = z;
			prev_s = s;
		}
	}
}
