//! Tiled statistics engine (spec.md §4.E).
//!
//! Resolves spec.md §9's axis-order open question: the statistics table is always
//! `[row][col]` (row = y, col = x), and `TileGrid::divide` enumerates tiles in the same
//! row-major order, so `StatsTable`'s backing `Vec` and the grid's tile order agree
//! index-for-index.

use rayon::prelude::*;

use crate::{
	histogram::{mean, stddev},
	raster::Raster,
	tile::TileGrid,
};

/// The per-tile mean/stddev table (spec.md §3 "Tile statistics table"), indexed
/// `[row * cols + col]`.
#[derive(Debug, Clone)]
pub struct StatsTable {
	pub rows: u32,
	pub cols: u32,
	pub mean: Vec<f32>,
	pub stddev: Vec<f32>,
	pub valid: Vec<bool>,
}

impl StatsTable {
	#[inline]
	pub fn index(&self, row: u32, col: u32) -> usize {
		(row as usize) * (self.cols as usize) + (col as usize)
	}

	pub fn get(&self, row: u32, col: u32) -> Option<(f32, f32)> {
		let idx = self.index(row, col);
		self.valid[idx].then(|| (self.mean[idx], self.stddev[idx]))
	}
}

/// Compute tile statistics over `raster`'s full extent using `grid`'s tile boundaries
/// (spec.md §4.E). `min_percent_valid` is the per-quadrant coverage threshold (spec.md §6
/// `MIN_PERCENT_VALID`, default 0.9).
///
/// Each grid tile is split into four quadrants; a quadrant is kept only if its fraction of
/// valid pixels is ≥ `min_percent_valid`. With ≥ 1 kept quadrant, the tile's mean is the
/// mean of kept-quadrant means and its stddev is the population stddev of kept-quadrant
/// means; a non-positive tile mean or zero kept quadrants mark the tile invalid.
///
/// Tiles are processed in parallel via `rayon`; tiles are disjoint so each is computed
/// exactly once with no shared mutable state, matching the tile-parallel model of spec.md
/// §5.
pub fn compute_tile_stats(raster: &Raster<f32>, grid: &TileGrid, min_percent_valid: f64) -> StatsTable {
	let results: Vec<(f32, f32, bool)> = grid
		.iter()
		.collect::<Vec<_>>()
		.par_iter()
		.map(|tile| tile_stats_one(raster, tile.roi.x, tile.roi.y, tile.roi.width, tile.roi.height, min_percent_valid))
		.collect();

	let mut mean_out = Vec::with_capacity(results.len());
	let mut stddev_out = Vec::with_capacity(results.len());
	let mut valid_out = Vec::with_capacity(results.len());
	for (m, s, v) in results {
		mean_out.push(m);
		stddev_out.push(s);
		valid_out.push(v);
	}

	StatsTable { rows: grid.rows, cols: grid.cols, mean: mean_out, stddev: stddev_out, valid: valid_out }
}

fn tile_stats_one(raster: &Raster<f32>, x: u32, y: u32, width: u32, height: u32, min_percent_valid: f64) -> (f32, f32, bool) {
	let half_w = width / 2;
	let half_h = height / 2;

	// Four quadrants; trailing remainder (odd width/height) folds into the second half so
	// every pixel in the tile belongs to exactly one quadrant.
	let quadrants = [
		(x, y, half_w, half_h),
		(x + half_w, y, width - half_w, half_h),
		(x, y + half_h, half_w, height - half_h),
		(x + half_w, y + half_h, width - half_w, height - half_h),
	];

	let mut kept_means = Vec::with_capacity(4);
	for (qx, qy, qw, qh) in quadrants {
		if qw == 0 || qh == 0 {
			continue;
		}
		let mut samples = Vec::with_capacity((qw as usize) * (qh as usize));
		let mut valid = Vec::with_capacity(samples.capacity());
		for yy in qy..qy + qh {
			for xx in qx..qx + qw {
				if let Some(v) = raster.get(xx, yy) {
					samples.push(v);
					valid.push(true);
				} else {
					samples.push(0.0);
					valid.push(false);
				}
			}
		}
		let valid_fraction = valid.iter().filter(|&&v| v).count() as f64 / valid.len().max(1) as f64;
		if valid_fraction >= min_percent_valid {
			if let Some(m) = mean(&samples, &valid) {
				kept_means.push(m);
			}
		}
	}

	if kept_means.is_empty() {
		return (0.0, 0.0, false);
	}

	let kept_valid = vec![true; kept_means.len()];
	let kept_f32: Vec<f32> = kept_means.iter().map(|&m| m as f32).collect();
	let tile_mean = mean(&kept_f32, &kept_valid).unwrap();
	let tile_stddev = stddev(&kept_f32, &kept_valid).unwrap_or(0.0);

	if tile_mean <= 0.0 {
		(tile_mean as f32, tile_stddev as f32, false)
	} else {
		(tile_mean as f32, tile_stddev as f32, true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tile::Roi;

	fn constant_raster(width: u32, height: u32, value: f32) -> Raster<f32> {
		Raster::new(width, height, value, None)
	}

	#[test]
	fn identical_quadrants_yield_zero_stddev() {
		let raster = constant_raster(256, 256, 42.0);
		let grid = TileGrid::divide(Roi::new(0, 0, 256, 256), 256, true);
		let table = compute_tile_stats(&raster, &grid, 0.9);
		let (m, s) = table.get(0, 0).unwrap();
		assert_eq!(m, 42.0);
		assert_eq!(s, 0.0);
	}

	#[test]
	fn all_invalid_tile_is_marked_invalid() {
		let mut raster = constant_raster(256, 256, 42.0);
		for y in 0..256 {
			for x in 0..256 {
				raster.invalidate(x, y);
			}
		}
		let grid = TileGrid::divide(Roi::new(0, 0, 256, 256), 256, true);
		let table = compute_tile_stats(&raster, &grid, 0.9);
		assert_eq!(table.get(0, 0), None);
	}

	#[test]
	fn nonpositive_mean_invalidates_tile() {
		let raster = constant_raster(256, 256, -5.0);
		let grid = TileGrid::divide(Roi::new(0, 0, 256, 256), 256, true);
		let table = compute_tile_stats(&raster, &grid, 0.9);
		assert_eq!(table.get(0, 0), None);
	}

	#[test]
	fn axis_order_matches_grid_row_major_order() {
		// A raster with a distinct value per tile column lets us check that table[row][col]
		// lines up with the grid's own (row, col) tile addressing.
		let mut raster = constant_raster(512, 256, 1.0);
		for y in 0..256 {
			for x in 256..512 {
				raster.set(x, y, 2.0);
			}
		}
		let grid = TileGrid::divide(Roi::new(0, 0, 512, 256), 256, true);
		let table = compute_tile_stats(&raster, &grid, 0.9);
		assert_eq!(table.get(0, 0).unwrap().0, 1.0);
		assert_eq!(table.get(0, 1).unwrap().0, 2.0);
	}
}
