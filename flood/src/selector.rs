//! Tile selector (spec.md §4.F).

use crate::{
	error::{FloodError, FloodResult},
	histogram::{histogram, mean_f64, percentile_value},
	stats::StatsTable,
};

const STAGE: &str = "tile_selector";

/// A candidate tile, identified by its `(row, col)` in the statistics table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedTile {
	pub row: u32,
	pub col: u32,
	pub mean: f32,
	pub stddev: f32,
}

/// Select up to `max_num_tiles` high-heterogeneity, below-global-mean tiles (spec.md §4.F).
///
/// 1. `global_mean` = mean over valid tile means.
/// 2. `stddev_cutoff` = the `percentile`-th percentile of valid tile stddevs, from a
///    255-bin histogram spanning `[min, max]` of those stddevs.
/// 3. Candidates are tiles with `stddev > stddev_cutoff AND mean < global_mean`.
/// 4. If the candidate count exceeds `max_num_tiles`, keep the top `max_num_tiles` by
///    stddev (descending); otherwise return all candidates.
///
/// Returns `FloodError::Algorithmic` if no candidates survive the filter (spec.md §4.F:
/// "the pipeline surfaces a fatal 'no heterogeneous tiles' error").
pub fn select_tiles(table: &StatsTable, percentile: f64, max_num_tiles: usize) -> FloodResult<Vec<SelectedTile>> {
	let valid_means: Vec<f32> = (0..table.valid.len()).filter(|&i| table.valid[i]).map(|i| table.mean[i]).collect();
	let valid_stddevs: Vec<f32> =
		(0..table.valid.len()).filter(|&i| table.valid[i]).map(|i| table.stddev[i]).collect();

	if valid_means.is_empty() {
		return Err(FloodError::algorithmic(STAGE, "no valid tiles in statistics table"));
	}

	let valid_means_f64: Vec<f64> = valid_means.iter().map(|&m| m as f64).collect();
	let global_mean = mean_f64(&valid_means_f64).expect("checked non-empty above");

	let min_sd = valid_stddevs.iter().cloned().fold(f32::INFINITY, f32::min);
	let max_sd = valid_stddevs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
	let valid_mask = vec![true; valid_stddevs.len()];
	let sd_hist = histogram(&valid_stddevs, &valid_mask, 255, min_sd as f64, max_sd as f64);
	let stddev_cutoff = percentile_value(&sd_hist, percentile).unwrap_or(max_sd as f64);

	let mut candidates = Vec::new();
	for row in 0..table.rows {
		for col in 0..table.cols {
			let idx = table.index(row, col);
			if !table.valid[idx] {
				continue;
			}
			let m = table.mean[idx];
			let s = table.stddev[idx];
			if (s as f64) > stddev_cutoff && (m as f64) < global_mean {
				candidates.push(SelectedTile { row, col, mean: m, stddev: s });
			}
		}
	}

	if candidates.is_empty() {
		return Err(FloodError::algorithmic(STAGE, "no heterogeneous tiles found below global mean"));
	}

	if candidates.len() > max_num_tiles {
		candidates.sort_by(|a, b| a.stddev.partial_cmp(&b.stddev).unwrap());
		candidates = candidates.split_off(candidates.len() - max_num_tiles);
	}

	Ok(candidates)
}
