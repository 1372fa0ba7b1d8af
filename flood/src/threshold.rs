//! Global threshold aggregator (spec.md §4.G).

use crate::{
	error::{FloodError, FloodResult},
	histogram::{histogram, mean_f64, stddev_f64},
	kittler_illingworth,
	raster::Raster,
	selector::SelectedTile,
	tile::{Roi, TileGrid},
};

const STAGE: &str = "threshold_aggregator";
const NUM_BINS: usize = 255;

/// Diagnostics surfaced alongside the aggregated threshold (spec.md §9: the paper's
/// threshold-quality gates, stddev ≤ 5 dB / mean ≤ 10 dB, computed but not enforced here).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDiagnostics {
	pub threshold: f64,
	pub per_tile_stddev: f64,
	pub mean_abs_dev: f64,
}

impl ThresholdDiagnostics {
	/// Whether the paper's stddev ≤ 5 / mean ≤ 10 gates would pass. Not enforced by the
	/// aggregator itself (spec.md §9); callers may use this for logging or a QA hook.
	pub fn passes_paper_gates(&self) -> bool {
		self.per_tile_stddev <= 5.0 && self.mean_abs_dev <= 10.0
	}
}

/// Run the Kittler–Illingworth optimizer (§4.B) on each selected tile's restriction of
/// `raster`, and aggregate the per-tile thresholds into a single global threshold (the
/// arithmetic mean) plus QA diagnostics (population stddev of per-tile thresholds, and
/// the mean absolute deviation from the aggregate).
///
/// Returns `FloodError::Algorithmic` if every selected tile fails to produce a threshold
/// (spec.md §4.B/§7: the Kittler–Illingworth failure sentinel for every bin).
pub fn aggregate_threshold(
	raster: &Raster<f32>,
	tiles: &[SelectedTile],
	grid: &TileGrid,
	global_min: f64,
	global_max: f64,
) -> FloodResult<ThresholdDiagnostics> {
	let mut per_tile = Vec::with_capacity(tiles.len());

	for t in tiles {
		let Some(tile) = grid.get(t.row, t.col) else { continue };
		let Roi { x, y, width, height } = tile.roi;

		let mut samples = Vec::with_capacity((width as usize) * (height as usize));
		let mut valid = Vec::with_capacity(samples.capacity());
		for yy in y..y + height {
			for xx in x..x + width {
				if let Some(v) = raster.get(xx, yy) {
					samples.push(v);
					valid.push(true);
				} else {
					samples.push(0.0);
					valid.push(false);
				}
			}
		}

		let hist = histogram(&samples, &valid, NUM_BINS, global_min, global_max);
		if let Some(split) = kittler_illingworth::threshold(&hist) {
			per_tile.push(split.threshold);
		} else {
			log::warn!("[{STAGE}] tile ({}, {}) failed to produce a threshold", t.row, t.col);
		}
	}

	if per_tile.is_empty() {
		return Err(FloodError::algorithmic(STAGE, "all selected tiles failed Kittler-Illingworth thresholding"));
	}

	let threshold = mean_f64(&per_tile).expect("checked non-empty above");
	let per_tile_stddev = stddev_f64(&per_tile).unwrap_or(0.0);
	let mean_abs_dev = per_tile.iter().map(|&t| (t - threshold).abs()).sum::<f64>() / per_tile.len() as f64;

	Ok(ThresholdDiagnostics { threshold, per_tile_stddev, mean_abs_dev })
}
