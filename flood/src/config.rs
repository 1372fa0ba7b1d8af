//! Tunable parameters for the pipeline (spec.md §6).

use crate::error::{FloodError, FloodResult};

/// All the tunables of the detection pipeline, with spec-mandated defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
	/// Grid stride, in pixels, for the tiled statistics engine (§4.D, §4.E).
	pub tile_size: u32,
	/// Halo, in pixels, used to make blob-sizing and flood-fill tile-independent (§4.H, §4.I).
	pub tile_expand: u32,
	/// Lower bound, in meters, for the blob-size fuzzy channel (§4.J).
	pub min_blob_size_meters: f64,
	/// Upper bound, in meters, for the blob-size fuzzy channel (§4.J).
	pub max_blob_size_meters: f64,
	/// Subsampling factor applied before computing DEM statistics under the initial mask (§4.J).
	pub dem_stats_subsample_factor: u32,
	/// Seed threshold for the two-level flood fill (§4.I).
	pub final_flood_threshold: f32,
	/// Grow threshold for the two-level flood fill (§4.I).
	pub water_grow_threshold: f32,
	/// Minimum fraction of valid pixels a quadrant needs to be kept (§4.E).
	pub min_percent_valid: f64,
	/// Percentile used to compute the tile-stddev cutoff (§4.F).
	pub tile_stddev_percentile_cutoff: f64,
	/// Maximum number of tiles carried into global threshold aggregation (§4.F).
	pub max_num_tiles: usize,
	/// Lower bound of the rescaled processing domain (§4.J).
	pub proc_min: f32,
	/// Upper bound of the rescaled processing domain (§4.J).
	pub proc_max: f32,
	/// dB value mapped to `proc_min` (§4.J).
	pub global_min: f32,
	/// dB value mapped to `proc_max` (§4.J).
	pub global_max: f32,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			tile_size: 512,
			tile_expand: 256,
			min_blob_size_meters: 250.0,
			max_blob_size_meters: 1000.0,
			dem_stats_subsample_factor: 10,
			final_flood_threshold: 0.60,
			water_grow_threshold: 0.45,
			min_percent_valid: 0.9,
			tile_stddev_percentile_cutoff: 0.95,
			max_num_tiles: 5,
			proc_min: 0.0,
			proc_max: 400.0,
			global_min: 0.0,
			global_max: 35.0,
		}
	}
}

impl PipelineConfig {
	/// Validate the configuration, returning `FloodError::Configuration` on the first
	/// violated invariant.
	pub fn validate(&self) -> FloodResult<()> {
		const STAGE: &str = "config";

		if self.tile_size == 0 {
			return Err(FloodError::config(STAGE, "tile_size must be > 0"));
		}
		if self.dem_stats_subsample_factor == 0 {
			return Err(FloodError::config(STAGE, "dem_stats_subsample_factor must be > 0"));
		}
		if !(0.0..=1.0).contains(&self.min_percent_valid) {
			return Err(FloodError::config(STAGE, "min_percent_valid must be in [0, 1]"));
		}
		if !(0.0..=1.0).contains(&self.tile_stddev_percentile_cutoff) {
			return Err(FloodError::config(
				STAGE,
				"tile_stddev_percentile_cutoff must be in [0, 1]",
			));
		}
		if self.max_num_tiles == 0 {
			return Err(FloodError::config(STAGE, "max_num_tiles must be > 0"));
		}
		if !(0.0..=1.0).contains(&self.final_flood_threshold)
			|| !(0.0..=1.0).contains(&self.water_grow_threshold)
		{
			return Err(FloodError::config(
				STAGE,
				"flood-fill thresholds must be in [0, 1]",
			));
		}
		if self.water_grow_threshold >= self.final_flood_threshold {
			return Err(FloodError::config(
				STAGE,
				"water_grow_threshold must be strictly less than final_flood_threshold",
			));
		}
		if self.min_blob_size_meters >= self.max_blob_size_meters {
			return Err(FloodError::config(
				STAGE,
				"min_blob_size_meters must be strictly less than max_blob_size_meters",
			));
		}
		if self.proc_min >= self.proc_max || self.global_min >= self.global_max {
			return Err(FloodError::config(STAGE, "rescaling bounds must be non-degenerate"));
		}

		Ok(())
	}

	/// The documented, not-automatically-invoked retry hook (spec.md §9): a copy of this
	/// configuration with `tile_size` halved (floor, minimum 1).
	pub fn with_halved_tile_size(&self) -> Self {
		Self { tile_size: (self.tile_size / 2).max(1), ..*self }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		PipelineConfig::default().validate().unwrap();
	}

	#[test]
	fn rejects_zero_tile_size() {
		let mut cfg = PipelineConfig::default();
		cfg.tile_size = 0;
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn rejects_inverted_flood_thresholds() {
		let mut cfg = PipelineConfig::default();
		cfg.water_grow_threshold = cfg.final_flood_threshold;
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn halved_tile_size_floors_and_floors_at_one() {
		let cfg = PipelineConfig { tile_size: 512, ..Default::default() };
		assert_eq!(cfg.with_halved_tile_size().tile_size, 256);

		let cfg = PipelineConfig { tile_size: 1, ..Default::default() };
		assert_eq!(cfg.with_halved_tile_size().tile_size, 1);
	}
}
