//! Pipeline orchestrator (spec.md §4.J): sequences components A–I over a single SAR scene
//! and a co-registered DEM.

use crate::{
	blob::blob_sizes,
	config::PipelineConfig,
	error::{FloodError, FloodResult},
	fuzzy::{s_shape, z_shape},
	histogram::{mean, stddev},
	raster::{Georeference, Raster},
	segmentation::{defuzz_raster, flood_fill_two_level, Label},
	selector::{select_tiles, SelectedTile},
	stats::{compute_tile_stats, StatsTable},
	threshold::{aggregate_threshold, ThresholdDiagnostics},
	tile::{Roi, TileGrid},
};

const STAGE: &str = "pipeline";

/// Everything the orchestrator produces, beyond the final classified raster, that a
/// caller might want to inspect or persist to scratch (spec.md §6).
pub struct PipelineOutput {
	pub classified: Vec<Label>,
	pub width: u32,
	pub height: u32,
	pub georef: Option<Georeference>,
	pub preprocessed: Raster<f32>,
	pub stats: StatsTable,
	pub selected_tiles: Vec<SelectedTile>,
	pub threshold: ThresholdDiagnostics,
	pub blob_sizes: Vec<u32>,
	pub initial_mask: Vec<bool>,
}

/// Convert digital numbers to decibels: `10 * log10(v)` for `v > 0`; zero or negative DN
/// is invalid (spec.md §4.J, §6: "Pixel values equal to 0 are treated as invalid when
/// converting DN→dB, regardless of nodata declaration").
pub fn dn_to_db(dn: &Raster<f32>) -> Raster<f32> {
	let mut out = Raster::new(dn.width, dn.height, 0.0, None);
	out.georef = dn.georef.clone();
	for y in 0..dn.height {
		for x in 0..dn.width {
			match dn.get(x, y) {
				Some(v) if v > 0.0 => out.set(x, y, 10.0 * v.log10()),
				_ => out.invalidate(x, y),
			}
		}
	}
	out
}

/// 3x3 median filter, ignoring invalid neighbors; a pixel with no valid neighbors stays
/// invalid.
pub fn median_filter_3x3(raster: &Raster<f32>) -> Raster<f32> {
	let mut out = Raster::new(raster.width, raster.height, 0.0, None);
	out.georef = raster.georef.clone();
	for y in 0..raster.height {
		for x in 0..raster.width {
			let mut window = Vec::with_capacity(9);
			for dy in -1i64..=1 {
				for dx in -1i64..=1 {
					let nx = x as i64 + dx;
					let ny = y as i64 + dy;
					if nx < 0 || ny < 0 {
						continue;
					}
					if let Some(v) = raster.get(nx as u32, ny as u32) {
						window.push(v);
					}
				}
			}
			if window.is_empty() {
				out.invalidate(x, y);
			} else {
				window.sort_by(|a, b| a.partial_cmp(b).unwrap());
				out.set(x, y, window[window.len() / 2]);
			}
		}
	}
	out
}

/// Linearly rescale `raster` from `[src_min, src_max]` into `[dst_min, dst_max]`, clamping
/// to the destination range. Invalid pixels remain invalid.
pub fn rescale(raster: &Raster<f32>, src_min: f32, src_max: f32, dst_min: f32, dst_max: f32) -> Raster<f32> {
	let mut out = Raster::new(raster.width, raster.height, dst_min, None);
	out.georef = raster.georef.clone();
	let scale = (dst_max - dst_min) / (src_max - src_min);
	for y in 0..raster.height {
		for x in 0..raster.width {
			match raster.get(x, y) {
				Some(v) => {
					let mapped = (dst_min + (v - src_min) * scale).clamp(dst_min, dst_max);
					out.set(x, y, mapped);
				},
				None => out.invalidate(x, y),
			}
		}
	}
	out
}

/// Elevation fuzzy-channel parameters derived from the DEM under the initial water mask
/// (spec.md §4.J): `low = mean_water_height`, `high = mean_water_height + sigma*(sigma+3.5)`
/// where `sigma` is the stddev of DEM values under the mask, subsampled by
/// `subsample_factor` in each dimension.
pub struct ElevationParams {
	pub low: f32,
	pub high: f32,
}

pub fn elevation_params(dem: &Raster<f32>, initial_mask: &[bool], subsample_factor: u32) -> Option<ElevationParams> {
	let mut samples = Vec::new();
	let mut valid = Vec::new();
	let step = subsample_factor.max(1);
	for y in (0..dem.height).step_by(step as usize) {
		for x in (0..dem.width).step_by(step as usize) {
			let idx = (y as usize) * (dem.width as usize) + (x as usize);
			if idx >= initial_mask.len() || !initial_mask[idx] {
				continue;
			}
			match dem.get(x, y) {
				Some(v) => {
					samples.push(v);
					valid.push(true);
				},
				None => {
					samples.push(0.0);
					valid.push(false);
				},
			}
		}
	}

	let mean_water_height = mean(&samples, &valid)?;
	let stddev_water_height = stddev(&samples, &valid)?;
	let sigma = stddev_water_height as f32;
	let low = mean_water_height as f32;
	// A flat DEM under the mask (sigma == 0) would otherwise collapse low == high, which
	// z_shape/s_shape require to differ.
	let high = (low + sigma * (sigma + 3.5)).max(low + f32::EPSILON.max(1e-6));
	Some(ElevationParams { low, high })
}

/// Surface-normal slope angle in degrees, using unit x/y spacing (spec.md §4.J), via
/// central differences (Sobel-style, the same 3x3 kernel the host CLI's hillshade
/// generation used in `geoc/src/generate.rs`).
pub fn slope_degrees(dem: &Raster<f32>) -> Raster<f32> {
	let mut out = Raster::new(dem.width, dem.height, 0.0, None);
	out.georef = dem.georef.clone();
	for y in 0..dem.height {
		for x in 0..dem.width {
			let get = |dx: i64, dy: i64| -> Option<f32> {
				let nx = x as i64 + dx;
				let ny = y as i64 + dy;
				if nx < 0 || ny < 0 {
					return None;
				}
				dem.get(nx as u32, ny as u32)
			};
			let (a, b, c, d, f, g, h, i) =
				(get(-1, -1), get(0, -1), get(1, -1), get(-1, 0), get(1, 0), get(-1, 1), get(0, 1), get(1, 1));
			match (a, b, c, d, f, g, h, i) {
				(Some(a), Some(b), Some(c), Some(d), Some(f), Some(g), Some(h), Some(i)) => {
					let dzdx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / 8.0;
					let dzdy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / 8.0;
					// Unit normal is proportional to (-dzdx, -dzdy, 1); the slope angle is
					// the angle between that normal and the z axis.
					let normal_len = (dzdx * dzdx + dzdy * dzdy + 1.0).sqrt();
					let cos_angle = (1.0 / normal_len).abs();
					out.set(x, y, cos_angle.acos().to_degrees());
				},
				_ => out.invalidate(x, y),
			}
		}
	}
	out
}

/// Convert the blob-size fuzzy channel's meter bounds into pixel counts at the given
/// ground resolution. Bounds are scaled directly (not squared into an area), matching
/// spec.md's own worked example: 10 m/px, (250 m, 1000 m) -> S-shape(25, 100) (spec.md §4.J,
/// §8 scenario 4).
fn blob_size_bounds_px(min_blob_size_meters: f64, max_blob_size_meters: f64, meters_per_pixel: f64) -> (u32, u32) {
	let min_px = (min_blob_size_meters / meters_per_pixel).round() as u32;
	let max_px = (max_blob_size_meters / meters_per_pixel).round() as u32;
	(min_px, max_px)
}

/// Full pipeline execution. `sar_dn` is the raw digital-number SAR raster; `dem` is the
/// co-registered (already reprojected into `sar_dn`'s pixel grid by the caller's warping
/// collaborator; reprojection itself is out of core scope, spec.md §1) DEM raster.
/// `meters_per_pixel` gives the SAR raster's ground resolution, used to convert the
/// blob-size fuzzy bounds from meters to pixel counts.
pub struct Pipeline;

impl Pipeline {
	pub fn run(config: &PipelineConfig, sar_dn: &Raster<f32>, dem: &Raster<f32>, meters_per_pixel: f64) -> FloodResult<PipelineOutput> {
		config.validate()?;

		if sar_dn.georef.is_none() {
			return Err(FloodError::input(STAGE, "SAR raster is missing a georeference"));
		}

		log::info!("[{STAGE}] converting DN to dB and preprocessing");
		let db = dn_to_db(sar_dn);
		let filtered = median_filter_3x3(&db);
		let preprocessed = rescale(&filtered, config.global_min, config.global_max, config.proc_min, config.proc_max);

		let width = preprocessed.width;
		let height = preprocessed.height;
		let bounds = Roi::new(0, 0, width, height);
		let grid = TileGrid::divide(bounds, config.tile_size, true);

		log::info!("[{STAGE}] computing tiled statistics over {} tiles", grid.len());
		let stats = compute_tile_stats(&preprocessed, &grid, config.min_percent_valid);

		log::info!("[{STAGE}] selecting heterogeneous tiles");
		let selected = select_tiles(&stats, config.tile_stddev_percentile_cutoff, config.max_num_tiles)?;
		log::info!("[{STAGE}] {} tiles selected", selected.len());

		log::info!("[{STAGE}] aggregating global threshold");
		let threshold =
			aggregate_threshold(&preprocessed, &selected, &grid, config.proc_min as f64, config.proc_max as f64)?;
		if !threshold.passes_paper_gates() {
			log::warn!(
				"[{STAGE}] threshold diagnostics failed the paper's QA gates (stddev={:.2}, mean_abs_dev={:.2}); continuing per spec",
				threshold.per_tile_stddev,
				threshold.mean_abs_dev
			);
		}

		// Initial water mask: preprocessed value below threshold (lower backscatter ~ water).
		let mut initial_mask = vec![false; (width as usize) * (height as usize)];
		for y in 0..height {
			for x in 0..width {
				let idx = (y as usize) * (width as usize) + (x as usize);
				if let Some(v) = preprocessed.get(x, y) {
					initial_mask[idx] = (v as f64) < threshold.threshold;
				}
			}
		}

		log::info!("[{STAGE}] computing blob sizes on the initial mask");
		let (min_blob_px, max_blob_px) =
			blob_size_bounds_px(config.min_blob_size_meters, config.max_blob_size_meters, meters_per_pixel);
		let blob = blob_sizes(&initial_mask, width, height, &grid, config.tile_expand, max_blob_px.max(1));

		log::info!("[{STAGE}] deriving elevation/slope fuzzy channels");
		let elevation = elevation_params(dem, &initial_mask, config.dem_stats_subsample_factor)
			.ok_or_else(|| FloodError::algorithmic(STAGE, "no valid DEM samples under the initial water mask"))?;
		let slope = slope_degrees(dem);

		let len = (width as usize) * (height as usize);
		let mut backscatter_v = vec![0.0f32; len];
		let mut backscatter_valid = vec![false; len];
		let mut elevation_v = vec![0.0f32; len];
		let mut elevation_valid = vec![false; len];
		let mut slope_v = vec![0.0f32; len];
		let mut slope_valid = vec![false; len];
		let mut blob_v = vec![0.0f32; len];
		let mut blob_valid = vec![false; len];

		for y in 0..height {
			for x in 0..width {
				let idx = (y as usize) * (width as usize) + (x as usize);
				if let Some(v) = preprocessed.get(x, y) {
					// Backscatter channel: spec.md §4.J fixes elevation/slope/blob fuzzy
					// parameters explicitly but leaves backscatter's implicit; low
					// backscatter means water, so Z-shape from the domain floor to the
					// aggregated threshold itself is the natural choice (1 at/under
					// proc_min, 0 at/above threshold).
					backscatter_v[idx] = z_shape(v, config.proc_min, threshold.threshold as f32);
					backscatter_valid[idx] = true;
				}
				if let Some(v) = dem.get(x, y) {
					elevation_v[idx] = z_shape(v, elevation.low, elevation.high);
					elevation_valid[idx] = true;
				}
				if let Some(v) = slope.get(x, y) {
					slope_v[idx] = z_shape(v, 0.0, 15.0);
					slope_valid[idx] = true;
				}
				blob_v[idx] = s_shape(blob[idx] as f32, min_blob_px as f32, max_blob_px as f32);
				blob_valid[idx] = true;
			}
		}

		log::info!("[{STAGE}] fusing fuzzy channels and running two-level flood fill");
		let (fused, fused_valid) = defuzz_raster(
			[
				(&backscatter_v, &backscatter_valid),
				(&elevation_v, &elevation_valid),
				(&slope_v, &slope_valid),
				(&blob_v, &blob_valid),
			],
			len,
		);

		let mut classified = flood_fill_two_level(
			&fused,
			&fused_valid,
			width,
			height,
			&grid,
			config.tile_expand,
			config.final_flood_threshold,
			config.water_grow_threshold,
		);

		// Pixels that were nodata in the initial water mask's source remain NODATA
		// (spec.md §4.I: "Output is masked so that pixels that were nodata ... remain
		// NODATA").
		for y in 0..height {
			for x in 0..width {
				let idx = (y as usize) * (width as usize) + (x as usize);
				if preprocessed.get(x, y).is_none() {
					classified[idx] = Label::Nodata;
				}
			}
		}

		Ok(PipelineOutput {
			classified,
			width,
			height,
			georef: sar_dn.georef.clone(),
			preprocessed,
			stats,
			selected_tiles: selected,
			threshold,
			blob_sizes: blob,
			initial_mask,
		})
	}

	/// The documented, not-automatically-invoked retry hook (spec.md §9): run once, and on
	/// `FloodError::Algorithmic` from tile selection, retry exactly once with a halved
	/// `tile_size`.
	pub fn run_with_retry(config: &PipelineConfig, sar_dn: &Raster<f32>, dem: &Raster<f32>, meters_per_pixel: f64) -> FloodResult<PipelineOutput> {
		match Self::run(config, sar_dn, dem, meters_per_pixel) {
			Err(FloodError::Algorithmic { stage, message }) if stage == "tile_selector" => {
				log::warn!(
					"[{STAGE}] tile selection failed ({message}); retrying once with tile_size={}",
					config.with_halved_tile_size().tile_size
				);
				Self::run(&config.with_halved_tile_size(), sar_dn, dem, meters_per_pixel)
			},
			other => other,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn constant(width: u32, height: u32, value: f32) -> Raster<f32> {
		let mut r = Raster::new(width, height, value, None);
		r.georef = Some(Georeference { transform: crate::raster::Affine([0.0, 1.0, 0.0, 0.0, 0.0, -1.0]), crs: "TEST".into() });
		r
	}

	#[test]
	fn blob_size_bounds_match_spec_worked_example() {
		// spec.md §8 scenario 4: 10 m/px, (250 m, 1000 m) -> S-shape(25, 100).
		assert_eq!(blob_size_bounds_px(250.0, 1000.0, 10.0), (25, 100));
	}

	#[test]
	fn large_circular_blob_is_fully_water_membership() {
		// A ~300-pixel-diameter circular blob has area ~70,686 px, far above the 100 px
		// upper bound from the worked example, so its S-shape membership saturates at 1.
		let (_, max_px) = blob_size_bounds_px(250.0, 1000.0, 10.0);
		assert_eq!(s_shape(70_686.0, 25.0, max_px as f32), 1.0);
	}

	#[test]
	fn dn_zero_is_invalid() {
		let mut dn = constant(4, 4, 100.0);
		dn.set(0, 0, 0.0);
		let db = dn_to_db(&dn);
		assert_eq!(db.get(0, 0), None);
		assert!(db.get(1, 1).is_some());
	}

	#[test]
	fn rescale_clamps_to_destination_range() {
		let r = constant(2, 2, 1000.0);
		let out = rescale(&r, 0.0, 35.0, 0.0, 400.0);
		assert_eq!(out.get(0, 0), Some(400.0));
	}

	#[test]
	fn constant_raster_pipeline_surfaces_no_heterogeneous_tiles_error() {
		let sar = constant(1024, 1024, 100.0);
		let dem = constant(1024, 1024, 10.0);
		let config = PipelineConfig::default();
		let result = Pipeline::run(&config, &sar, &dem, 10.0);
		assert!(matches!(result, Err(FloodError::Algorithmic { .. })));
	}

	#[test]
	fn missing_georeference_is_input_error() {
		let mut sar = constant(256, 256, 100.0);
		sar.georef = None;
		let dem = constant(256, 256, 10.0);
		let config = PipelineConfig::default();
		let result = Pipeline::run(&config, &sar, &dem, 10.0);
		assert!(matches!(result, Err(FloodError::Input { .. })));
	}
}
