//! Wires georeferenced raster I/O to the core pipeline: loads the SAR scene and DEM in
//! full, runs [`flood::Pipeline::run_with_retry`], and writes the classified raster plus
//! the scratch artifacts spec.md §6 names.

use std::path::{Path, PathBuf};

use flood::{
	config::PipelineConfig,
	raster::{CoordTransform, Georeference, Raster, RasterReader, RasterWriter},
	scratch, Label, Pipeline,
};

use crate::{
	common::{install_ctrlc_handler, report_stage},
	source::{AffineCoordTransform, GdalRaster, GdalRasterWriter},
};

pub struct RunArgs {
	pub input: PathBuf,
	pub dem: PathBuf,
	pub output: PathBuf,
	pub config: Option<PathBuf>,
	pub tile_size: Option<u32>,
	pub keep_scratch: bool,
	pub scratch_dir: PathBuf,
}

/// Nearest-neighbor-resample `source` into `target_georef`'s pixel grid, via `transform`
/// (spec.md §4.J: reprojecting the DEM into the preprocessed SAR image's grid).
fn reproject(source: &GdalRaster, target_width: u32, target_height: u32, target_georef: &Georeference, transform: &AffineCoordTransform) -> Raster<f32> {
	let (src_w, src_h) = source.dimensions();
	let full = source.read_window(0, 0, src_w, src_h, src_w, src_h).expect("DEM fits in memory");

	let mut out = Raster::new(target_width, target_height, 0.0, None);
	out.georef = Some(target_georef.clone());
	for y in 0..target_height {
		for x in 0..target_width {
			let (sx, sy) = transform.map(x as f64, y as f64);
			if sx < 0.0 || sy < 0.0 {
				out.invalidate(x, y);
				continue;
			}
			let (sx, sy) = (sx.round() as u32, sy.round() as u32);
			match full.get(sx, sy) {
				Some(v) => out.set(x, y, v),
				None => out.invalidate(x, y),
			}
		}
	}
	out
}

fn write_raster(path: &Path, raster: &Raster<f32>) -> std::io::Result<()> {
	let georef = raster.georef.clone().expect("scratch rasters inherit the run's georeference");
	let mut writer = GdalRasterWriter::<f32>::create(path, raster.width, raster.height, &georef, f32::MIN)
		.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
	writer.write_block(0, 0, raster)?;
	writer.finish()
}

/// Write the final classified raster as `uint8` with `nodata = 0` (spec.md §6: "Output
/// classified raster: uint8, values {0, 1, 255}, georeferenced to the input, nodata = 0").
fn write_classified_raster(path: &Path, raster: &Raster<u8>) -> std::io::Result<()> {
	let georef = raster.georef.clone().expect("classified raster inherits the input's georeference");
	let mut writer = GdalRasterWriter::<u8>::create(path, raster.width, raster.height, &georef, 0u8)
		.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
	writer.write_block(0, 0, raster)?;
	writer.finish()
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
	let cancelled = install_ctrlc_handler();

	let mut config = crate::config::load(args.config.as_deref())?;
	if let Some(tile_size) = args.tile_size {
		config.tile_size = tile_size;
	}
	config.validate()?;

	report_stage("loading SAR scene");
	let sar_source = GdalRaster::open(&args.input, 1)?;
	let (width, height) = sar_source.dimensions();
	let sar = sar_source.read_window(0, 0, width, height, width, height).ok_or("failed to read SAR scene")?;
	let sar_georef = sar.georef.clone().ok_or("SAR scene has no georeference")?;

	report_stage("loading and reprojecting DEM");
	let dem_source = GdalRaster::open_dem(&args.dem, 1)?;
	let dem_georef = dem_source.georeference().cloned().ok_or("DEM has no georeference")?;
	let transform = AffineCoordTransform::new(&sar_georef, &dem_georef);
	let dem = reproject(&dem_source, width, height, &sar_georef, &transform);

	let meters_per_pixel = sar_georef.transform.0[1].abs();

	let mut scratch_owner = scratch::ScratchDir::create(&args.scratch_dir)?;

	report_stage("running detection pipeline");
	let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
	let scope_result = crossbeam::scope(|scope| {
		let cancelled = cancelled.clone();
		let done = done.clone();
		scope.spawn(move |_| {
			use std::sync::atomic::Ordering;
			while !cancelled.load(Ordering::Acquire) && !done.load(Ordering::Acquire) {
				std::thread::sleep(std::time::Duration::from_secs(5));
				if !done.load(Ordering::Acquire) {
					report_stage("running detection pipeline (still working)");
				}
			}
		});
		let result = Pipeline::run_with_retry(&config, &sar, &dem, meters_per_pixel);
		done.store(true, std::sync::atomic::Ordering::Release);
		result
	});

	// spec.md §5: partial scratch artifacts are removed on clean failure, left for
	// inspection on crash. A panicked worker thread is the crash case and persists the
	// scratch directory before propagating; a structured `Err` from the pipeline itself is
	// a clean failure and leaves `ScratchDir::drop` to remove it.
	let output = match scope_result {
		Err(_) => {
			scratch_owner.persist();
			return Err("worker thread panicked".into());
		},
		Ok(Err(err)) => return Err(Box::new(err) as Box<dyn std::error::Error>),
		Ok(Ok(output)) => output,
	};

	println!("\nthreshold: {:.2} dB (per-tile stddev {:.2}, mean abs dev {:.2})", output.threshold.threshold, output.threshold.per_tile_stddev, output.threshold.mean_abs_dev);
	if !output.threshold.passes_paper_gates() {
		log::warn!("threshold diagnostics did not pass the paper's QA gates");
	}

	report_stage("writing scratch artifacts");
	write_raster(&scratch_owner.artifact(scratch::PREPROCESSED_IMAGE), &output.preprocessed)?;

	let mut blob_raster = Raster::new(width, height, 0.0, None);
	blob_raster.georef = Some(sar_georef.clone());
	for y in 0..height {
		for x in 0..width {
			blob_raster.set(x, y, output.blob_sizes[(y as usize) * (width as usize) + (x as usize)] as f32);
		}
	}
	write_raster(&scratch_owner.artifact(scratch::BLOB_SIZES), &blob_raster)?;

	let mut initial_water = Raster::new(width, height, 0.0, None);
	initial_water.georef = Some(sar_georef.clone());
	for y in 0..height {
		for x in 0..width {
			initial_water.set(x, y, if output.initial_mask[(y as usize) * (width as usize) + (x as usize)] { 1.0 } else { 0.0 });
		}
	}
	write_raster(&scratch_owner.artifact(scratch::INITIAL_WATER_DETECT), &initial_water)?;

	write_tile_table(&scratch_owner.artifact(scratch::TILE_MEANS), &output.stats, &sar_georef, &output.stats.mean)?;
	write_tile_table(&scratch_owner.artifact(scratch::TILE_STDDEVS), &output.stats, &sar_georef, &output.stats.stddev)?;

	// This pipeline performs a single tile-selection pass (spec.md §9 open question 1),
	// so the initial and final kept-tile scratch rasters are identical.
	write_kept_tiles(&scratch_owner.artifact(scratch::INITIAL_KEPT_TILES), &output, &sar_georef)?;
	write_kept_tiles(&scratch_owner.artifact(scratch::FINAL_KEPT_TILES), &output, &sar_georef)?;

	report_stage("writing classified output");
	let mut classified = Raster::new(width, height, 0u8, None);
	classified.georef = Some(sar_georef);
	for y in 0..height {
		for x in 0..width {
			let label = output.classified[(y as usize) * (width as usize) + (x as usize)];
			match label {
				Label::Nodata => classified.invalidate(x, y),
				Label::Land => classified.set(x, y, Label::Land as u8),
				Label::Water => classified.set(x, y, Label::Water as u8),
			}
		}
	}
	write_classified_raster(&args.output, &classified)?;

	if args.keep_scratch {
		scratch_owner.persist();
	}

	println!("\ndone");
	Ok(())
}

fn write_tile_table(path: &Path, stats: &flood::stats::StatsTable, georef: &Georeference, field: &[f32]) -> std::io::Result<()> {
	let mut raster = Raster::new(stats.cols, stats.rows, 0.0, None);
	raster.georef = Some(georef.clone());
	for row in 0..stats.rows {
		for col in 0..stats.cols {
			let idx = stats.index(row, col);
			if stats.valid[idx] {
				raster.set(col, row, field[idx]);
			} else {
				raster.invalidate(col, row);
			}
		}
	}
	write_raster(path, &raster)
}

fn write_kept_tiles(path: &Path, output: &flood::PipelineOutput, georef: &Georeference) -> std::io::Result<()> {
	let mut raster = Raster::new(output.stats.cols, output.stats.rows, 0.0, None);
	raster.georef = Some(georef.clone());
	for tile in &output.selected_tiles {
		raster.set(tile.col, tile.row, 1.0);
	}
	write_raster(path, &raster)
}
