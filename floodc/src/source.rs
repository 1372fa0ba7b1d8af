//! GDAL-backed raster I/O, generalizing `geoc::source::Raster`'s per-thread dataset
//! handle (`thread_local::ThreadLocal<Dataset>`) from "one lat/lon raster source read at
//! arbitrary resolution" into the `flood::raster::RasterReader`/`RasterWriter` seams.
//!
//! Both SAR scenes and DEMs in this pipeline are single-band `f32` rasters, so unlike the
//! host CLI's `get_data<T: GdalType>`, this reader is concrete in `f32` rather than generic.

use std::path::{Path, PathBuf};

use flood::raster::{Affine, CoordTransform, Georeference, Nodata, Raster, RasterReader, RasterWriter};
use gdal::{
	raster::{GdalType, ResampleAlg},
	Dataset, DatasetOptions, DriverManager, GdalOpenFlags,
};
use thread_local::ThreadLocal;

/// Default DEM nodata sentinel (spec.md §6: "nodata sentinel defaults to
/// -3.4028234663852886e+38 when not declared"), applied only to DEM sources via
/// [`GdalRaster::open_dem`].
pub const DEM_DEFAULT_NODATA: f32 = -3.402_823_466_385_288_6e38;

/// A single-band `f32` GDAL raster opened for windowed reads, with one `Dataset` handle
/// per thread (GDAL datasets aren't `Sync`; each rayon worker reopens its own handle on
/// first use, same as `geoc::source::Raster`).
pub struct GdalRaster {
	path: PathBuf,
	band_index: isize,
	set: ThreadLocal<Dataset>,
	width: u32,
	height: u32,
	georef: Georeference,
	nodata: Option<Nodata<f32>>,
}

impl GdalRaster {
	pub fn open(path: &Path, band_index: isize) -> Result<Self, gdal::errors::GdalError> {
		Self::open_with_default_nodata(path, band_index, None)
	}

	/// Open a DEM source, falling back to [`DEM_DEFAULT_NODATA`] when the dataset declares
	/// no nodata value of its own (spec.md §6).
	pub fn open_dem(path: &Path, band_index: isize) -> Result<Self, gdal::errors::GdalError> {
		Self::open_with_default_nodata(path, band_index, Some(DEM_DEFAULT_NODATA))
	}

	fn open_with_default_nodata(
		path: &Path,
		band_index: isize,
		default_nodata: Option<f32>,
	) -> Result<Self, gdal::errors::GdalError> {
		let dataset = Dataset::open_ex(
			path,
			DatasetOptions { open_flags: GdalOpenFlags::GDAL_OF_READONLY, ..Default::default() },
		)?;
		let transform = dataset.geo_transform()?;
		assert_eq!(transform[2], 0.0, "row rotation must be 0");
		assert_eq!(transform[4], 0.0, "column rotation must be 0");

		let (width, height) = dataset.raster_size();
		let crs = dataset.projection();
		let band = dataset.rasterband(band_index)?;
		let nodata = band.no_data_value().map(|v| Nodata(v as f32)).or(default_nodata.map(Nodata));

		let set = ThreadLocal::new();
		set.get_or(|| dataset);

		Ok(Self {
			path: path.to_path_buf(),
			band_index,
			set,
			width: width as u32,
			height: height as u32,
			georef: Georeference { transform: Affine(transform), crs },
			nodata,
		})
	}

	fn dataset(&self) -> &Dataset {
		self.set.get_or(|| Dataset::open(&self.path).expect("failed to reopen dataset on worker thread"))
	}
}

impl RasterReader<f32> for GdalRaster {
	fn dimensions(&self) -> (u32, u32) {
		(self.width, self.height)
	}

	fn read_window(&self, x: u32, y: u32, width: u32, height: u32, out_width: u32, out_height: u32) -> Option<Raster<f32>> {
		if x + width > self.width || y + height > self.height {
			return None;
		}

		let band = self.dataset().rasterband(self.band_index).ok()?;
		let buf = band
			.read_as::<f32>(
				(x as isize, y as isize),
				(width as usize, height as usize),
				(out_width as usize, out_height as usize),
				Some(ResampleAlg::NearestNeighbour),
			)
			.ok()?;

		let mut raster = Raster::new(out_width, out_height, 0.0, self.nodata);
		raster.georef = Some(self.georef.clone());
		for (i, &v) in buf.data.iter().enumerate() {
			let px = (i as u32) % out_width;
			let py = (i as u32) / out_width;
			match self.nodata {
				Some(Nodata(n)) if v == n => raster.invalidate(px, py),
				_ => raster.set(px, py, v),
			}
		}
		Some(raster)
	}

	fn georeference(&self) -> Option<&Georeference> {
		Some(&self.georef)
	}

	fn nodata(&self) -> Option<Nodata<f32>> {
		self.nodata
	}
}

/// Write access to a new single-band GDAL output, generic over the pixel type (`f32` for
/// scratch rasters, `u8` for the final classified raster per spec.md §6), created up front
/// and finalized (flushed) by [`RasterWriter::finish`].
pub struct GdalRasterWriter<T> {
	dataset: Dataset,
	nodata: T,
}

impl<T: GdalType + Copy> GdalRasterWriter<T> {
	pub fn create(path: &Path, width: u32, height: u32, georef: &Georeference, nodata: T) -> Result<Self, gdal::errors::GdalError>
	where
		f64: From<T>,
	{
		let driver = DriverManager::get_driver_by_name("GTiff")?;
		let mut dataset = driver.create_with_band_type::<T, _>(path, width as isize, height as isize, 1)?;
		dataset.set_geo_transform(&georef.transform.0)?;
		dataset.set_projection(&georef.crs)?;
		dataset.rasterband(1)?.set_no_data_value(Some(f64::from(nodata)))?;
		Ok(Self { dataset, nodata })
	}
}

impl<T: GdalType + Copy> RasterWriter<T> for GdalRasterWriter<T> {
	fn write_block(&mut self, x: u32, y: u32, block: &Raster<T>) -> std::io::Result<()> {
		let mut data = vec![self.nodata; (block.width as usize) * (block.height as usize)];
		for yy in 0..block.height {
			for xx in 0..block.width {
				let idx = (yy as usize) * (block.width as usize) + (xx as usize);
				if let Some(v) = block.get(xx, yy) {
					data[idx] = v;
				}
			}
		}

		let mut band = self
			.dataset
			.rasterband(1)
			.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
		let mut buffer = gdal::raster::Buffer::new((block.width as usize, block.height as usize), data);
		band.write((x as isize, y as isize), (block.width as usize, block.height as usize), &mut buffer)
			.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
	}

	fn finish(self) -> std::io::Result<()> {
		self.dataset.flush_cache().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
	}
}

/// Maps pixel coordinates between two independently georeferenced rasters that share a
/// geographic frame (spec.md §4.J: reprojecting the DEM into the SAR image's pixel grid).
pub struct AffineCoordTransform {
	source_to_geo: Affine,
	geo_to_target: Affine,
}

impl AffineCoordTransform {
	pub fn new(source: &Georeference, target: &Georeference) -> Self {
		Self { source_to_geo: source.transform, geo_to_target: target.transform }
	}
}

impl CoordTransform for AffineCoordTransform {
	fn map(&self, x: f64, y: f64) -> (f64, f64) {
		let (lon, lat) = self.source_to_geo.pixel_to_geo(x, y);
		self.geo_to_target.geo_to_pixel(lon, lat)
	}
}
