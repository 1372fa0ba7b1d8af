//! Automatic SAR flood-extent classification.
//!
//! Given a speckle-filtered Sentinel-1 backscatter scene (as digital numbers) and a
//! co-registered digital elevation model, this crate locates a global separating
//! threshold via tiled Kittler–Illingworth minimum-error thresholding, fuses
//! backscatter/elevation/slope/blob-size evidence with fuzzy logic, and resolves the
//! fused evidence into a WATER/LAND/NODATA raster via a two-level flood fill.
//!
//! The crate is I/O-agnostic: callers supply georeferenced pixel data through the
//! [`raster::RasterReader`]/[`raster::RasterWriter`]/[`raster::CoordTransform`] seams, and
//! `floodc` is the GDAL-backed command-line front end built on top of it.

pub mod blob;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod histogram;
pub mod kittler_illingworth;
pub mod pipeline;
pub mod raster;
pub mod scratch;
pub mod segmentation;
pub mod selector;
pub mod stats;
pub mod threshold;
pub mod tile;

pub use config::PipelineConfig;
pub use error::{FloodError, FloodResult};
pub use pipeline::{Pipeline, PipelineOutput};
pub use segmentation::Label;
