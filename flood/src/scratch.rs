//! Scratch-directory ownership (spec.md §3 "Lifecycles", §5 "Shared resources").
//!
//! Generalizes the host CLI's `DatasetBuilder` (which owned a single open file handle for
//! the run's duration and flushed it periodically) into an owner of a whole directory of
//! per-stage scratch rasters, deleted on clean exit and left in place for inspection on
//! crash (spec.md §5).

use std::{fs, io, path::{Path, PathBuf}};

/// The canonical scratch artifact file names (spec.md §6).
pub const PREPROCESSED_IMAGE: &str = "preprocessed_image.tif";
pub const BLOB_SIZES: &str = "blob_sizes.tif";
pub const TILE_MEANS: &str = "tile_means.tif";
pub const TILE_STDDEVS: &str = "tile_stddevs.tif";
pub const INITIAL_WATER_DETECT: &str = "initial_water_detect.tif";
pub const INITIAL_KEPT_TILES: &str = "initial_kept_tiles.tif";
pub const FINAL_KEPT_TILES: &str = "final_kept_tiles.tif";

/// RAII owner of a run's scratch directory. `Drop` removes the directory unless
/// [`ScratchDir::persist`] was called first.
pub struct ScratchDir {
	path: PathBuf,
	persisted: bool,
}

impl ScratchDir {
	/// Create (or reuse, if already present) the scratch directory at `path`.
	pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
		let path = path.into();
		fs::create_dir_all(&path)?;
		Ok(Self { path, persisted: false })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn artifact(&self, name: &str) -> PathBuf {
		self.path.join(name)
	}

	/// Prevent the destructor from removing the directory; used on the crash path so
	/// scratch artifacts remain available for inspection (spec.md §5).
	pub fn persist(&mut self) {
		self.persisted = true;
	}
}

impl Drop for ScratchDir {
	fn drop(&mut self) {
		if !self.persisted {
			let _ = fs::remove_dir_all(&self.path);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drop_removes_directory_by_default() {
		let dir = std::env::temp_dir().join(format!("flood-scratch-test-{}", std::process::id()));
		{
			let scratch = ScratchDir::create(&dir).unwrap();
			assert!(scratch.path().exists());
		}
		assert!(!dir.exists());
	}

	#[test]
	fn persist_keeps_directory() {
		let dir = std::env::temp_dir().join(format!("flood-scratch-test-persist-{}", std::process::id()));
		{
			let mut scratch = ScratchDir::create(&dir).unwrap();
			scratch.persist();
		}
		assert!(dir.exists());
		let _ = fs::remove_dir_all(&dir);
	}
}
