//! Tile grid partitioning (spec.md §4.D).

/// An axis-aligned integer bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl Roi {
	pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
		Self { x, y, width, height }
	}
}

/// A single cell of a `TileGrid`: its row/column index and its pixel ROI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
	pub row: u32,
	pub col: u32,
	pub roi: Roi,
}

/// A row-major grid of tiles over an image bounding box.
#[derive(Debug, Clone)]
pub struct TileGrid {
	pub rows: u32,
	pub cols: u32,
	tiles: Vec<Tile>,
}

impl TileGrid {
	/// Partition `roi` into `size`×`size` tiles. Edge tiles are clipped to `roi`'s extent
	/// when `include_partials` is true, otherwise discarded. Tiles are enumerated in
	/// row-major order: tile `(r, c)` has origin `(roi.x + c * size, roi.y + r * size)`.
	pub fn divide(roi: Roi, size: u32, include_partials: bool) -> Self {
		assert!(size > 0, "tile size must be > 0");

		let full_cols = roi.width / size;
		let full_rows = roi.height / size;
		let has_partial_col = roi.width % size != 0;
		let has_partial_row = roi.height % size != 0;

		let cols = if include_partials && has_partial_col { full_cols + 1 } else { full_cols };
		let rows = if include_partials && has_partial_row { full_rows + 1 } else { full_rows };

		let mut tiles = Vec::with_capacity((rows as usize) * (cols as usize));
		for r in 0..rows {
			for c in 0..cols {
				let x = roi.x + c * size;
				let y = roi.y + r * size;
				let width = size.min(roi.x + roi.width - x);
				let height = size.min(roi.y + roi.height - y);
				tiles.push(Tile { row: r, col: c, roi: Roi::new(x, y, width, height) });
			}
		}

		Self { rows, cols, tiles }
	}

	pub fn len(&self) -> usize {
		self.tiles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tiles.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Tile> {
		self.tiles.iter()
	}

	pub fn get(&self, row: u32, col: u32) -> Option<&Tile> {
		if row >= self.rows || col >= self.cols {
			return None;
		}
		self.tiles.get((row * self.cols + col) as usize)
	}

	/// Expand every tile's ROI by `halo` pixels on each side, clipped to `bounds`
	/// (spec.md §4.H, §4.I tile-expansion approximation).
	pub fn expanded_roi(&self, tile: &Tile, halo: u32, bounds: Roi) -> Roi {
		let x0 = tile.roi.x.saturating_sub(halo).max(bounds.x);
		let y0 = tile.roi.y.saturating_sub(halo).max(bounds.y);
		let x1 = (tile.roi.x + tile.roi.width + halo).min(bounds.x + bounds.width);
		let y1 = (tile.roi.y + tile.roi.height + halo).min(bounds.y + bounds.height);
		Roi::new(x0, y0, x1 - x0, y1 - y0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_division_has_no_partials() {
		let grid = TileGrid::divide(Roi::new(0, 0, 1024, 1024), 256, true);
		assert_eq!(grid.rows, 4);
		assert_eq!(grid.cols, 4);
		assert_eq!(grid.len(), 16);
	}

	#[test]
	fn partials_included_when_requested() {
		let grid = TileGrid::divide(Roi::new(0, 0, 1000, 1000), 256, true);
		assert_eq!(grid.cols, 4);
		let edge = grid.get(0, 3).unwrap();
		assert_eq!(edge.roi.width, 1000 - 3 * 256);
	}

	#[test]
	fn partials_discarded_when_not_requested() {
		let grid = TileGrid::divide(Roi::new(0, 0, 1000, 1000), 256, false);
		assert_eq!(grid.cols, 3);
		assert_eq!(grid.rows, 3);
	}

	#[test]
	fn row_major_origins() {
		let grid = TileGrid::divide(Roi::new(0, 0, 512, 512), 256, true);
		let t = grid.get(1, 0).unwrap();
		assert_eq!((t.roi.x, t.roi.y), (0, 256));
		let t = grid.get(0, 1).unwrap();
		assert_eq!((t.roi.x, t.roi.y), (256, 0));
	}

	#[test]
	fn expanded_roi_clips_to_bounds() {
		let grid = TileGrid::divide(Roi::new(0, 0, 1024, 1024), 512, true);
		let bounds = Roi::new(0, 0, 1024, 1024);
		let tile = grid.get(0, 0).unwrap();
		let expanded = grid.expanded_roi(tile, 256, bounds);
		assert_eq!((expanded.x, expanded.y), (0, 0));
		assert_eq!((expanded.width, expanded.height), (512 + 256, 512 + 256));
	}
}
