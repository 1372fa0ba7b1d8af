//! Fuzzy fusion and two-level flood fill (spec.md §4.I).

use rayon::prelude::*;

use crate::tile::{Roi, TileGrid};

/// Classified output labels (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Label {
	Nodata = 0,
	Land = 1,
	Water = 255,
}

/// Fuse four fuzzy channels per-pixel as a veto mean (spec.md §4.I): if any channel is
/// exactly 0, the output is 0; otherwise the output is the arithmetic mean of the four.
/// Invalidity propagates: a pixel invalid in any channel is invalid in the output.
///
/// Defuzz is order-invariant (spec.md §8): this fusion is symmetric in its four inputs by
/// construction.
pub fn defuzz(channels: [Option<f32>; 4]) -> Option<f32> {
	let mut values = [0.0f32; 4];
	for (i, c) in channels.iter().enumerate() {
		values[i] = (*c)?;
	}
	if values.iter().any(|&v| v == 0.0) {
		Some(0.0)
	} else {
		Some(values.iter().sum::<f32>() / 4.0)
	}
}

/// Run [`defuzz`] over whole per-pixel channel rasters, producing the fused value raster
/// and its validity mask.
pub fn defuzz_raster(channels: [(&[f32], &[bool]); 4], len: usize) -> (Vec<f32>, Vec<bool>) {
	let mut values = vec![0.0f32; len];
	let mut valid = vec![false; len];
	for i in 0..len {
		let fused = defuzz([
			channels[0].1[i].then(|| channels[0].0[i]),
			channels[1].1[i].then(|| channels[1].0[i]),
			channels[2].1[i].then(|| channels[2].0[i]),
			channels[3].1[i].then(|| channels[3].0[i]),
		]);
		if let Some(v) = fused {
			values[i] = v;
			valid[i] = true;
		}
	}
	(values, valid)
}

/// Two-level flood fill (spec.md §4.I): seed at pixels ≥ `high`, grow via 4-connected BFS
/// through pixels ≥ `low`. Reached pixels are `Water`; other valid pixels are `Land`;
/// invalid pixels are `Nodata`.
///
/// Tile-parallel implementation mirrors [`crate::blob`]: each tile grows independently
/// within its `tile_expand`-pixel halo, which is the documented cross-tile approximation
/// (spec.md §4.I point 3).
pub fn flood_fill_two_level(
	values: &[f32],
	valid: &[bool],
	width: u32,
	height: u32,
	grid: &TileGrid,
	tile_expand: u32,
	high: f32,
	low: f32,
) -> Vec<Label> {
	let bounds = Roi::new(0, 0, width, height);

	let tile_results: Vec<(Roi, Vec<Label>)> = grid
		.iter()
		.collect::<Vec<_>>()
		.par_iter()
		.map(|tile| {
			let expanded = grid.expanded_roi(tile, tile_expand, bounds);
			let labels = flood_fill_in_roi(values, valid, width, expanded, high, low);
			(expanded, labels)
		})
		.collect();

	let mut out = vec![Label::Nodata; (width as usize) * (height as usize)];
	for (roi, labels) in tile_results {
		for (i, yy) in (roi.y..roi.y + roi.height).enumerate() {
			for (j, xx) in (roi.x..roi.x + roi.width).enumerate() {
				let global_idx = (yy as usize) * (width as usize) + (xx as usize);
				let local_idx = i * (roi.width as usize) + j;
				out[global_idx] = labels[local_idx];
			}
		}
	}
	out
}

fn flood_fill_in_roi(values: &[f32], valid: &[bool], full_width: u32, roi: Roi, high: f32, low: f32) -> Vec<Label> {
	let w = roi.width as usize;
	let h = roi.height as usize;
	let mut out = vec![Label::Nodata; w * h];
	let mut reached = vec![false; w * h];

	let global_idx = |x: u32, y: u32| -> usize { ((roi.y + y) as usize) * (full_width as usize) + ((roi.x + x) as usize) };

	// Fill LAND/NODATA baseline for valid/invalid pixels first.
	for y in 0..roi.height {
		for x in 0..roi.width {
			let g = global_idx(x, y);
			let local = (y as usize) * w + (x as usize);
			out[local] = if valid[g] { Label::Land } else { Label::Nodata };
		}
	}

	let mut stack = Vec::new();
	for y in 0..roi.height {
		for x in 0..roi.width {
			let g = global_idx(x, y);
			let local = (y as usize) * w + (x as usize);
			if valid[g] && values[g] >= high && !reached[local] {
				reached[local] = true;
				stack.push((x, y));
			}
		}
	}

	while let Some((x, y)) = stack.pop() {
		let local = (y as usize) * w + (x as usize);
		out[local] = Label::Water;

		let mut visit = |nx: i64, ny: i64, stack: &mut Vec<(u32, u32)>| {
			if nx < 0 || ny < 0 || nx >= roi.width as i64 || ny >= roi.height as i64 {
				return;
			}
			let (nx, ny) = (nx as u32, ny as u32);
			let nlocal = (ny as usize) * w + (nx as usize);
			if reached[nlocal] {
				return;
			}
			let g = global_idx(nx, ny);
			if valid[g] && values[g] >= low {
				reached[nlocal] = true;
				stack.push((nx, ny));
			}
		};

		visit(x as i64 - 1, y as i64, &mut stack);
		visit(x as i64 + 1, y as i64, &mut stack);
		visit(x as i64, y as i64 - 1, &mut stack);
		visit(x as i64, y as i64 + 1, &mut stack);
	}

	out
}
