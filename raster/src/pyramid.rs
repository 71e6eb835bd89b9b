//! Pyramid Resolver: picks a pyramid level and in-level scale for a
//! requested resolution. See SPEC_FULL.md §4.G, §3.1.

use crate::error::{RasterError, RasterResult};

/// One row of a coverage's level chain. Level 0 is the base resolution;
/// `r_k = r0 * 2^k` is implied, not stored redundantly by callers that
/// build a chain programmatically, but the resolver only ever reads
/// the slice it is given.
#[derive(Copy, Clone, Debug)]
pub struct PyramidLevel {
	pub level: u32,
	pub x_resolution: f64,
	pub y_resolution: f64,
}

const SCALES: [u32; 4] = [1, 2, 4, 8];

/// Picks the coarsest level `k` (largest base resolution) whose base
/// `levels[k].x_resolution` still does not exceed `requested`, then within
/// that level picks the largest scale in `{1,2,4,8}` whose effective
/// resolution does not exceed the request. This reads the least data that
/// still satisfies the request, falling back to a larger in-level scale
/// only once no coarser level qualifies. `NoMatch` if the requested
/// resolution is finer than every level's base (i.e. finer than level 0 at
/// scale 1).
pub fn resolve(levels: &[PyramidLevel], requested_x_resolution: f64) -> RasterResult<(u32, u32)> {
	if levels.is_empty() {
		return Err(RasterError::NoMatch);
	}

	let mut sorted: Vec<&PyramidLevel> = levels.iter().collect();
	sorted.sort_by(|a, b| a.level.cmp(&b.level));

	let chosen_level = sorted
		.iter()
		.take_while(|l| l.x_resolution <= requested_x_resolution)
		.last()
		.ok_or(RasterError::NoMatch)?;

	// Within the level, the largest scale whose effective resolution is
	// still <= requested is the closest without exceeding.
	let mut best_scale = 1;
	for &scale in &SCALES {
		let effective = chosen_level.x_resolution * scale as f64;
		if effective <= requested_x_resolution {
			best_scale = scale;
		} else {
			break;
		}
	}

	Ok((chosen_level.level, best_scale))
}
