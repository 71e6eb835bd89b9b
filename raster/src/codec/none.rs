//! The planar odd/even partition shared by the `None`/`Deflate`/`LZMA`
//! family (SPEC_FULL.md §4.D, §9 "Progressive codec family"). Compression
//! is a post-step applied to the byte planes this module produces; the
//! partition itself is identical for all three.

use crate::{
	error::{RasterError, RasterResult},
	pixel::Pixel,
	sample::SampleKind,
	tile::{read_sample, write_sample, Tile},
};

pub(crate) struct Planes {
	pub odd: Vec<u8>,
	pub even: Vec<u8>,
	pub odd_mask: Vec<u8>,
	pub even_mask: Vec<u8>,
	pub odd_width: u32,
	pub odd_height: u32,
}

/// Splits a tile's buffer (and mask, if present) into the odd 1:2 grid and
/// the even scanline-order remainder.
pub(crate) fn split(tile: &Tile) -> Planes {
	let (width, height) = (tile.width(), tile.height());
	let stride = tile.band_count() as usize * tile.sample_kind().memory_width();
	let odd_width = (width + 1) / 2;
	let odd_height = (height + 1) / 2;

	let mut odd = Vec::with_capacity(odd_width as usize * odd_height as usize * stride);
	let mut even = Vec::new();
	let mut odd_mask = Vec::with_capacity(odd_width as usize * odd_height as usize);
	let mut even_mask = Vec::new();

	let buffer = tile.buffer();
	let mask = tile.mask();

	for row in 0..height {
		for col in 0..width {
			let idx = (row as usize * width as usize + col as usize) * stride;
			let cell = &buffer[idx..idx + stride];
			let mask_idx = row as usize * width as usize + col as usize;
			let mask_byte = mask.map(|m| m[mask_idx]).unwrap_or(1);

			if row % 2 == 0 && col % 2 == 0 {
				odd.extend_from_slice(cell);
				odd_mask.push(mask_byte);
			} else {
				even.extend_from_slice(cell);
				even_mask.push(mask_byte);
			}
		}
	}

	Planes {
		odd,
		even,
		odd_mask,
		even_mask,
		odd_width,
		odd_height,
	}
}

/// Reconstructs the full-resolution buffer (and mask) from the odd/even
/// planes: the scale=1 decode path.
pub(crate) fn merge_scale1(
	width: u32, height: u32, stride: usize, has_mask: bool, odd: &[u8], even: &[u8], odd_mask: &[u8], even_mask: &[u8],
) -> (Vec<u8>, Option<Vec<u8>>) {
	let odd_width = (width + 1) / 2;
	let mut buffer = vec![0u8; width as usize * height as usize * stride];
	let mut mask = if has_mask {
		Some(vec![0u8; width as usize * height as usize])
	} else {
		None
	};

	let mut even_cursor = 0usize;
	for row in 0..height {
		for col in 0..width {
			let dst = (row as usize * width as usize + col as usize) * stride;
			let dst_mask_idx = row as usize * width as usize + col as usize;

			if row % 2 == 0 && col % 2 == 0 {
				let odd_idx = (row / 2) as usize * odd_width as usize + (col / 2) as usize;
				let src = odd_idx * stride;
				buffer[dst..dst + stride].copy_from_slice(&odd[src..src + stride]);
				if let Some(mask) = &mut mask {
					mask[dst_mask_idx] = odd_mask[odd_idx];
				}
			} else {
				let src = even_cursor * stride;
				buffer[dst..dst + stride].copy_from_slice(&even[src..src + stride]);
				if let Some(mask) = &mut mask {
					mask[dst_mask_idx] = even_mask[even_cursor];
				}
				even_cursor += 1;
			}
		}
	}

	(buffer, mask)
}

/// Box-filter downscale over the odd plane: `block` is 1 (direct copy, for
/// scale=2), 2 (scale=4) or 4 (scale=8). No-data cells are excluded from
/// the average; if every contributor is no-data the output cell is
/// no-data too. A target mask cell is opaque iff any contributing cell is
/// opaque.
pub(crate) fn downscale_from_odd(
	odd: &[u8], odd_mask: &[u8], odd_width: u32, odd_height: u32, sample: SampleKind, bands: u8, block: u32,
	has_mask: bool, no_data: Option<&Pixel>,
) -> RasterResult<(Vec<u8>, Option<Vec<u8>>, u32, u32)> {
	let stride = bands as usize * sample.memory_width();
	let out_width = (odd_width + block - 1) / block;
	let out_height = (odd_height + block - 1) / block;

	let mut buffer = vec![0u8; out_width as usize * out_height as usize * stride];
	let mut mask = if has_mask {
		Some(vec![0u8; out_width as usize * out_height as usize])
	} else {
		None
	};

	for out_row in 0..out_height {
		for out_col in 0..out_width {
			let mut opaque = false;
			for band in 0..bands {
				let mut sum = 0.0f64;
				let mut count = 0u32;

				for dy in 0..block {
					let row = out_row * block + dy;
					if row >= odd_height {
						continue;
					}
					for dx in 0..block {
						let col = out_col * block + dx;
						if col >= odd_width {
							continue;
						}
						let idx = row as usize * odd_width as usize + col as usize;
						if band == 0 && odd_mask.get(idx).copied().unwrap_or(1) == 1 {
							opaque = true;
						}

						let cell_start = idx * stride + band as usize * sample.memory_width();
						let bytes = &odd[cell_start..cell_start + sample.memory_width()];
						let value = read_sample(sample, bytes);

						if let Some(nd) = no_data {
							if nd.get_sample(band).ok().map(|s| s.compare(value)).unwrap_or(false) {
								continue;
							}
						}

						sum += sample_to_f64(value);
						count += 1;
					}
				}

				let out_idx = out_row as usize * out_width as usize + out_col as usize;
				let out_start = out_idx * stride + band as usize * sample.memory_width();
				let out_slice = &mut buffer[out_start..out_start + sample.memory_width()];

				let value = if count == 0 {
					no_data
						.ok_or(RasterError::InvalidArgument("all contributors excluded with no no-data value to fall back to"))?
						.get_sample(band)?
				} else {
					f64_to_sample(sample, sum / count as f64)
				};
				write_sample(value, out_slice);
			}

			if let Some(mask) = &mut mask {
				let out_idx = out_row as usize * out_width as usize + out_col as usize;
				mask[out_idx] = opaque as u8;
			}
		}
	}

	Ok((buffer, mask, out_width, out_height))
}

fn sample_to_f64(sample: crate::pixel::Sample) -> f64 {
	use crate::pixel::Sample::*;
	match sample {
		Bit1(v) | Bit2(v) | Bit4(v) | UInt8(v) => v as f64,
		Int8(v) => v as f64,
		Int16(v) => v as f64,
		UInt16(v) => v as f64,
		Int32(v) => v as f64,
		UInt32(v) => v as f64,
		Float32(v) => v as f64,
		Float64(v) => v,
	}
}

/// Integer kinds round toward zero; floats keep the arithmetic mean
/// exactly.
fn f64_to_sample(kind: SampleKind, value: f64) -> crate::pixel::Sample {
	use crate::pixel::Sample::*;
	match kind {
		SampleKind::Bit1 => Bit1(value.trunc() as u8),
		SampleKind::Bit2 => Bit2(value.trunc() as u8),
		SampleKind::Bit4 => Bit4(value.trunc() as u8),
		SampleKind::Int8 => Int8(value.trunc() as i8),
		SampleKind::UInt8 => UInt8(value.trunc() as u8),
		SampleKind::Int16 => Int16(value.trunc() as i16),
		SampleKind::UInt16 => UInt16(value.trunc() as u16),
		SampleKind::Int32 => Int32(value.trunc() as i32),
		SampleKind::UInt32 => UInt32(value.trunc() as u32),
		SampleKind::Float32 => Float32(value as f32),
		SampleKind::Float64 => Float64(value),
	}
}

/// Reverses the byte order of every `width`-byte element in place; used to
/// translate the wire byte order to/from host-native for multi-byte
/// sample kinds.
pub(crate) fn swap_element_endianness(bytes: &mut [u8], width: usize) {
	if width <= 1 {
		return;
	}
	for chunk in bytes.chunks_exact_mut(width) {
		chunk.reverse();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sample::PixelKind;

	fn grid_tile(w: u32, h: u32) -> Tile {
		let buf: Vec<u8> = (0..w * h).map(|i| (i % 251) as u8).collect();
		Tile::create(w, h, SampleKind::UInt8, PixelKind::Grayscale, 1, buf, None, None, None).unwrap()
	}

	#[test]
	fn split_merge_scale1_is_lossless() {
		let tile = grid_tile(7, 5);
		let planes = split(&tile);
		let (buffer, _) = merge_scale1(7, 5, 1, false, &planes.odd, &planes.even, &planes.odd_mask, &planes.even_mask);
		assert_eq!(buffer, tile.buffer());
	}

	#[test]
	fn downscale_block1_matches_odd_plane_directly() {
		let tile = grid_tile(8, 8);
		let planes = split(&tile);
		let (buffer, _, w, h) = downscale_from_odd(
			&planes.odd,
			&planes.odd_mask,
			planes.odd_width,
			planes.odd_height,
			SampleKind::UInt8,
			1,
			1,
			false,
			None,
		)
		.unwrap();
		assert_eq!(w, planes.odd_width);
		assert_eq!(h, planes.odd_height);
		assert_eq!(buffer, planes.odd);
	}

	#[test]
	fn downscale_excludes_no_data_from_average() {
		use crate::pixel::{Pixel, Sample};

		let buf = vec![10u8, 255, 20, 30];
		let mut no_data = Pixel::create(SampleKind::UInt8, PixelKind::DataGrid, 1).unwrap();
		no_data.set_sample(0, Sample::UInt8(255)).unwrap();
		let planes = Planes {
			odd: buf,
			even: vec![],
			odd_mask: vec![1, 1, 1, 1],
			even_mask: vec![],
			odd_width: 2,
			odd_height: 2,
		};
		let (buffer, _, w, h) =
			downscale_from_odd(&planes.odd, &planes.odd_mask, 2, 2, SampleKind::UInt8, 1, 2, false, Some(&no_data)).unwrap();
		assert_eq!((w, h), (1, 1));
		// mean of {10, 20, 30}, excluding the no-data 255, truncated: 20
		assert_eq!(buffer[0], 20);
	}

	#[test]
	fn mask_downscale_is_any_opaque() {
		let tile_buf = vec![1u8; 16];
		let mask = vec![0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
		let tile = Tile::create(4, 4, SampleKind::UInt8, PixelKind::Grayscale, 1, tile_buf, None, Some(mask), None).unwrap();
		let planes = split(&tile);
		let (_, mask, _, _) = downscale_from_odd(
			&planes.odd,
			&planes.odd_mask,
			planes.odd_width,
			planes.odd_height,
			SampleKind::UInt8,
			1,
			2,
			true,
			None,
		)
		.unwrap();
		assert_eq!(mask.unwrap().iter().filter(|&&b| b == 1).count(), 1);
	}
}
