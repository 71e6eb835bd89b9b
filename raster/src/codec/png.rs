//! PNG tile codec: whole-tile, odd-only (no progressive even half, no
//! scale other than 1 — see SPEC_FULL.md §4.D's codec table and S4).

use std::io::Cursor;

use png::{BitDepth, ColorType};

use super::header::{BlobHeader, ODD_MAGIC};
use crate::{
	error::{RasterError, RasterResult},
	palette::{Palette, Rgba},
	sample::{PixelKind, SampleKind},
	tile::Tile,
};

pub(super) fn encode(tile: &Tile) -> RasterResult<(Vec<u8>, Vec<u8>)> {
	let bit_depth = match tile.sample_kind() {
		SampleKind::Bit1 => BitDepth::One,
		SampleKind::Bit2 => BitDepth::Two,
		SampleKind::Bit4 => BitDepth::Four,
		SampleKind::UInt8 => BitDepth::Eight,
		_ => return Err(RasterError::UnsupportedCompression),
	};

	let color_type = match tile.pixel_kind() {
		PixelKind::Monochrome | PixelKind::Grayscale => ColorType::Grayscale,
		PixelKind::Palette => ColorType::Indexed,
		PixelKind::Rgb => ColorType::Rgb,
		_ => return Err(RasterError::UnsupportedCompression),
	};

	let packed = pack_bits(tile.buffer(), tile.sample_kind().memory_width() * 8, bit_depth_bits(bit_depth), tile.width(), tile.height());

	let mut png_bytes = Vec::new();
	{
		let mut encoder = png::Encoder::new(&mut png_bytes, tile.width(), tile.height());
		encoder.set_color(color_type);
		encoder.set_depth(bit_depth);
		if let Some(palette) = tile.palette() {
			let (rgb, trns) = palette_chunks(palette);
			encoder.set_palette(rgb);
			if let Some(trns) = trns {
				encoder.set_trns(trns);
			}
		}
		let mut writer = encoder
			.write_header()
			.map_err(|e| RasterError::EncoderFailure(format!("png header: {}", e)))?;
		writer
			.write_image_data(&packed)
			.map_err(|e| RasterError::EncoderFailure(format!("png data: {}", e)))?;
	}

	let mask = tile.mask().map(|m| m.to_vec()).unwrap_or_default();
	let header = BlobHeader {
		little_endian: cfg!(target_endian = "little"),
		compression: super::Compression::Png,
		sample: tile.sample_kind(),
		pixel: tile.pixel_kind(),
		bands: tile.band_count(),
		width: tile.width(),
		height: tile.height(),
		has_mask: tile.mask().is_some(),
		has_nodata: tile.no_data().is_some(),
		has_palette: false,
		payload_len: png_bytes.len() as u32,
		mask_len: mask.len() as u32,
	};

	let mut blob = header.write(ODD_MAGIC, &png_bytes, &mask);
	header.write_no_data(&mut blob, tile.no_data());
	Ok((blob, Vec::new()))
}

pub(super) fn decode(odd_blob: &[u8], supplied_palette: Option<Palette>) -> RasterResult<Tile> {
	let (header, payload, mask) = BlobHeader::parse(odd_blob, ODD_MAGIC)?;

	let decoder = png::Decoder::new(Cursor::new(payload));
	let mut reader = decoder.read_info().map_err(|e| RasterError::DecoderFailure(format!("png header: {}", e)))?;
	let mut buf = vec![0u8; reader.output_buffer_size()];
	let info = reader.next_frame(&mut buf).map_err(|e| RasterError::DecoderFailure(format!("png data: {}", e)))?;
	buf.truncate(info.buffer_size());

	let palette = if header.pixel == PixelKind::Palette {
		match reader.info().palette.as_deref() {
			Some(rgb) => Some(palette_from_chunks(rgb, reader.info().trns.as_deref())?),
			None => supplied_palette.ok_or(RasterError::PaletteRequired)?.into(),
		}
	} else {
		None
	};

	let samples = unpack_bits(&buf, header.sample.memory_width() * 8, bit_depth_of(header.sample), header.width, header.height, header.bands);

	let mask = header.has_mask.then(|| mask.to_vec());
	let no_data = header.read_no_data(odd_blob)?;
	Tile::create(header.width, header.height, header.sample, header.pixel, header.bands, samples, palette, mask, no_data)
}

fn bit_depth_bits(depth: BitDepth) -> u32 {
	match depth {
		BitDepth::One => 1,
		BitDepth::Two => 2,
		BitDepth::Four => 4,
		BitDepth::Eight => 8,
		BitDepth::Sixteen => 16,
	}
}

fn bit_depth_of(sample: SampleKind) -> u32 {
	match sample {
		SampleKind::Bit1 => 1,
		SampleKind::Bit2 => 2,
		SampleKind::Bit4 => 4,
		_ => 8,
	}
}

fn palette_chunks(palette: &Palette) -> (Vec<u8>, Option<Vec<u8>>) {
	let mut rgb = Vec::with_capacity(palette.len() * 3);
	let mut trns = Vec::with_capacity(palette.len());
	let mut has_alpha = false;
	for e in palette.entries() {
		rgb.push(e.r);
		rgb.push(e.g);
		rgb.push(e.b);
		trns.push(e.a);
		if e.a != 255 {
			has_alpha = true;
		}
	}
	(rgb, has_alpha.then_some(trns))
}

fn palette_from_chunks(rgb: &[u8], trns: Option<&[u8]>) -> RasterResult<Palette> {
	let count = rgb.len() / 3;
	let mut palette = Palette::create(count)?;
	for (i, chunk) in rgb.chunks_exact(3).enumerate() {
		let a = trns.and_then(|t| t.get(i)).copied().unwrap_or(255);
		palette.set_entry(i, chunk[0], chunk[1], chunk[2], a)?;
	}
	Ok(palette)
}

/// Packs one-byte-per-sample source data into PNG's byte-aligned-per-row
/// bit-packed scanline layout. `_memory_width_bits` is unused for the sub-
/// byte kinds this codec supports (always 1 byte in memory); kept for
/// clarity at call sites.
fn pack_bits(samples: &[u8], _memory_width_bits: usize, bit_depth: u32, width: u32, height: u32) -> Vec<u8> {
	if bit_depth == 8 {
		return samples.to_vec();
	}
	let row_bytes = ((width as u64 * bit_depth as u64 + 7) / 8) as usize;
	let mut out = vec![0u8; row_bytes * height as usize];
	for row in 0..height as usize {
		for col in 0..width as usize {
			let sample = samples[row * width as usize + col];
			let bit_pos = col * bit_depth as usize;
			let byte_idx = row * row_bytes + bit_pos / 8;
			let shift = 8 - bit_depth as usize - (bit_pos % 8);
			out[byte_idx] |= sample << shift;
		}
	}
	out
}

fn unpack_bits(packed: &[u8], _memory_width_bits: usize, bit_depth: u32, width: u32, height: u32, bands: u8) -> Vec<u8> {
	if bit_depth == 8 {
		return packed.to_vec();
	}
	let row_bytes = ((width as u64 * bit_depth as u64 + 7) / 8) as usize;
	let mask = (1u8 << bit_depth) - 1;
	let mut out = vec![0u8; width as usize * height as usize * bands as usize];
	for row in 0..height as usize {
		for col in 0..width as usize {
			let bit_pos = col * bit_depth as usize;
			let byte_idx = row * row_bytes + bit_pos / 8;
			let shift = 8 - bit_depth as usize - (bit_pos % 8);
			out[row * width as usize + col] = (packed[byte_idx] >> shift) & mask;
		}
	}
	out
}
