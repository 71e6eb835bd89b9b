//! WebP tile codec (lossless and lossy): whole-tile, odd-only. Grayscale
//! and Rgb UInt8 tiles only. Mirrors the encode/decode pattern the
//! terrain dataset's height tiles use, generalized to arbitrary
//! dimensions and to both color kinds.

use libwebp_sys::{
	WebPDecodeRGBAInto,
	WebPEncode,
	WebPImageHint::WEBP_HINT_GRAPH,
	WebPInitConfig,
	WebPPicture,
	WebPPictureImportRGBA,
	WebPPictureInit,
};

use super::header::{BlobHeader, ODD_MAGIC};
use crate::{
	error::{RasterError, RasterResult},
	sample::{PixelKind, SampleKind},
	tile::Tile,
};

pub(super) fn encode(tile: &Tile, quality: Option<u8>) -> RasterResult<(Vec<u8>, Vec<u8>)> {
	if tile.sample_kind() != SampleKind::UInt8 || !matches!(tile.pixel_kind(), PixelKind::Grayscale | PixelKind::Rgb) {
		return Err(RasterError::UnsupportedCompression);
	}

	let rgba = tile.to_rgba()?;
	let payload = unsafe { encode_rgba(&rgba, tile.width(), tile.height(), quality)? };

	let compression = if quality.is_some() {
		super::Compression::WebpLossy
	} else {
		super::Compression::WebpLossless
	};

	let header = BlobHeader {
		little_endian: cfg!(target_endian = "little"),
		compression,
		sample: tile.sample_kind(),
		pixel: tile.pixel_kind(),
		bands: tile.band_count(),
		width: tile.width(),
		height: tile.height(),
		has_mask: tile.mask().is_some(),
		has_nodata: tile.no_data().is_some(),
		has_palette: false,
		payload_len: payload.len() as u32,
		mask_len: 0,
	};

	let mut blob = header.write(ODD_MAGIC, &payload, &[]);
	header.write_no_data(&mut blob, tile.no_data());
	Ok((blob, Vec::new()))
}

pub(super) fn decode(odd_blob: &[u8]) -> RasterResult<Tile> {
	let (header, payload, _) = BlobHeader::parse(odd_blob, ODD_MAGIC)?;

	let rgba = unsafe { decode_rgba(payload, header.width, header.height)? };

	let pixels = (header.width * header.height) as usize;
	let mut buffer = vec![0u8; pixels * header.bands as usize];
	let mut mask = header.has_mask.then(|| vec![0u8; pixels]);

	for i in 0..pixels {
		let px = &rgba[i * 4..i * 4 + 4];
		match header.pixel {
			PixelKind::Grayscale => buffer[i] = px[0],
			PixelKind::Rgb => buffer[i * 3..i * 3 + 3].copy_from_slice(&px[0..3]),
			_ => return Err(RasterError::DecoderFailure("webp: unsupported pixel kind in header".into())),
		}
		if let Some(mask) = &mut mask {
			mask[i] = if px[3] == 0 { 0 } else { 1 };
		}
	}

	let no_data = header.read_no_data(odd_blob)?;
	Tile::create(header.width, header.height, header.sample, header.pixel, header.bands, buffer, None, mask, no_data)
}

unsafe fn encode_rgba(rgba: &[u8], width: u32, height: u32, quality: Option<u8>) -> RasterResult<Vec<u8>> {
	let mut out = Vec::new();

	let mut config = std::mem::zeroed();
	WebPInitConfig(&mut config);
	match quality {
		Some(q) => {
			config.lossless = 0;
			config.quality = q as f32;
		},
		None => {
			config.lossless = 1;
			config.quality = 100.0;
		},
	}
	config.method = 4;
	config.image_hint = WEBP_HINT_GRAPH;
	config.exact = 1;

	let mut picture = std::mem::zeroed();
	WebPPictureInit(&mut picture);
	picture.use_argb = 1;
	picture.writer = Some(write_to_vec);
	picture.custom_ptr = &mut out as *mut _ as _;
	picture.width = width as i32;
	picture.height = height as i32;

	if WebPPictureImportRGBA(&mut picture, rgba.as_ptr(), width as i32 * 4) == 0 {
		return Err(RasterError::EncoderFailure("webp: ImportRGBA failed".into()));
	}

	if WebPEncode(&config, &mut picture) == 0 {
		return Err(RasterError::EncoderFailure(format!("webp: WebPEncode failed ({})", picture.error_code as i32)));
	}

	Ok(out)
}

unsafe extern "C" fn write_to_vec(data: *const u8, data_size: usize, picture: *const WebPPicture) -> i32 {
	let vec = &mut *((*picture).custom_ptr as *mut Vec<u8>);
	vec.extend_from_slice(std::slice::from_raw_parts(data, data_size));
	1
}

unsafe fn decode_rgba(data: &[u8], width: u32, height: u32) -> RasterResult<Vec<u8>> {
	let mut decoded = vec![0u8; width as usize * height as usize * 4];
	if WebPDecodeRGBAInto(
		data.as_ptr(),
		data.len(),
		decoded.as_mut_ptr(),
		decoded.len(),
		width as i32 * 4,
	)
	.is_null()
	{
		return Err(RasterError::DecoderFailure("webp: WebPDecodeRGBAInto failed".into()));
	}
	Ok(decoded)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn webp_lossless_roundtrips_grayscale() {
		let buf: Vec<u8> = (0..(16 * 16)).map(|i| (i % 256) as u8).collect();
		let tile = Tile::create(16, 16, SampleKind::UInt8, PixelKind::Grayscale, 1, buf.clone(), None, None, None).unwrap();
		let (odd, even) = encode(&tile, None).unwrap();
		assert!(even.is_empty());
		let decoded = decode(&odd).unwrap();
		assert_eq!(decoded.buffer(), buf.as_slice());
	}

	#[test]
	fn webp_rejects_unsupported_kind() {
		let buf = vec![0u8; 4];
		let tile = Tile::create(2, 2, SampleKind::UInt16, PixelKind::Multiband, 2, buf, None, None, None).unwrap();
		assert!(matches!(encode(&tile, None), Err(RasterError::UnsupportedCompression)));
	}
}
