//! JPEG tile codec: lossy, whole-tile, odd-only. Grayscale and Rgb UInt8
//! tiles only; see SPEC_FULL.md S5 for the accepted error tolerance.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, ColorType, DynamicImage, GrayImage, ImageDecoder, RgbImage};

use super::header::{BlobHeader, ODD_MAGIC};
use crate::{
	error::{RasterError, RasterResult},
	sample::{PixelKind, SampleKind},
	tile::Tile,
};

pub(super) fn encode(tile: &Tile, quality: u8) -> RasterResult<(Vec<u8>, Vec<u8>)> {
	if tile.sample_kind() != SampleKind::UInt8 {
		return Err(RasterError::UnsupportedCompression);
	}
	let color_type = match tile.pixel_kind() {
		PixelKind::Grayscale => ColorType::L8,
		PixelKind::Rgb => ColorType::Rgb8,
		_ => return Err(RasterError::UnsupportedCompression),
	};

	let quality = if quality == 0 { 75 } else { quality };

	let mut jpeg_bytes = Vec::new();
	JpegEncoder::new_with_quality(&mut jpeg_bytes, quality)
		.encode(tile.buffer(), tile.width(), tile.height(), color_type.into())
		.map_err(|e| RasterError::EncoderFailure(format!("jpeg: {}", e)))?;

	let header = BlobHeader {
		little_endian: cfg!(target_endian = "little"),
		compression: super::Compression::Jpeg,
		sample: tile.sample_kind(),
		pixel: tile.pixel_kind(),
		bands: tile.band_count(),
		width: tile.width(),
		height: tile.height(),
		has_mask: false,
		has_nodata: tile.no_data().is_some(),
		has_palette: false,
		payload_len: jpeg_bytes.len() as u32,
		mask_len: 0,
	};

	let mut blob = header.write(ODD_MAGIC, &jpeg_bytes, &[]);
	header.write_no_data(&mut blob, tile.no_data());
	Ok((blob, Vec::new()))
}

pub(super) fn decode(odd_blob: &[u8]) -> RasterResult<Tile> {
	let (header, payload, _) = BlobHeader::parse(odd_blob, ODD_MAGIC)?;

	let decoder =
		image::codecs::jpeg::JpegDecoder::new(Cursor::new(payload)).map_err(|e| RasterError::DecoderFailure(format!("jpeg: {}", e)))?;
	let image = DynamicImage::from_decoder(decoder).map_err(|e| RasterError::DecoderFailure(format!("jpeg: {}", e)))?;

	let buffer = match header.pixel {
		PixelKind::Grayscale => {
			let gray: GrayImage = image.into_luma8();
			gray.into_raw()
		},
		PixelKind::Rgb => {
			let rgb: RgbImage = image.into_rgb8();
			rgb.into_raw()
		},
		_ => return Err(RasterError::DecoderFailure("jpeg: unsupported pixel kind in header".into())),
	};

	let no_data = header.read_no_data(odd_blob)?;
	Tile::create(header.width, header.height, header.sample, header.pixel, header.bands, buffer, None, None, no_data)
}

#[cfg(test)]
mod tests {
	use super::*;

	/// SPEC_FULL.md S5: an RGB UInt8 tile, JPEG quality 80, on a flat
	/// region must decode within 8 luma units of the source.
	#[test]
	fn jpeg_flat_region_meets_s5_tolerance() {
		let buf: Vec<u8> = (0..(32 * 32)).flat_map(|_| [120u8, 130, 140]).collect();
		let tile = Tile::create(32, 32, SampleKind::UInt8, PixelKind::Rgb, 3, buf.clone(), None, None, None).unwrap();
		let (odd, even) = encode(&tile, 80).unwrap();
		assert!(even.is_empty());
		let decoded = decode(&odd).unwrap();
		assert_eq!(decoded.buffer().len(), buf.len());
		let max_delta = decoded.buffer().iter().zip(&buf).map(|(a, b)| (*a as i16 - *b as i16).abs()).max().unwrap();
		assert!(max_delta <= 8, "JPEG delta on a flat region exceeded S5's tolerance: {}", max_delta);
	}

	#[test]
	fn jpeg_roundtrips_no_data_pixel() {
		use crate::pixel::{Pixel, Sample};

		let buf: Vec<u8> = (0..(16 * 16)).flat_map(|_| [200u8, 200, 200]).collect();
		let mut no_data = Pixel::create(SampleKind::UInt8, PixelKind::Rgb, 3).unwrap();
		no_data.set_sample(0, Sample::UInt8(0)).unwrap();
		no_data.set_sample(1, Sample::UInt8(0)).unwrap();
		no_data.set_sample(2, Sample::UInt8(0)).unwrap();
		let tile = Tile::create(16, 16, SampleKind::UInt8, PixelKind::Rgb, 3, buf, None, None, Some(no_data.clone())).unwrap();
		let (odd, _) = encode(&tile, 80).unwrap();
		let decoded = decode(&odd).unwrap();
		assert!(decoded.no_data().unwrap().compare(&no_data));
	}

	#[test]
	fn jpeg_rejects_unsupported_pixel_kind() {
		let buf = vec![0u8; 4];
		let tile = Tile::create(2, 2, SampleKind::Bit1, PixelKind::Monochrome, 1, buf, None, None, None).unwrap();
		assert!(matches!(encode(&tile, 75), Err(RasterError::UnsupportedCompression)));
	}
}
