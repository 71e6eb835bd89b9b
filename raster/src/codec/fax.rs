//! CCITT Group 3/4 fax tile codec: Monochrome (Bit1, 1 band) only,
//! whole-tile, odd-only. See SPEC_FULL.md S1 for the bit-exact roundtrip
//! scenario this must satisfy.

use fax::Color;

use super::header::{BlobHeader, ODD_MAGIC};
use crate::{
	error::{RasterError, RasterResult},
	sample::{PixelKind, SampleKind},
	tile::Tile,
};

pub(super) fn encode(tile: &Tile, four: bool) -> RasterResult<(Vec<u8>, Vec<u8>)> {
	if tile.sample_kind() != SampleKind::Bit1 || tile.pixel_kind() != PixelKind::Monochrome {
		return Err(RasterError::UnsupportedCompression);
	}

	let width = tile.width() as usize;
	let height = tile.height() as usize;
	let rows: Vec<Vec<Color>> = tile
		.buffer()
		.chunks_exact(width)
		.map(|row| row.iter().map(|&bit| if bit == 0 { Color::White } else { Color::Black }).collect())
		.collect();

	let mut payload = Vec::new();
	let mut encoder = fax::encoder::Encoder::new(&mut payload);
	for row in &rows {
		if four {
			encoder.encode_2d(row);
		} else {
			encoder.encode_1d(row);
		}
	}
	encoder.finish();

	let compression = if four { super::Compression::CcittFax4 } else { super::Compression::CcittFax3 };

	let header = BlobHeader {
		little_endian: cfg!(target_endian = "little"),
		compression,
		sample: tile.sample_kind(),
		pixel: tile.pixel_kind(),
		bands: tile.band_count(),
		width: width as u32,
		height: height as u32,
		has_mask: false,
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

	let width = header.width as usize;
	let height = header.height as usize;
	let mut buffer = vec![0u8; width * height];

	let decode_row = |row: usize, colors: &[Color]| {
		for (col, color) in colors.iter().enumerate() {
			buffer[row * width + col] = matches!(color, Color::Black) as u8;
		}
	};

	let four = header.compression == super::Compression::CcittFax4;
	let mut decoder = fax::decoder::Decoder::new(width);
	let mut row = 0usize;
	let mut cursor = payload;
	while row < height {
		let colors = if four {
			decoder.decode_2d(&mut cursor).map_err(|e| RasterError::DecoderFailure(format!("fax4: {:?}", e)))?
		} else {
			decoder.decode_1d(&mut cursor).map_err(|e| RasterError::DecoderFailure(format!("fax3: {:?}", e)))?
		};
		decode_row(row, &colors);
		row += 1;
	}

	let no_data = header.read_no_data(odd_blob)?;
	Tile::create(header.width, header.height, header.sample, header.pixel, header.bands, buffer, None, None, no_data)
}
