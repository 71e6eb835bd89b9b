//! LZW, whole-tile (no odd/even split): only scale=1 is ever produced, so
//! the even blob stays empty and the odd blob carries the complete buffer.

use weezl::{decode::Decoder, encode::Encoder, BitOrder};

use super::{
	header::{BlobHeader, ODD_MAGIC},
	none::swap_element_endianness,
	Compression, HOST_LITTLE_ENDIAN,
};
use crate::{
	error::{RasterError, RasterResult},
	tile::Tile,
};

const MIN_CODE_SIZE: u8 = 8;

pub(super) fn encode(tile: &Tile, little_endian: bool) -> RasterResult<(Vec<u8>, Vec<u8>)> {
	let mut buffer = tile.buffer().to_vec();
	let width = tile.sample_kind().memory_width();
	if little_endian != HOST_LITTLE_ENDIAN {
		swap_element_endianness(&mut buffer, width);
	}

	let payload = Encoder::new(BitOrder::Msb, MIN_CODE_SIZE)
		.encode(&buffer)
		.map_err(|e| RasterError::EncoderFailure(format!("lzw: {:?}", e)))?;

	let mask = tile.mask().map(|m| m.to_vec()).unwrap_or_default();

	let header = BlobHeader {
		little_endian,
		compression: Compression::Lzw,
		sample: tile.sample_kind(),
		pixel: tile.pixel_kind(),
		bands: tile.band_count(),
		width: tile.width(),
		height: tile.height(),
		has_mask: tile.mask().is_some(),
		has_nodata: tile.no_data().is_some(),
		has_palette: false,
		payload_len: payload.len() as u32,
		mask_len: mask.len() as u32,
	};

	let mut blob = header.write(ODD_MAGIC, &payload, &mask);
	header.write_no_data(&mut blob, tile.no_data());
	Ok((blob, Vec::new()))
}

pub(super) fn decode(odd_blob: &[u8]) -> RasterResult<Tile> {
	let (header, payload, mask) = BlobHeader::parse(odd_blob, ODD_MAGIC)?;

	let mut buffer = Decoder::new(BitOrder::Msb, MIN_CODE_SIZE)
		.decode(payload)
		.map_err(|e| RasterError::DecoderFailure(format!("lzw: {:?}", e)))?;

	let width = header.sample.memory_width();
	if header.little_endian != HOST_LITTLE_ENDIAN {
		swap_element_endianness(&mut buffer, width);
	}

	let mask = header.has_mask.then(|| mask.to_vec());
	let no_data = header.read_no_data(odd_blob)?;
	Tile::create(header.width, header.height, header.sample, header.pixel, header.bands, buffer, None, mask, no_data)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sample::{PixelKind, SampleKind};

	#[test]
	fn lzw_roundtrips_integer_datagrid() {
		let buf: Vec<u8> = (0..64u32).map(|i| (i % 7) as u8).collect();
		let tile = Tile::create(8, 8, SampleKind::UInt8, PixelKind::DataGrid, 1, buf.clone(), None, None, None).unwrap();

		let (odd, even) = encode(&tile, HOST_LITTLE_ENDIAN).unwrap();
		assert!(even.is_empty());
		let decoded = decode(&odd).unwrap();
		assert_eq!(decoded.buffer(), buf.as_slice());
	}
}
