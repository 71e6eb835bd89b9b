use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression as Level};

use crate::error::{RasterError, RasterResult};

pub(super) fn compress(bytes: &[u8]) -> Vec<u8> {
	let mut encoder = ZlibEncoder::new(Vec::new(), Level::default());
	// A write to an in-memory Vec never fails.
	encoder.write_all(bytes).unwrap();
	encoder.finish().unwrap()
}

pub(super) fn decompress(bytes: &[u8]) -> RasterResult<Vec<u8>> {
	let mut out = Vec::new();
	ZlibDecoder::new(bytes)
		.read_to_end(&mut out)
		.map_err(|e| RasterError::DecoderFailure(format!("deflate: {}", e)))?;
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roundtrips() {
		let data = b"odd plane bytes, odd plane bytes, odd plane bytes".repeat(4);
		let compressed = compress(&data);
		assert!(compressed.len() < data.len());
		assert_eq!(decompress(&compressed).unwrap(), data);
	}

	#[test]
	fn empty_input_roundtrips() {
		let compressed = compress(&[]);
		assert_eq!(decompress(&compressed).unwrap(), Vec::<u8>::new());
	}
}
