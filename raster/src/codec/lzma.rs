use std::io::{Read, Write};

use xz2::{read::XzDecoder, write::XzEncoder};

use crate::error::{RasterError, RasterResult};

const PRESET: u32 = 6;

pub(super) fn compress(bytes: &[u8]) -> Vec<u8> {
	let mut encoder = XzEncoder::new(Vec::new(), PRESET);
	encoder.write_all(bytes).unwrap();
	encoder.finish().unwrap()
}

pub(super) fn decompress(bytes: &[u8]) -> RasterResult<Vec<u8>> {
	let mut out = Vec::new();
	XzDecoder::new(bytes)
		.read_to_end(&mut out)
		.map_err(|e| RasterError::DecoderFailure(format!("lzma: {}", e)))?;
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roundtrips() {
		let data = b"odd plane bytes, odd plane bytes, odd plane bytes".repeat(4);
		let compressed = compress(&data);
		assert_eq!(decompress(&compressed).unwrap(), data);
	}
}
