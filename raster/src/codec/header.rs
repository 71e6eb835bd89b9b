use byteorder::{ByteOrder, LittleEndian};

use super::{none::swap_element_endianness, Compression, HOST_LITTLE_ENDIAN};
use crate::{
	error::{RasterError, RasterResult},
	pixel::Pixel,
	sample::{PixelKind, SampleKind},
};

pub(crate) const ODD_MAGIC: [u8; 2] = [0x00, 0xd2];
pub(crate) const EVEN_MAGIC: [u8; 2] = [0x00, 0xd3];
pub(crate) const HEADER_LEN: usize = 80;

/// The fixed 80-byte framing header shared by every compression; see
/// SPEC_FULL.md §4.D. Codecs that embed their own container (PNG/JPEG/
/// WebP/Fax/LZW) still wear this header, with their native bytes in the
/// payload region.
pub(crate) struct BlobHeader {
	pub little_endian: bool,
	pub compression: Compression,
	pub sample: SampleKind,
	pub pixel: PixelKind,
	pub bands: u8,
	pub width: u32,
	pub height: u32,
	pub has_mask: bool,
	pub has_nodata: bool,
	pub has_palette: bool,
	pub payload_len: u32,
	pub mask_len: u32,
}

impl BlobHeader {
	pub fn write(&self, magic: [u8; 2], payload: &[u8], mask: &[u8]) -> Vec<u8> {
		let mut out = vec![0u8; HEADER_LEN];
		out[0] = magic[0];
		out[1] = magic[1];
		out[2] = if self.little_endian { 0x01 } else { 0x00 };
		out[3] = self.compression.code();
		out[4] = self.sample as u8;
		out[5] = self.pixel as u8;
		out[6] = self.bands;
		LittleEndian::write_u16(&mut out[7..9], self.width as u16);
		LittleEndian::write_u16(&mut out[9..11], self.height as u16);
		out[11] = (self.has_mask as u8) | ((self.has_nodata as u8) << 1) | ((self.has_palette as u8) << 2);
		LittleEndian::write_u32(&mut out[12..16], self.payload_len);
		LittleEndian::write_u32(&mut out[16..20], self.mask_len);
		// out[20..24] is the CRC field, left zero until patched below.
		// out[24..80] is reserved, already zero.

		out.extend_from_slice(payload);
		out.extend_from_slice(mask);

		let crc = crc_excluding_field(&out);
		LittleEndian::write_u32(&mut out[20..24], crc);
		out
	}

	pub fn parse(bytes: &[u8], expect_magic: [u8; 2]) -> RasterResult<(Self, &[u8], &[u8])> {
		if bytes.len() < HEADER_LEN {
			return Err(RasterError::CorruptBlob("blob shorter than header"));
		}
		if bytes[0] != expect_magic[0] || bytes[1] != expect_magic[1] {
			return Err(RasterError::CorruptBlob("bad magic"));
		}

		let stored_crc = LittleEndian::read_u32(&bytes[20..24]);
		if crc_excluding_field(bytes) != stored_crc {
			return Err(RasterError::CorruptBlob("CRC mismatch"));
		}

		let sample = SampleKind::from_code(bytes[4]).ok_or(RasterError::CorruptBlob("unknown sample kind"))?;
		let pixel = PixelKind::from_code(bytes[5]).ok_or(RasterError::CorruptBlob("unknown pixel kind"))?;
		let compression = Compression::from_code(bytes[3]).ok_or(RasterError::CorruptBlob("unknown compression"))?;

		let payload_len = LittleEndian::read_u32(&bytes[12..16]) as usize;
		let mask_len = LittleEndian::read_u32(&bytes[16..20]) as usize;

		let payload_start = HEADER_LEN;
		let payload_end = payload_start + payload_len;
		let mask_end = payload_end + mask_len;
		if bytes.len() < mask_end {
			return Err(RasterError::CorruptBlob("payload/mask length exceeds blob"));
		}

		let header = Self {
			little_endian: bytes[2] == 0x01,
			compression,
			sample,
			pixel,
			bands: bytes[6],
			width: LittleEndian::read_u16(&bytes[7..9]) as u32,
			height: LittleEndian::read_u16(&bytes[9..11]) as u32,
			has_mask: bytes[11] & 0b001 != 0,
			has_nodata: bytes[11] & 0b010 != 0,
			has_palette: bytes[11] & 0b100 != 0,
			payload_len: payload_len as u32,
			mask_len: mask_len as u32,
		};

		Ok((header, &bytes[payload_start..payload_end], &bytes[payload_end..mask_end]))
	}

	/// Byte offset right after the mask, where a codec may append further
	/// tail data (a no-data pixel, then a palette).
	pub(crate) fn tail_start(&self) -> usize { HEADER_LEN + self.payload_len as usize + self.mask_len as usize }

	/// Byte length of the no-data pixel region, if `has_nodata` is set.
	pub(crate) fn no_data_len(&self) -> usize {
		if self.has_nodata {
			self.bands as usize * self.sample.memory_width() + 1
		} else {
			0
		}
	}

	/// Appends `no_data`'s bytes (see [`Pixel::to_bytes`]) to `out`, in this
	/// header's byte order, when present. No-op otherwise.
	pub(crate) fn write_no_data(&self, out: &mut Vec<u8>, no_data: Option<&Pixel>) {
		let Some(px) = no_data else { return };
		let mut bytes = px.to_bytes();
		let width = self.sample.memory_width();
		if self.little_endian != HOST_LITTLE_ENDIAN {
			let sample_len = bytes.len() - 1;
			swap_element_endianness(&mut bytes[..sample_len], width);
		}
		out.extend_from_slice(&bytes);
	}

	/// Reads the no-data pixel appended right after `blob`'s mask, when
	/// `has_nodata` is set.
	pub(crate) fn read_no_data(&self, blob: &[u8]) -> RasterResult<Option<Pixel>> {
		if !self.has_nodata {
			return Ok(None);
		}
		let len = self.no_data_len();
		let start = self.tail_start();
		let raw = blob.get(start..start + len).ok_or(RasterError::CorruptBlob("truncated no-data pixel"))?;
		let mut bytes = raw.to_vec();
		let width = self.sample.memory_width();
		if self.little_endian != HOST_LITTLE_ENDIAN {
			let sample_len = bytes.len() - 1;
			swap_element_endianness(&mut bytes[..sample_len], width);
		}
		Ok(Some(Pixel::from_bytes(&bytes, self.sample, self.pixel, self.bands)?))
	}
}

fn crc_excluding_field(blob: &[u8]) -> u32 {
	let mut hasher = crc32fast::Hasher::new();
	hasher.update(&blob[0..20]);
	hasher.update(&blob[24..]);
	hasher.finalize()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_then_parse_roundtrips_fields() {
		let header = BlobHeader {
			little_endian: true,
			compression: Compression::None,
			sample: SampleKind::UInt8,
			pixel: PixelKind::Grayscale,
			bands: 1,
			width: 4,
			height: 4,
			has_mask: false,
			has_nodata: false,
			has_palette: false,
			payload_len: 8,
			mask_len: 0,
		};
		let blob = header.write(ODD_MAGIC, &[1, 2, 3, 4, 5, 6, 7, 8], &[]);
		let (parsed, payload, mask) = BlobHeader::parse(&blob, ODD_MAGIC).unwrap();
		assert_eq!(parsed.width, 4);
		assert_eq!(parsed.height, 4);
		assert_eq!(payload, &[1, 2, 3, 4, 5, 6, 7, 8]);
		assert!(mask.is_empty());
	}

	#[test]
	fn corrupted_byte_is_detected_by_crc() {
		let header = BlobHeader {
			little_endian: false,
			compression: Compression::None,
			sample: SampleKind::UInt8,
			pixel: PixelKind::Grayscale,
			bands: 1,
			width: 2,
			height: 2,
			has_mask: false,
			has_nodata: false,
			has_palette: false,
			payload_len: 4,
			mask_len: 0,
		};
		let mut blob = header.write(ODD_MAGIC, &[1, 2, 3, 4], &[]);
		blob[HEADER_LEN] ^= 0xff;
		assert!(matches!(BlobHeader::parse(&blob, ODD_MAGIC), Err(RasterError::CorruptBlob(_))));
	}
}
