//! The tile codec: serializes a [`Tile`](crate::tile::Tile) into an
//! (odd, even) BLOB pair and decodes that pair back at a chosen
//! downscale. See SPEC_FULL.md §4.D.

mod deflate;
mod fax;
mod header;
mod jpeg;
mod lzma;
mod lzw;
mod none;
mod png;
mod webp;

use header::{BlobHeader, EVEN_MAGIC, ODD_MAGIC};

use crate::{
	error::{RasterError, RasterResult},
	palette::Palette,
	pixel::Pixel,
	sample::{PixelKind, SampleKind},
	tile::Tile,
};

/// The set of compressions a tile can be encoded with. Availability
/// depends on the tile's sample/pixel/bands; see SPEC_FULL.md §4.D.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Compression {
	None = 0x21,
	Deflate = 0x22,
	Lzma = 0x23,
	Png = 0x25,
	Jpeg = 0x26,
	WebpLossy = 0x27,
	WebpLossless = 0x28,
	CcittFax3 = 0x29,
	CcittFax4 = 0x30,
	Lzw = 0x31,
}

impl Compression {
	pub fn code(self) -> u8 { self as u8 }

	pub fn from_code(code: u8) -> Option<Self> {
		Some(match code {
			0x21 => Self::None,
			0x22 => Self::Deflate,
			0x23 => Self::Lzma,
			0x25 => Self::Png,
			0x26 => Self::Jpeg,
			0x27 => Self::WebpLossy,
			0x28 => Self::WebpLossless,
			0x29 => Self::CcittFax3,
			0x30 => Self::CcittFax4,
			0x31 => Self::Lzw,
			_ => return None,
		})
	}

	/// Whether this compression may be applied to a tile of the given
	/// sample/pixel/bands, per the table in SPEC_FULL.md §4.D.
	pub fn supports(self, sample: SampleKind, pixel: PixelKind) -> bool {
		match self {
			Self::None | Self::Deflate | Self::Lzma => true,
			Self::Png => matches!(
				(pixel, sample),
				(PixelKind::Monochrome, SampleKind::Bit1)
					| (PixelKind::Palette, _)
					| (PixelKind::Grayscale, SampleKind::UInt8)
					| (PixelKind::Rgb, SampleKind::UInt8)
			),
			Self::Jpeg => matches!((pixel, sample), (PixelKind::Grayscale, SampleKind::UInt8) | (PixelKind::Rgb, SampleKind::UInt8)),
			Self::WebpLossy | Self::WebpLossless => {
				matches!((pixel, sample), (PixelKind::Grayscale, SampleKind::UInt8) | (PixelKind::Rgb, SampleKind::UInt8))
			},
			Self::CcittFax3 | Self::CcittFax4 => pixel == PixelKind::Monochrome,
			Self::Lzw => sample.is_integer(),
		}
	}

	/// Whether this compression stores a non-empty even half.
	fn progressive(self) -> bool { matches!(self, Self::None | Self::Deflate | Self::Lzma) }
}

/// Inputs to [`encode`]: target compression, quality (meaningful only for
/// lossy codecs; `0` means "use the codec library's default"), and the
/// byte order multi-byte samples should be written in.
pub struct EncodeOptions {
	pub compression: Compression,
	pub quality: u8,
	pub little_endian: bool,
}

impl Default for EncodeOptions {
	fn default() -> Self {
		Self {
			compression: Compression::None,
			quality: 75,
			little_endian: cfg!(target_endian = "little"),
		}
	}
}

const HOST_LITTLE_ENDIAN: bool = cfg!(target_endian = "little");

pub fn encode(tile: &Tile, opts: &EncodeOptions) -> RasterResult<(Vec<u8>, Vec<u8>)> {
	tracy::zone!("Tile Encode");

	if !opts.compression.supports(tile.sample_kind(), tile.pixel_kind()) {
		return Err(RasterError::UnsupportedCompression);
	}

	match opts.compression {
		Compression::None => none_family::encode(tile, opts, |p| p),
		Compression::Deflate => none_family::encode(tile, opts, deflate::compress),
		Compression::Lzma => none_family::encode(tile, opts, lzma::compress),
		Compression::Png => png::encode(tile),
		Compression::Jpeg => jpeg::encode(tile, opts.quality),
		Compression::WebpLossless => webp::encode(tile, None),
		Compression::WebpLossy => webp::encode(tile, Some(opts.quality)),
		Compression::CcittFax3 => fax::encode(tile, false),
		Compression::CcittFax4 => fax::encode(tile, true),
		Compression::Lzw => lzw::encode(tile, opts.little_endian),
	}
}

pub fn decode(odd_blob: &[u8], even_blob: &[u8], scale: u8, palette: Option<Palette>) -> RasterResult<Tile> {
	tracy::zone!("Tile Decode");

	if !matches!(scale, 1 | 2 | 4 | 8) {
		return Err(RasterError::InvalidArgument("scale must be one of 1, 2, 4, 8"));
	}

	let (header, _, _) = BlobHeader::parse(odd_blob, ODD_MAGIC)?;

	match header.compression {
		Compression::None => none_family::decode(odd_blob, even_blob, scale, palette, |p| Ok(p.to_vec())),
		Compression::Deflate => none_family::decode(odd_blob, even_blob, scale, palette, deflate::decompress),
		Compression::Lzma => none_family::decode(odd_blob, even_blob, scale, palette, lzma::decompress),
		Compression::Png => {
			if scale != 1 {
				return Err(RasterError::ScaleUnavailable);
			}
			png::decode(odd_blob, palette)
		},
		Compression::Jpeg => {
			if scale != 1 {
				return Err(RasterError::ScaleUnavailable);
			}
			jpeg::decode(odd_blob)
		},
		Compression::WebpLossless | Compression::WebpLossy => {
			if scale != 1 {
				return Err(RasterError::ScaleUnavailable);
			}
			webp::decode(odd_blob)
		},
		Compression::CcittFax3 | Compression::CcittFax4 => {
			if scale != 1 {
				return Err(RasterError::ScaleUnavailable);
			}
			fax::decode(odd_blob)
		},
		Compression::Lzw => {
			if scale != 1 {
				return Err(RasterError::ScaleUnavailable);
			}
			lzw::decode(odd_blob)
		},
	}
}

/// Shared framing for the `None`/`Deflate`/`LZMA` family: the planar
/// split is identical, only the per-half byte compressor differs.
mod none_family {
	use super::*;

	pub(super) fn encode(
		tile: &Tile, opts: &EncodeOptions, compress: impl Fn(&[u8]) -> Vec<u8>,
	) -> RasterResult<(Vec<u8>, Vec<u8>)> {
		let mut planes = none::split(tile);
		let width = tile.sample_kind().memory_width();
		if opts.little_endian != HOST_LITTLE_ENDIAN {
			none::swap_element_endianness(&mut planes.odd, width);
			none::swap_element_endianness(&mut planes.even, width);
		}

		let odd_payload = compress(&planes.odd);
		let even_payload = compress(&planes.even);

		let has_mask = tile.mask().is_some();
		let has_nodata = tile.no_data().is_some();
		let has_palette = tile.palette().is_some();

		let odd_header = BlobHeader {
			little_endian: opts.little_endian,
			compression: opts.compression,
			sample: tile.sample_kind(),
			pixel: tile.pixel_kind(),
			bands: tile.band_count(),
			width: planes.odd_width,
			height: planes.odd_height,
			has_mask,
			has_nodata,
			has_palette,
			payload_len: odd_payload.len() as u32,
			mask_len: planes.odd_mask.len() as u32,
		};
		let mut odd_blob = odd_header.write(ODD_MAGIC, &odd_payload, &planes.odd_mask);
		odd_header.write_no_data(&mut odd_blob, tile.no_data());
		if has_palette {
			odd_blob.extend_from_slice(&tile.palette().unwrap().serialize());
		}

		let even_blob = if tile.width() == 1 && tile.height() == 1 {
			Vec::new()
		} else {
			let even_header = BlobHeader {
				little_endian: opts.little_endian,
				compression: opts.compression,
				sample: tile.sample_kind(),
				pixel: tile.pixel_kind(),
				bands: tile.band_count(),
				width: tile.width() - planes.odd_width,
				height: tile.height(),
				has_mask,
				has_nodata: false,
				has_palette: false,
				payload_len: even_payload.len() as u32,
				mask_len: planes.even_mask.len() as u32,
			};
			even_header.write(EVEN_MAGIC, &even_payload, &planes.even_mask)
		};

		Ok((odd_blob, even_blob))
	}

	pub(super) fn decode(
		odd_blob: &[u8], even_blob: &[u8], scale: u8, palette: Option<Palette>,
		decompress: impl Fn(&[u8]) -> RasterResult<Vec<u8>>,
	) -> RasterResult<Tile> {
		let (odd_header, odd_payload, odd_mask) = BlobHeader::parse(odd_blob, ODD_MAGIC)?;

		let palette = resolve_palette(odd_blob, &odd_header, palette)?;
		let no_data = odd_header.read_no_data(odd_blob)?;

		let mut odd_plane = decompress(odd_payload)?;
		let width = odd_header.sample.memory_width();
		if odd_header.little_endian != HOST_LITTLE_ENDIAN {
			none::swap_element_endianness(&mut odd_plane, width);
		}
		let odd_mask = odd_mask.to_vec();

		if scale == 2 {
			let (buffer, mask, w, h) = (odd_plane, if odd_header.has_mask { Some(odd_mask) } else { None }, odd_header.width, odd_header.height);
			return build_tile(w, h, &odd_header, buffer, mask, palette, no_data);
		}
		if scale == 4 || scale == 8 {
			let block = if scale == 4 { 2 } else { 4 };
			let (buffer, mask, w, h) = none::downscale_from_odd(
				&odd_plane,
				&odd_mask,
				odd_header.width,
				odd_header.height,
				odd_header.sample,
				odd_header.bands,
				block,
				odd_header.has_mask,
				no_data.as_ref(),
			)?;
			return build_tile(w, h, &odd_header, buffer, mask, palette, no_data);
		}

		// scale == 1: requires the even half, except for the degenerate 1x1
		// tile (see `none_family::encode`), whose odd plane already is the
		// whole tile and whose even blob is therefore empty.
		if even_blob.is_empty() {
			return build_tile(
				odd_header.width,
				odd_header.height,
				&odd_header,
				odd_plane,
				odd_header.has_mask.then(|| odd_mask.clone()),
				palette,
				no_data,
			);
		}

		let (even_header, even_payload, even_mask) = BlobHeader::parse(even_blob, EVEN_MAGIC)?;
		let mut even_plane = decompress(even_payload)?;
		if even_header.little_endian != HOST_LITTLE_ENDIAN {
			none::swap_element_endianness(&mut even_plane, width);
		}

		let full_width = odd_header.width + even_header.width;
		let full_height = even_header.height;
		let stride = odd_header.bands as usize * odd_header.sample.memory_width();
		let (buffer, mask) =
			none::merge_scale1(full_width, full_height, stride, odd_header.has_mask, &odd_plane, &even_plane, &odd_mask, even_mask);

		build_tile(full_width, full_height, &odd_header, buffer, mask, palette, no_data)
	}

	fn resolve_palette(odd_blob: &[u8], header: &BlobHeader, supplied: Option<Palette>) -> RasterResult<Option<Palette>> {
		if header.pixel != PixelKind::Palette {
			return Ok(None);
		}

		let embedded = if header.has_palette {
			let tail_start = header.tail_start() + header.no_data_len();
			Some(Palette::deserialize(&odd_blob[tail_start..])?)
		} else {
			None
		};

		match (embedded, supplied) {
			(Some(e), Some(s)) => {
				if e.entries() == s.entries() {
					Ok(Some(e))
				} else {
					Err(RasterError::PaletteMismatch)
				}
			},
			(Some(e), None) => Ok(Some(e)),
			(None, Some(s)) => Ok(Some(s)),
			(None, None) => Err(RasterError::PaletteRequired),
		}
	}

	fn build_tile(
		width: u32, height: u32, header: &BlobHeader, buffer: Vec<u8>, mask: Option<Vec<u8>>, palette: Option<Palette>,
		no_data: Option<Pixel>,
	) -> RasterResult<Tile> {
		Tile::create(width, height, header.sample, header.pixel, header.bands, buffer, palette, mask, no_data)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sample::PixelKind;

	fn datagrid_tile(w: u32, h: u32) -> Tile {
		let buf: Vec<u8> = (0..w * h).map(|i| ((i * 7) % 256) as u8).collect();
		Tile::create(w, h, SampleKind::UInt8, PixelKind::DataGrid, 1, buf, None, None, None).unwrap()
	}

	#[test]
	fn none_codec_roundtrips_at_scale1() {
		let tile = datagrid_tile(9, 6);
		let opts = EncodeOptions::default();
		let (odd, even) = encode(&tile, &opts).unwrap();
		let decoded = decode(&odd, &even, 1, None).unwrap();
		assert_eq!(decoded.buffer(), tile.buffer());
		assert_eq!((decoded.width(), decoded.height()), (tile.width(), tile.height()));
	}

	#[test]
	fn none_codec_roundtrips_1x1_tile() {
		// Boundary behavior from SPEC_FULL.md §8: a 1x1 tile's even half is
		// always empty (see `none_family::encode`); scale=1 decode must not
		// try to parse it as a blob.
		let tile = datagrid_tile(1, 1);
		let opts = EncodeOptions::default();
		let (odd, even) = encode(&tile, &opts).unwrap();
		assert!(even.is_empty());
		let decoded = decode(&odd, &even, 1, None).unwrap();
		assert_eq!(decoded.buffer(), tile.buffer());
		assert_eq!((decoded.width(), decoded.height()), (1, 1));
	}

	#[test]
	fn none_codec_scale2_is_direct_subsample() {
		let tile = datagrid_tile(8, 8);
		let opts = EncodeOptions::default();
		let (odd, even) = encode(&tile, &opts).unwrap();
		let decoded = decode(&odd, &even, 2, None).unwrap();
		assert_eq!((decoded.width(), decoded.height()), (4, 4));
	}

	#[test]
	fn scale_available_for_progressive_family() {
		let tile = datagrid_tile(16, 16);
		let opts = EncodeOptions::default();
		let (odd, even) = encode(&tile, &opts).unwrap();
		for scale in [1u8, 2, 4, 8] {
			assert!(decode(&odd, &even, scale, None).is_ok(), "scale {} should decode", scale);
		}
	}

	#[test]
	fn byte_order_is_transport_only() {
		let tile = {
			let buf: Vec<u8> = (0..16u16).flat_map(|v| v.to_ne_bytes()).collect();
			Tile::create(4, 4, SampleKind::UInt16, PixelKind::DataGrid, 1, buf, None, None, None).unwrap()
		};

		let le = EncodeOptions {
			compression: Compression::None,
			quality: 0,
			little_endian: true,
		};
		let be = EncodeOptions {
			little_endian: false,
			..EncodeOptions::default()
		};

		let (odd_le, even_le) = encode(&tile, &le).unwrap();
		let (odd_be, even_be) = encode(&tile, &be).unwrap();

		let decoded_le = decode(&odd_le, &even_le, 1, None).unwrap();
		let decoded_be = decode(&odd_be, &even_be, 1, None).unwrap();
		assert_eq!(decoded_le.buffer(), decoded_be.buffer());
		assert_eq!(decoded_le.buffer(), tile.buffer());
	}

	#[test]
	fn unsupported_compression_for_kind_is_rejected() {
		let tile = datagrid_tile(8, 8);
		let opts = EncodeOptions {
			compression: Compression::Png,
			..EncodeOptions::default()
		};
		assert!(matches!(encode(&tile, &opts), Err(RasterError::UnsupportedCompression)));
	}

	#[test]
	fn no_data_pixel_roundtrips_through_the_blob() {
		use crate::pixel::{Pixel, Sample};

		let buf: Vec<u8> = (0..64).map(|i| (i % 5) as u8).collect();
		let mut no_data = Pixel::create(SampleKind::UInt8, PixelKind::DataGrid, 1).unwrap();
		no_data.set_sample(0, Sample::UInt8(255)).unwrap();
		let tile = Tile::create(8, 8, SampleKind::UInt8, PixelKind::DataGrid, 1, buf, None, None, Some(no_data.clone())).unwrap();

		let opts = EncodeOptions::default();
		let (odd, even) = encode(&tile, &opts).unwrap();
		for scale in [1u8, 2, 4, 8] {
			let decoded = decode(&odd, &even, scale, None).unwrap();
			let decoded_nd = decoded.no_data().expect("no-data pixel must survive the round trip");
			assert!(decoded_nd.compare(&no_data), "scale {} lost the no-data pixel", scale);
		}
	}

	// An 8x8 tile's odd plane (scale=2 source) is the 4x4 grid of its
	// even-row/even-col cells; scale=4 box-filters that grid in 2x2
	// blocks. Position the tile's 4 samples that land in the odd grid's
	// first 2x2 block (tile cells (0,0), (0,2), (2,0), (2,2)) to exercise
	// no-data exclusion in that output cell.
	fn tile_with_one_nodata_contributor(no_data_value: u8) -> (Tile, crate::pixel::Pixel) {
		use crate::pixel::{Pixel, Sample};

		let mut buf = vec![0u8; 64];
		buf[0] = 10; // (0,0)
		buf[2] = 20; // (0,2)
		buf[16] = 30; // (2,0)
		buf[18] = no_data_value; // (2,2)
		let mut no_data = Pixel::create(SampleKind::UInt8, PixelKind::DataGrid, 1).unwrap();
		no_data.set_sample(0, Sample::UInt8(255)).unwrap();
		let tile = Tile::create(8, 8, SampleKind::UInt8, PixelKind::DataGrid, 1, buf, None, None, Some(no_data.clone())).unwrap();
		(tile, no_data)
	}

	/// SPEC_FULL.md §8: downscaling a tile with exactly one no-data pixel
	/// must only yield no-data in the output when every contributor to
	/// that output cell was no-data.
	#[test]
	fn downscale_excludes_single_no_data_pixel_unless_all_contributors_match() {
		let (tile, no_data) = tile_with_one_nodata_contributor(255);
		let opts = EncodeOptions::default();
		let (odd, even) = encode(&tile, &opts).unwrap();
		let decoded = decode(&odd, &even, 4, None).unwrap();
		// mean of {10, 20, 30}, excluding the no-data contributor
		assert_eq!(decoded.buffer()[0], 20);
		assert!(decoded.no_data().unwrap().compare(&no_data));
	}

	#[test]
	fn downscale_is_no_data_when_all_contributors_are_no_data() {
		use crate::pixel::{Pixel, Sample};

		let mut no_data = Pixel::create(SampleKind::UInt8, PixelKind::DataGrid, 1).unwrap();
		no_data.set_sample(0, Sample::UInt8(255)).unwrap();
		let mut buf = vec![0u8; 64];
		buf[0] = 255;
		buf[2] = 255;
		buf[16] = 255;
		buf[18] = 255;
		let tile = Tile::create(8, 8, SampleKind::UInt8, PixelKind::DataGrid, 1, buf, None, None, Some(no_data.clone())).unwrap();

		let opts = EncodeOptions::default();
		let (odd, even) = encode(&tile, &opts).unwrap();
		let decoded = decode(&odd, &even, 4, None).unwrap();
		assert_eq!(decoded.buffer()[0], 255);
	}
}
