use crate::{
	error::{RasterError, RasterResult},
	sample::{PixelKind, SampleKind},
};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Rgba {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: u8,
}

impl Rgba {
	pub fn opaque(r: u8, g: u8, b: u8) -> Self { Self { r, g, b, a: 255 } }

	fn from_hex(hex: &str) -> RasterResult<Self> {
		let hex = hex.strip_prefix('#').unwrap_or(hex);
		if hex.len() != 6 {
			return Err(RasterError::InvalidArgument("hex color must be #RRGGBB"));
		}
		let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| RasterError::InvalidArgument("invalid hex digit"));
		Ok(Self {
			r: byte(&hex[0..2])?,
			g: byte(&hex[2..4])?,
			b: byte(&hex[4..6])?,
			a: 255,
		})
	}
}

/// An ordered RGBA color table of 1..256 entries. Tile samples of
/// Palette-kind pixels are indexes into it.
#[derive(Clone, Debug)]
pub struct Palette {
	entries: Vec<Rgba>,
}

impl Palette {
	pub fn create(n: usize) -> RasterResult<Self> {
		if n == 0 || n > 256 {
			return Err(RasterError::InvalidArgument("palette size must be in 1..=256"));
		}
		Ok(Self {
			entries: vec![Rgba::default(); n],
		})
	}

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn set_entry(&mut self, index: usize, r: u8, g: u8, b: u8, a: u8) -> RasterResult<()> {
		let slot = self.entries.get_mut(index).ok_or(RasterError::ValueOutOfRange)?;
		*slot = Rgba { r, g, b, a };
		Ok(())
	}

	pub fn set_entry_hex(&mut self, index: usize, hex: &str) -> RasterResult<()> {
		let color = Rgba::from_hex(hex)?;
		let slot = self.entries.get_mut(index).ok_or(RasterError::ValueOutOfRange)?;
		*slot = color;
		Ok(())
	}

	/// First exact RGBA match; a miss is an error, not a nearest-color
	/// search.
	pub fn index_of(&self, r: u8, g: u8, b: u8, a: u8) -> RasterResult<usize> {
		self.entries
			.iter()
			.position(|e| *e == Rgba { r, g, b, a })
			.ok_or(RasterError::ValueOutOfRange)
	}

	pub fn entries(&self) -> &[Rgba] { &self.entries }

	/// Classifies the palette per the table in the data model: uniform
	/// grayscale (R=G=B for every entry) with exactly 2 entries is
	/// Monochrome-equivalent; uniform grayscale with any other count is
	/// Grayscale-equivalent at the tightest width that holds the count;
	/// otherwise Color at the tightest width.
	pub fn classify(&self) -> (SampleKind, PixelKind) {
		let grayscale = self.entries.iter().all(|e| e.r == e.g && e.g == e.b);
		let width = Self::tightest_width(self.entries.len());

		if grayscale && self.entries.len() == 2 {
			(SampleKind::Bit1, PixelKind::Monochrome)
		} else if grayscale {
			(width, PixelKind::Grayscale)
		} else {
			(width, PixelKind::Palette)
		}
	}

	fn tightest_width(count: usize) -> SampleKind {
		match count {
			0..=2 => SampleKind::Bit1,
			3..=4 => SampleKind::Bit2,
			5..=16 => SampleKind::Bit4,
			_ => SampleKind::UInt8,
		}
	}

	/// Compact byte stream: magic `0x00, 0xf2`; 1 byte entry count minus
	/// 1; 1 byte flags (bit0 = alpha present); N x (3 or 4) bytes RGBA in
	/// index order; 4-byte CRC32. Alpha is elided when every entry is
	/// fully opaque.
	pub fn serialize(&self) -> Vec<u8> {
		let has_alpha = self.entries.iter().any(|e| e.a != 255);

		let mut body = Vec::with_capacity(2 + self.entries.len() * 4);
		body.push(0x00);
		body.push(0xf2);
		body.push((self.entries.len() - 1) as u8);
		body.push(if has_alpha { 0b1 } else { 0b0 });
		for e in &self.entries {
			body.push(e.r);
			body.push(e.g);
			body.push(e.b);
			if has_alpha {
				body.push(e.a);
			}
		}

		let crc = crc32fast::hash(&body);
		body.extend_from_slice(&crc.to_le_bytes());
		body
	}

	pub fn deserialize(bytes: &[u8]) -> RasterResult<Self> {
		if bytes.len() < 4 + 4 {
			return Err(RasterError::CorruptBlob("palette stream too short"));
		}
		let (body, trailer) = bytes.split_at(bytes.len() - 4);
		let stored_crc = u32::from_le_bytes(trailer.try_into().unwrap());
		if crc32fast::hash(body) != stored_crc {
			return Err(RasterError::CorruptBlob("palette CRC mismatch"));
		}

		if body[0] != 0x00 || body[1] != 0xf2 {
			return Err(RasterError::CorruptBlob("bad palette magic"));
		}
		let count = body[2] as usize + 1;
		let has_alpha = body[3] & 0b1 != 0;
		let stride = if has_alpha { 4 } else { 3 };

		let rest = &body[4..];
		if rest.len() != count * stride {
			return Err(RasterError::CorruptBlob("palette length mismatch"));
		}

		let entries = rest
			.chunks_exact(stride)
			.map(|chunk| Rgba {
				r: chunk[0],
				g: chunk[1],
				b: chunk[2],
				a: if has_alpha { chunk[3] } else { 255 },
			})
			.collect();

		Ok(Self { entries })
	}
}
