/// The physical type of a single band sample.
///
/// `Bit1`/`Bit2`/`Bit4` are stored one sample per byte in memory (see
/// [`crate::tile::Tile`]) and are bit-packed only on the wire, by the codec.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum SampleKind {
	Bit1 = 0xa1,
	Bit2 = 0xa2,
	Bit4 = 0xa3,
	Int8 = 0xa4,
	UInt8 = 0xa5,
	Int16 = 0xa6,
	UInt16 = 0xa7,
	Int32 = 0xa8,
	UInt32 = 0xa9,
	Float32 = 0xaa,
	Float64 = 0xab,
}

impl SampleKind {
	/// Width of one in-memory sample, in bytes. Sub-byte kinds occupy a
	/// full byte in memory; they are only packed on the wire.
	pub fn memory_width(self) -> usize {
		match self {
			Self::Bit1 | Self::Bit2 | Self::Bit4 | Self::Int8 | Self::UInt8 => 1,
			Self::Int16 | Self::UInt16 => 2,
			Self::Int32 | Self::UInt32 | Self::Float32 => 4,
			Self::Float64 => 8,
		}
	}

	/// The largest value a sample of this kind may legally hold, for the
	/// sub-byte kinds (2/4/16). `None` for full-width kinds, which are
	/// bounded only by their native range.
	pub fn sub_byte_max(self) -> Option<u8> {
		match self {
			Self::Bit1 => Some(1),
			Self::Bit2 => Some(3),
			Self::Bit4 => Some(15),
			_ => None,
		}
	}

	pub fn is_integer(self) -> bool { !matches!(self, Self::Float32 | Self::Float64) }

	pub fn is_float(self) -> bool { matches!(self, Self::Float32 | Self::Float64) }

	pub fn from_code(code: u8) -> Option<Self> {
		Some(match code {
			0xa1 => Self::Bit1,
			0xa2 => Self::Bit2,
			0xa3 => Self::Bit4,
			0xa4 => Self::Int8,
			0xa5 => Self::UInt8,
			0xa6 => Self::Int16,
			0xa7 => Self::UInt16,
			0xa8 => Self::Int32,
			0xa9 => Self::UInt32,
			0xaa => Self::Float32,
			0xab => Self::Float64,
			_ => return None,
		})
	}

	/// Number of histogram bins used by [`crate::stats::RasterStatistics`]
	/// for this sample kind.
	pub fn histogram_bins(self) -> usize {
		match self {
			Self::Bit1 => 2,
			Self::Bit2 => 4,
			Self::Bit4 => 16,
			Self::Int8 | Self::UInt8 => 256,
			Self::Int16 | Self::UInt16 => 1024,
			Self::Int32 | Self::UInt32 | Self::Float32 | Self::Float64 => 1024,
		}
	}
}

/// The semantic interpretation of a Tile's bands.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum PixelKind {
	Monochrome = 0x11,
	Palette = 0x12,
	Grayscale = 0x13,
	Rgb = 0x14,
	Multiband = 0x15,
	DataGrid = 0x16,
}

impl PixelKind {
	pub fn from_code(code: u8) -> Option<Self> {
		Some(match code {
			0x11 => Self::Monochrome,
			0x12 => Self::Palette,
			0x13 => Self::Grayscale,
			0x14 => Self::Rgb,
			0x15 => Self::Multiband,
			0x16 => Self::DataGrid,
			_ => return None,
		})
	}
}

/// Validates a (sample, pixel, bands) triple against the legal-combinations
/// table. Any other combination is rejected at construction throughout the
/// crate.
pub fn is_legal_combination(sample: SampleKind, pixel: PixelKind, bands: u8) -> bool {
	use PixelKind::*;
	use SampleKind::*;

	match pixel {
		Monochrome => sample == Bit1 && bands == 1,
		Palette => matches!(sample, Bit1 | Bit2 | Bit4 | UInt8) && bands == 1,
		Grayscale => matches!(sample, Bit1 | Bit2 | Bit4 | UInt8) && bands == 1,
		Rgb => matches!(sample, UInt8 | UInt16) && bands == 3,
		Multiband => matches!(sample, UInt8 | UInt16) && bands >= 2,
		DataGrid => bands == 1,
	}
}
