use std::{
	error::Error,
	fmt::{self, Debug, Display},
};

/// The closed set of failure modes the core surfaces.
///
/// Every fallible public function returns `RasterResult<T>`; there are no
/// out-parameters and no silent coercion of mismatched kinds.
pub enum RasterError {
	/// NULL/empty inputs, zero dimensions, out-of-range indexes, illegal
	/// sample/pixel/band combinations.
	InvalidArgument(&'static str),
	/// A Pixel or Palette whose sample/pixel/bands disagree with the
	/// target tile or coverage.
	KindMismatch,
	/// (row, col) outside the tile's dimensions.
	OutOfRange,
	/// Sub-byte sample >= the type's maximum, or palette index >= palette
	/// size.
	ValueOutOfRange,
	/// Band dump / color conversion not defined for the source tile's
	/// type.
	UnsupportedConversion,
	/// Compression not permitted for the tile's sample/pixel/bands.
	UnsupportedCompression,
	/// The codec library reported an internal error while encoding.
	EncoderFailure(String),
	/// The codec library reported an internal error while decoding.
	DecoderFailure(String),
	/// Magic, length, or CRC check failed on a blob pair.
	CorruptBlob(&'static str),
	/// The requested downscale factor is not produced by this codec for
	/// this tile.
	ScaleUnavailable,
	/// A Palette-kind tile's payload does not embed a palette and none
	/// was supplied at decode time.
	PaletteRequired,
	/// The supplied palette disagrees with the one embedded in the blob.
	PaletteMismatch,
	/// The pyramid resolver found nothing at or coarser than the
	/// requested resolution.
	NoMatch,
	/// The external store returned a failure; wrapped with context.
	StoreError(Box<dyn Error + Send + Sync>),
}

pub type RasterResult<T> = Result<T, RasterError>;

impl Display for RasterError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
			Self::KindMismatch => write!(f, "sample/pixel/band kind mismatch"),
			Self::OutOfRange => write!(f, "row or column out of range"),
			Self::ValueOutOfRange => write!(f, "sample or palette index out of range"),
			Self::UnsupportedConversion => write!(f, "conversion not defined for this tile's pixel kind"),
			Self::UnsupportedCompression => write!(f, "compression not permitted for this tile's sample/pixel/bands"),
			Self::EncoderFailure(codec) => write!(f, "encoder failure ({})", codec),
			Self::DecoderFailure(codec) => write!(f, "decoder failure ({})", codec),
			Self::CorruptBlob(why) => write!(f, "corrupt blob: {}", why),
			Self::ScaleUnavailable => write!(f, "requested scale not available for this codec"),
			Self::PaletteRequired => write!(f, "palette required but not supplied"),
			Self::PaletteMismatch => write!(f, "supplied palette does not match the embedded one"),
			Self::NoMatch => write!(f, "no pyramid level at or coarser than the requested resolution"),
			Self::StoreError(e) => write!(f, "store error: {}", e),
		}
	}
}

impl Debug for RasterError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { Display::fmt(self, f) }
}

impl Error for RasterError {}

impl From<std::io::Error> for RasterError {
	fn from(e: std::io::Error) -> Self { Self::StoreError(Box::new(e)) }
}
