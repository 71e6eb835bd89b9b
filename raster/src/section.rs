//! Section: a single source raster imported into a coverage. See
//! SPEC_FULL.md §4.F, §6.5.

use crate::{
	codec::Compression,
	error::RasterResult,
	tile::Tile,
};

/// Decodes/encodes a Tile against an external image container. No
/// concrete implementation ships in this crate (PNG/JPEG/WebP/GIF/TIFF/
/// ASCII-grid file I/O is out of scope, see SPEC_FULL.md §1); callers
/// supply their own against whichever format libraries they link.
pub trait FormatAdapter {
	fn decode(&self, bytes: &[u8]) -> RasterResult<Tile>;

	fn encode(&self, tile: &Tile, quality: Option<u8>) -> RasterResult<Vec<u8>>;
}

/// A single source raster imported into a coverage: a name, an optional
/// per-section compression/tile-size override, and the Tile it
/// exclusively owns. Dropping a Section drops its Tile.
pub struct Section {
	name: String,
	compression: Option<Compression>,
	tile_width: Option<u32>,
	tile_height: Option<u32>,
	tile: Tile,
}

impl Section {
	pub fn create(name: impl Into<String>, compression: Option<Compression>, tile_width: Option<u32>, tile_height: Option<u32>, tile: Tile) -> Self {
		Self {
			name: name.into(),
			compression,
			tile_width,
			tile_height,
			tile,
		}
	}

	/// Loads a Section from an external image file's bytes, via the
	/// caller-supplied adapter. The resulting Tile keeps the adapter's
	/// natural sample/pixel/bands.
	pub fn from_bytes(name: impl Into<String>, bytes: &[u8], adapter: &dyn FormatAdapter) -> RasterResult<Self> {
		let tile = adapter.decode(bytes)?;
		Ok(Self::create(name, None, None, None, tile))
	}

	/// Encodes this Section's Tile through the caller-supplied adapter.
	pub fn to_bytes(&self, adapter: &dyn FormatAdapter, quality: Option<u8>) -> RasterResult<Vec<u8>> {
		adapter.encode(&self.tile, quality)
	}

	pub fn name(&self) -> &str { &self.name }

	pub fn compression(&self) -> Option<Compression> { self.compression }

	pub fn tile_size(&self) -> (Option<u32>, Option<u32>) { (self.tile_width, self.tile_height) }

	pub fn tile(&self) -> &Tile { &self.tile }

	pub fn into_tile(self) -> Tile { self.tile }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sample::{PixelKind, SampleKind};

	struct EchoAdapter;

	impl FormatAdapter for EchoAdapter {
		fn decode(&self, bytes: &[u8]) -> RasterResult<Tile> {
			Tile::create(2, 2, SampleKind::UInt8, PixelKind::Grayscale, 1, bytes.to_vec(), None, None, None)
		}

		fn encode(&self, tile: &Tile, _quality: Option<u8>) -> RasterResult<Vec<u8>> { Ok(tile.buffer().to_vec()) }
	}

	#[test]
	fn section_owns_tile_through_adapter_roundtrip() {
		let bytes = vec![1u8, 2, 3, 4];
		let section = Section::from_bytes("imported", &bytes, &EchoAdapter).unwrap();
		assert_eq!(section.name(), "imported");
		let back = section.to_bytes(&EchoAdapter, None).unwrap();
		assert_eq!(back, bytes);
	}

	#[test]
	fn into_tile_transfers_ownership() {
		let tile = Tile::create(2, 2, SampleKind::UInt8, PixelKind::Grayscale, 1, vec![0; 4], None, None, None).unwrap();
		let section = Section::create("s", None, None, None, tile);
		let tile = section.into_tile();
		assert_eq!(tile.width(), 2);
	}
}
