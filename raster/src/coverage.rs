//! Coverage Descriptor: the typed schema of a layered raster. See
//! SPEC_FULL.md §4.E.

use crate::{
	codec::Compression,
	error::{RasterError, RasterResult},
	pixel::Pixel,
	sample::{is_legal_combination, PixelKind, SampleKind},
};

/// The schema of a coverage: sample/pixel/bands, tile geometry, codec
/// choice, SRID, resolution, and optional no-data value. Validated
/// atomically at construction; there is no mutation afterward.
pub struct CoverageDescriptor {
	name: String,
	sample: SampleKind,
	pixel: PixelKind,
	bands: u8,
	compression: Compression,
	quality: u8,
	tile_width: u32,
	tile_height: u32,
	srid: i32,
	x_resolution: f64,
	y_resolution: f64,
	no_data: Option<Pixel>,
}

impl CoverageDescriptor {
	#[allow(clippy::too_many_arguments)]
	pub fn create(
		name: impl Into<String>, sample: SampleKind, pixel: PixelKind, bands: u8, compression: Compression, quality: u8,
		tile_width: u32, tile_height: u32, srid: i32, x_resolution: f64, y_resolution: f64, no_data: Option<Pixel>,
	) -> RasterResult<Self> {
		if !is_legal_combination(sample, pixel, bands) {
			return Err(RasterError::InvalidArgument("illegal sample/pixel/band combination"));
		}
		if tile_width == 0 || tile_height == 0 || tile_width % 8 != 0 || tile_height % 8 != 0 {
			return Err(RasterError::InvalidArgument("tile dimensions must be > 0 and divisible by 8"));
		}
		if x_resolution <= 0.0 || y_resolution <= 0.0 {
			return Err(RasterError::InvalidArgument("resolution must be positive"));
		}
		if !compression.supports(sample, pixel) {
			return Err(RasterError::UnsupportedCompression);
		}
		if let Some(nd) = &no_data {
			if nd.sample_kind() != sample || nd.pixel_kind() != pixel || nd.band_count() != bands {
				return Err(RasterError::KindMismatch);
			}
		}

		// quality == 0 means "use the codec library's default"; any other
		// value is clamped into the valid range rather than rejected.
		let quality = if quality == 0 { 0 } else { quality.clamp(1, 100) };

		Ok(Self {
			name: name.into(),
			sample,
			pixel,
			bands,
			compression,
			quality,
			tile_width,
			tile_height,
			srid,
			x_resolution,
			y_resolution,
			no_data,
		})
	}

	pub fn name(&self) -> &str { &self.name }

	pub fn sample_kind(&self) -> SampleKind { self.sample }

	pub fn pixel_kind(&self) -> PixelKind { self.pixel }

	pub fn band_count(&self) -> u8 { self.bands }

	pub fn compression(&self) -> Compression { self.compression }

	pub fn quality(&self) -> u8 { self.quality }

	pub fn tile_width(&self) -> u32 { self.tile_width }

	pub fn tile_height(&self) -> u32 { self.tile_height }

	pub fn srid(&self) -> i32 { self.srid }

	pub fn x_resolution(&self) -> f64 { self.x_resolution }

	pub fn y_resolution(&self) -> f64 { self.y_resolution }

	pub fn no_data(&self) -> Option<&Pixel> { self.no_data.as_ref() }

	/// A zero-initialized Pixel matching this coverage's sample/pixel/bands.
	pub fn create_pixel_template(&self) -> RasterResult<Pixel> { Pixel::create(self.sample, self.pixel, self.bands) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_tile_dims_not_multiple_of_8() {
		let err = CoverageDescriptor::create(
			"test",
			SampleKind::UInt8,
			PixelKind::Grayscale,
			1,
			Compression::None,
			75,
			10,
			256,
			4326,
			1.0,
			1.0,
			None,
		);
		assert!(err.is_err());
	}

	#[test]
	fn quality_zero_is_preserved_as_library_default_sentinel() {
		let cov = CoverageDescriptor::create(
			"test",
			SampleKind::UInt8,
			PixelKind::Rgb,
			3,
			Compression::Jpeg,
			0,
			256,
			256,
			4326,
			1.0,
			1.0,
			None,
		)
		.unwrap();
		assert_eq!(cov.quality(), 0);
	}

	#[test]
	fn rejects_incompatible_compression() {
		let err = CoverageDescriptor::create(
			"test",
			SampleKind::UInt16,
			PixelKind::Multiband,
			4,
			Compression::Jpeg,
			75,
			256,
			256,
			4326,
			1.0,
			1.0,
			None,
		);
		assert!(matches!(err, Err(RasterError::UnsupportedCompression)));
	}

	#[test]
	fn create_pixel_template_matches_descriptor_kind() {
		let cov = CoverageDescriptor::create(
			"test",
			SampleKind::Float32,
			PixelKind::DataGrid,
			1,
			Compression::None,
			75,
			256,
			256,
			4326,
			1.0,
			1.0,
			None,
		)
		.unwrap();
		let px = cov.create_pixel_template().unwrap();
		assert_eq!(px.sample_kind(), SampleKind::Float32);
	}
}
