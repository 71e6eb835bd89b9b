//! Region Reader: the tile-fetch-decode-composite pipeline. See
//! SPEC_FULL.md §4.H.

use crate::{
	codec,
	coverage::CoverageDescriptor,
	error::{RasterError, RasterResult},
	palette::Palette,
	pixel::Pixel,
	tile::Tile,
};

/// A geographic bounding box in the coverage's SRID.
#[derive(Copy, Clone, Debug)]
pub struct Extent {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

impl Extent {
	fn intersects(&self, other: &Extent) -> bool {
		self.min_x < other.max_x && self.max_x > other.min_x && self.min_y < other.max_y && self.max_y > other.min_y
	}
}

/// The shape the external store's spatial index returns for one tile
/// candidate within a requested window. See SPEC_FULL.md §3.1.
#[derive(Copy, Clone, Debug)]
pub struct TileCatalogEntry {
	pub tile_id: u64,
	pub level: u32,
	pub extent: Extent,
}

/// The SQL-class collaborator the Region Reader fetches tiles through.
/// No implementation ships in this crate; callers implement it against
/// their own store (see SPEC_FULL.md §6.4). `Error` is wrapped into
/// [`RasterError::StoreError`] at the Region Reader boundary.
pub trait TileStore {
	type Error: std::error::Error + Send + Sync + 'static;

	fn coverage_metadata(&self, name: &str) -> Result<CoverageDescriptor, Self::Error>;

	fn tiles_in_window(&self, coverage: &str, level: u32, window: Extent) -> Result<Vec<TileCatalogEntry>, Self::Error>;

	fn fetch_tile_blobs(&self, tile_id: u64) -> Result<(Vec<u8>, Vec<u8>), Self::Error>;

	fn pixel_to_map(&self, coverage: &str, row: u32, col: u32) -> Result<(f64, f64), Self::Error>;
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> RasterError { RasterError::StoreError(Box::new(e)) }

/// Reads a geographic window of a coverage into a dense buffer at the
/// requested pixel dimensions, compositing every intersecting tile at the
/// given pyramid level and scale (typically the output of
/// [`crate::pyramid::resolve`]).
pub fn read<S: TileStore>(
	store: &S, coverage: &str, level: u32, scale: u8, window: Extent, target_width: u32, target_height: u32,
	palette_override: Option<Palette>,
) -> RasterResult<Tile> {
	tracy::zone!("Region Read");

	let descriptor = store.coverage_metadata(coverage).map_err(store_err)?;

	let stride = descriptor.band_count() as usize * descriptor.sample_kind().memory_width();
	let mut buffer = vec![0u8; target_width as usize * target_height as usize * stride];
	if let Some(no_data) = descriptor.no_data() {
		fill_with_pixel(&mut buffer, descriptor.band_count(), descriptor.sample_kind(), no_data);
	}

	let mut catalog = {
		tracy::zone!("Catalog Lookup");
		store.tiles_in_window(coverage, level, window).map_err(store_err)?
	};
	catalog.sort_by_key(|e| e.tile_id);

	let mut resolved_palette = palette_override;
	let mut composited = false;

	for entry in &catalog {
		if !entry.extent.intersects(&window) {
			continue;
		}

		let decoded = {
			tracy::zone!("Fetch + Decode Tile");
			let fetch_result = store.fetch_tile_blobs(entry.tile_id).map_err(store_err);
			let fetch_result = fetch_result.and_then(|(odd, even)| codec::decode(&odd, &even, scale, resolved_palette.clone()));
			match fetch_result {
				Ok(tile) => tile,
				Err(e) => {
					log::error!("Error loading tile {}: {:?}", entry.tile_id, e);
					continue;
				},
			}
		};

		if resolved_palette.is_none() {
			resolved_palette = decoded.palette().cloned();
		}

		{
			tracy::zone!("Composite Tile");
			composite_tile(
				&mut buffer,
				target_width,
				target_height,
				stride,
				&window,
				&entry.extent,
				&decoded,
				descriptor.no_data(),
			)?;
		}
		composited = true;
	}

	if !composited {
		return Err(RasterError::NoMatch);
	}

	Tile::create(
		target_width,
		target_height,
		descriptor.sample_kind(),
		descriptor.pixel_kind(),
		descriptor.band_count(),
		buffer,
		resolved_palette,
		None,
		descriptor.no_data().cloned(),
	)
}

fn fill_with_pixel(buffer: &mut [u8], bands: u8, sample: crate::sample::SampleKind, pixel: &Pixel) {
	let stride = bands as usize * sample.memory_width();
	let mut cell = vec![0u8; stride];
	for band in 0..bands {
		let value = pixel.get_sample(band).expect("no-data pixel already validated against descriptor kind");
		let width = sample.memory_width();
		crate::tile::write_sample(value, &mut cell[band as usize * width..(band as usize + 1) * width]);
	}
	for chunk in buffer.chunks_exact_mut(stride) {
		chunk.copy_from_slice(&cell);
	}
}

#[allow(clippy::too_many_arguments)]
fn composite_tile(
	buffer: &mut [u8], target_width: u32, target_height: u32, stride: usize, window: &Extent, tile_extent: &Extent, tile: &Tile,
	no_data: Option<&Pixel>,
) -> RasterResult<()> {
	let clip = Extent {
		min_x: window.min_x.max(tile_extent.min_x),
		min_y: window.min_y.max(tile_extent.min_y),
		max_x: window.max_x.min(tile_extent.max_x),
		max_y: window.max_y.min(tile_extent.max_y),
	};
	if clip.min_x >= clip.max_x || clip.min_y >= clip.max_y {
		return Ok(());
	}

	let (dst_x0, dst_y1) = geo_to_dest_pixel(window, target_width, target_height, clip.min_x, clip.min_y);
	let (dst_x1, dst_y0) = geo_to_dest_pixel(window, target_width, target_height, clip.max_x, clip.max_y);
	let dst_x0 = dst_x0.max(0).min(target_width as i64) as u32;
	let dst_x1 = dst_x1.max(0).min(target_width as i64) as u32;
	let dst_y0 = dst_y0.max(0).min(target_height as i64) as u32;
	let dst_y1 = dst_y1.max(0).min(target_height as i64) as u32;

	let mut px = Pixel::create(tile.sample_kind(), tile.pixel_kind(), tile.band_count())?;

	for dy in dst_y0..dst_y1 {
		for dx in dst_x0..dst_x1 {
			let (geo_x, geo_y) = dest_pixel_to_geo(window, target_width, target_height, dx, dy);
			let Some((row, col)) = geo_to_tile_pixel(tile_extent, tile.width(), tile.height(), geo_x, geo_y) else {
				continue;
			};

			tile.get_pixel(row, col, &mut px)?;
			if px.is_transparent() {
				continue;
			}
			if let Some(nd) = no_data {
				if nd.compare(&px) {
					continue;
				}
			}

			let width = tile.sample_kind().memory_width();
			let dst_idx = (dy as usize * target_width as usize + dx as usize) * stride;
			for band in 0..tile.band_count() {
				let value = px.get_sample(band)?;
				let start = dst_idx + band as usize * width;
				crate::tile::write_sample(value, &mut buffer[start..start + width]);
			}
		}
	}

	Ok(())
}

fn geo_to_dest_pixel(window: &Extent, width: u32, height: u32, x: f64, y: f64) -> (i64, i64) {
	let px = ((x - window.min_x) / (window.max_x - window.min_x) * width as f64).round() as i64;
	let py = ((window.max_y - y) / (window.max_y - window.min_y) * height as f64).round() as i64;
	(px, py)
}

fn dest_pixel_to_geo(window: &Extent, width: u32, height: u32, px: u32, py: u32) -> (f64, f64) {
	let x = window.min_x + (px as f64 + 0.5) / width as f64 * (window.max_x - window.min_x);
	let y = window.max_y - (py as f64 + 0.5) / height as f64 * (window.max_y - window.min_y);
	(x, y)
}

fn geo_to_tile_pixel(extent: &Extent, tile_width: u32, tile_height: u32, x: f64, y: f64) -> Option<(u32, u32)> {
	if x < extent.min_x || x >= extent.max_x || y < extent.min_y || y >= extent.max_y {
		return None;
	}
	let col = ((x - extent.min_x) / (extent.max_x - extent.min_x) * tile_width as f64) as u32;
	let row = ((extent.max_y - y) / (extent.max_y - extent.min_y) * tile_height as f64) as u32;
	Some((row.min(tile_height - 1), col.min(tile_width - 1)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		codec::{Compression, EncodeOptions},
		sample::{PixelKind, SampleKind},
	};

	struct FakeStore {
		descriptor_sample: SampleKind,
		tiles: Vec<(TileCatalogEntry, Tile)>,
	}

	#[derive(Debug)]
	struct FakeStoreError(String);
	impl std::fmt::Display for FakeStoreError {
		fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { write!(f, "{}", self.0) }
	}
	impl std::error::Error for FakeStoreError {}

	impl TileStore for FakeStore {
		type Error = FakeStoreError;

		fn coverage_metadata(&self, _name: &str) -> Result<CoverageDescriptor, Self::Error> {
			CoverageDescriptor::create(
				"test",
				self.descriptor_sample,
				PixelKind::Rgb,
				3,
				Compression::None,
				75,
				256,
				256,
				4326,
				1.0,
				1.0,
				None,
			)
			.map_err(|e| FakeStoreError(format!("{}", e)))
		}

		fn tiles_in_window(&self, _coverage: &str, _level: u32, _window: Extent) -> Result<Vec<TileCatalogEntry>, Self::Error> {
			Ok(self.tiles.iter().map(|(e, _)| *e).collect())
		}

		fn fetch_tile_blobs(&self, tile_id: u64) -> Result<(Vec<u8>, Vec<u8>), Self::Error> {
			let (_, tile) = self.tiles.iter().find(|(e, _)| e.tile_id == tile_id).ok_or(FakeStoreError("no such tile".into()))?;
			codec::encode(tile, &EncodeOptions::default()).map_err(|e| FakeStoreError(format!("{}", e)))
		}

		fn pixel_to_map(&self, _coverage: &str, row: u32, col: u32) -> Result<(f64, f64), Self::Error> {
			Ok((col as f64, row as f64))
		}
	}

	fn solid_tile(color: [u8; 3]) -> Tile {
		let buf: Vec<u8> = (0..256 * 256).flat_map(|_| color).collect();
		Tile::create(256, 256, SampleKind::UInt8, PixelKind::Rgb, 3, buf, None, None, None).unwrap()
	}

	#[test]
	fn higher_tile_id_wins_on_overlap() {
		// Two overlapping tiles covering the same 256x256 window: blue at
		// id 1, red at id 2. Ascending application means red (the higher
		// id) wins the overlap.
		let blue = solid_tile([0, 0, 255]);
		let red = solid_tile([255, 0, 0]);

		let window = Extent {
			min_x: 0.0,
			min_y: 0.0,
			max_x: 256.0,
			max_y: 256.0,
		};
		let tile_extent = window;

		let store = FakeStore {
			descriptor_sample: SampleKind::UInt8,
			tiles: vec![
				(
					TileCatalogEntry {
						tile_id: 1,
						level: 0,
						extent: tile_extent,
					},
					blue,
				),
				(
					TileCatalogEntry {
						tile_id: 2,
						level: 0,
						extent: tile_extent,
					},
					red,
				),
			],
		};

		let result = read(&store, "test", 0, 1, window, 256, 256, None).unwrap();
		assert_eq!(&result.buffer()[0..3], &[255, 0, 0]);
	}

	#[test]
	fn empty_catalog_is_no_match() {
		let store = FakeStore {
			descriptor_sample: SampleKind::UInt8,
			tiles: vec![],
		};
		let window = Extent {
			min_x: 0.0,
			min_y: 0.0,
			max_x: 10.0,
			max_y: 10.0,
		};
		assert!(matches!(read(&store, "test", 0, 1, window, 10, 10, None), Err(RasterError::NoMatch)));
	}
}
