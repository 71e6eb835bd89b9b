//! Raster Statistics: per-band histograms and min/max/mean/stddev,
//! mergeable. See SPEC_FULL.md §4.I, §6.3.

use byteorder::{ByteOrder, LittleEndian};

use crate::{
	error::{RasterError, RasterResult},
	pixel::Sample,
	sample::{PixelKind, SampleKind},
	tile::Tile,
};

const MAGIC: [u8; 2] = [0x00, 0xf0];

#[derive(Clone, Debug)]
struct BandStats {
	min: f64,
	max: f64,
	sum: f64,
	sum_sq: f64,
	count: u64,
	histogram: Vec<u64>,
	bin_lo: f64,
	bin_hi: f64,
}

impl BandStats {
	fn new(bins: usize, bin_lo: f64, bin_hi: f64) -> Self {
		Self {
			min: f64::INFINITY,
			max: f64::NEG_INFINITY,
			sum: 0.0,
			sum_sq: 0.0,
			count: 0,
			histogram: vec![0; bins],
			bin_lo,
			bin_hi,
		}
	}

	fn observe(&mut self, value: f64) {
		self.min = self.min.min(value);
		self.max = self.max.max(value);
		self.sum += value;
		self.sum_sq += value * value;
		self.count += 1;

		let bins = self.histogram.len();
		let span = (self.bin_hi - self.bin_lo).max(f64::EPSILON);
		let bin = (((value - self.bin_lo) / span) * bins as f64) as i64;
		let bin = bin.clamp(0, bins as i64 - 1) as usize;
		self.histogram[bin] += 1;
	}

	fn mean(&self) -> f64 {
		if self.count == 0 {
			0.0
		} else {
			self.sum / self.count as f64
		}
	}

	/// Combines `self` and `other` with Chan's parallel-update formula so
	/// merge order does not matter beyond floating-point round-off.
	fn merge(&self, other: &Self) -> Self {
		if self.count == 0 {
			return other.clone();
		}
		if other.count == 0 {
			return self.clone();
		}

		let n_a = self.count as f64;
		let n_b = other.count as f64;
		let mean_a = self.mean();
		let mean_b = other.mean();

		let delta = mean_b - mean_a;
		let combined_count = n_a + n_b;
		let combined_mean = mean_a + delta * n_b / combined_count;

		let m2_a = self.sum_sq - n_a * mean_a * mean_a;
		let m2_b = other.sum_sq - n_b * mean_b * mean_b;
		let m2 = m2_a + m2_b + delta * delta * n_a * n_b / combined_count;

		let combined_sum = combined_mean * combined_count;
		let combined_sum_sq = m2 + combined_count * combined_mean * combined_mean;

		let histogram = self.histogram.iter().zip(&other.histogram).map(|(a, b)| a + b).collect();

		Self {
			min: self.min.min(other.min),
			max: self.max.max(other.max),
			sum: combined_sum,
			sum_sq: combined_sum_sq,
			count: self.count + other.count,
			histogram,
			bin_lo: self.bin_lo,
			bin_hi: self.bin_hi,
		}
	}
}

/// Per-band min/max/mean/stddev and histograms, plus valid/no-data pixel
/// counts across all accumulated tiles.
pub struct RasterStatistics {
	sample: SampleKind,
	pixel: PixelKind,
	bands: u8,
	valid_count: u64,
	no_data_count: u64,
	band_stats: Vec<BandStats>,
}

impl RasterStatistics {
	/// `bin_range` bounds the histogram for 32-bit/float sample kinds,
	/// which have no fixed domain (see SPEC_FULL.md §4.I); ignored for
	/// narrower kinds, whose domain is implied by the sample kind itself.
	pub fn create(sample: SampleKind, pixel: PixelKind, bands: u8, bin_range: (f64, f64)) -> Self {
		let bins = sample.histogram_bins();
		let (lo, hi) = Self::domain(sample, bin_range);
		Self {
			sample,
			pixel,
			bands,
			valid_count: 0,
			no_data_count: 0,
			band_stats: (0..bands).map(|_| BandStats::new(bins, lo, hi)).collect(),
		}
	}

	fn domain(sample: SampleKind, bin_range: (f64, f64)) -> (f64, f64) {
		match sample {
			SampleKind::Bit1 => (0.0, 2.0),
			SampleKind::Bit2 => (0.0, 4.0),
			SampleKind::Bit4 => (0.0, 16.0),
			SampleKind::Int8 => (i8::MIN as f64, i8::MAX as f64 + 1.0),
			SampleKind::UInt8 => (0.0, 256.0),
			SampleKind::Int16 => (i16::MIN as f64, i16::MAX as f64 + 1.0),
			SampleKind::UInt16 => (0.0, u16::MAX as f64 + 1.0),
			SampleKind::Int32 | SampleKind::UInt32 | SampleKind::Float32 | SampleKind::Float64 => bin_range,
		}
	}

	/// Accumulates every pixel of `tile`: masked-out pixels and pixels
	/// matching `no_data` are counted but excluded from min/max/mean/
	/// histogram.
	pub fn accumulate(&mut self, tile: &Tile, no_data: Option<&crate::pixel::Pixel>) -> RasterResult<()> {
		if tile.sample_kind() != self.sample || tile.pixel_kind() != self.pixel || tile.band_count() != self.bands {
			return Err(RasterError::KindMismatch);
		}

		let mut px = crate::pixel::Pixel::create(self.sample, self.pixel, self.bands)?;
		for row in 0..tile.height() {
			for col in 0..tile.width() {
				tile.get_pixel(row, col, &mut px)?;

				if px.is_transparent() {
					self.no_data_count += 1;
					continue;
				}
				if let Some(nd) = no_data {
					if nd.compare(&px) {
						self.no_data_count += 1;
						continue;
					}
				}

				self.valid_count += 1;
				for band in 0..self.bands {
					let value = sample_to_f64(px.get_sample(band)?);
					self.band_stats[band as usize].observe(value);
				}
			}
		}

		Ok(())
	}

	/// Combines two statistics objects into the statistics of the
	/// concatenation of their source pixels.
	pub fn merge(&self, other: &Self) -> RasterResult<Self> {
		if self.sample != other.sample || self.pixel != other.pixel || self.bands != other.bands {
			return Err(RasterError::KindMismatch);
		}
		Ok(Self {
			sample: self.sample,
			pixel: self.pixel,
			bands: self.bands,
			valid_count: self.valid_count + other.valid_count,
			no_data_count: self.no_data_count + other.no_data_count,
			band_stats: self.band_stats.iter().zip(&other.band_stats).map(|(a, b)| a.merge(b)).collect(),
		})
	}

	pub fn valid_count(&self) -> u64 { self.valid_count }

	pub fn no_data_count(&self) -> u64 { self.no_data_count }

	pub fn min(&self, band: u8) -> f64 { self.band_stats[band as usize].min }

	pub fn max(&self, band: u8) -> f64 { self.band_stats[band as usize].max }

	pub fn mean(&self, band: u8) -> f64 { self.band_stats[band as usize].mean() }

	pub fn stddev(&self, band: u8) -> f64 {
		let stats = &self.band_stats[band as usize];
		if stats.count < 2 {
			return 0.0;
		}
		let variance = (stats.sum_sq - stats.sum * stats.sum / stats.count as f64) / stats.count as f64;
		variance.max(0.0).sqrt()
	}

	pub fn histogram(&self, band: u8) -> &[u64] { &self.band_stats[band as usize].histogram }

	/// Magic `0x00, 0xf0`; sample/pixel/band bytes; valid/no-data counts;
	/// per band: min, max, sum, sum-of-squares, bin count, bins; trailing
	/// CRC32.
	pub fn serialize(&self) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend_from_slice(&MAGIC);
		out.push(self.sample as u8);
		out.push(self.pixel as u8);
		out.push(self.bands);

		let mut buf8 = [0u8; 8];
		LittleEndian::write_u64(&mut buf8, self.valid_count);
		out.extend_from_slice(&buf8);
		LittleEndian::write_u64(&mut buf8, self.no_data_count);
		out.extend_from_slice(&buf8);

		for stats in &self.band_stats {
			let mut buf = [0u8; 8];
			LittleEndian::write_f64(&mut buf, stats.min);
			out.extend_from_slice(&buf);
			LittleEndian::write_f64(&mut buf, stats.max);
			out.extend_from_slice(&buf);
			LittleEndian::write_f64(&mut buf, stats.sum);
			out.extend_from_slice(&buf);
			LittleEndian::write_f64(&mut buf, stats.sum_sq);
			out.extend_from_slice(&buf);

			let mut buf4 = [0u8; 4];
			LittleEndian::write_u32(&mut buf4, stats.histogram.len() as u32);
			out.extend_from_slice(&buf4);
			for &bin in &stats.histogram {
				LittleEndian::write_u64(&mut buf8, bin);
				out.extend_from_slice(&buf8);
			}
		}

		let crc = crc32fast::hash(&out);
		out.extend_from_slice(&crc.to_le_bytes());
		out
	}

	pub fn deserialize(bytes: &[u8]) -> RasterResult<Self> {
		if bytes.len() < 4 {
			return Err(RasterError::CorruptBlob("statistics stream too short"));
		}
		let (body, trailer) = bytes.split_at(bytes.len() - 4);
		let stored_crc = u32::from_le_bytes(trailer.try_into().unwrap());
		if crc32fast::hash(body) != stored_crc {
			return Err(RasterError::CorruptBlob("statistics CRC mismatch"));
		}
		if body[0] != MAGIC[0] || body[1] != MAGIC[1] {
			return Err(RasterError::CorruptBlob("bad statistics magic"));
		}

		let sample = SampleKind::from_code(body[2]).ok_or(RasterError::CorruptBlob("unknown sample kind"))?;
		let pixel = PixelKind::from_code(body[3]).ok_or(RasterError::CorruptBlob("unknown pixel kind"))?;
		let bands = body[4];

		let mut cursor = 5usize;
		let read_u64 = |cursor: &mut usize, body: &[u8]| -> RasterResult<u64> {
			let v = LittleEndian::read_u64(body.get(*cursor..*cursor + 8).ok_or(RasterError::CorruptBlob("truncated"))?);
			*cursor += 8;
			Ok(v)
		};
		let valid_count = read_u64(&mut cursor, body)?;
		let no_data_count = read_u64(&mut cursor, body)?;

		let mut band_stats = Vec::with_capacity(bands as usize);
		for _ in 0..bands {
			let read_f64 = |cursor: &mut usize, body: &[u8]| -> RasterResult<f64> {
				let v = LittleEndian::read_f64(body.get(*cursor..*cursor + 8).ok_or(RasterError::CorruptBlob("truncated"))?);
				*cursor += 8;
				Ok(v)
			};
			let min = read_f64(&mut cursor, body)?;
			let max = read_f64(&mut cursor, body)?;
			let sum = read_f64(&mut cursor, body)?;
			let sum_sq = read_f64(&mut cursor, body)?;

			let bin_count = LittleEndian::read_u32(body.get(cursor..cursor + 4).ok_or(RasterError::CorruptBlob("truncated"))?) as usize;
			cursor += 4;

			let mut histogram = Vec::with_capacity(bin_count);
			for _ in 0..bin_count {
				histogram.push(read_u64(&mut cursor, body)?);
			}

			let count = histogram.iter().sum();
			let (bin_lo, bin_hi) = Self::domain(sample, (min, max.max(min + 1.0)));
			band_stats.push(BandStats {
				min,
				max,
				sum,
				sum_sq,
				count,
				histogram,
				bin_lo,
				bin_hi,
			});
		}

		Ok(Self {
			sample,
			pixel,
			bands,
			valid_count,
			no_data_count,
			band_stats,
		})
	}
}

fn sample_to_f64(sample: Sample) -> f64 {
	match sample {
		Sample::Bit1(v) | Sample::Bit2(v) | Sample::Bit4(v) | Sample::UInt8(v) => v as f64,
		Sample::Int8(v) => v as f64,
		Sample::Int16(v) => v as f64,
		Sample::UInt16(v) => v as f64,
		Sample::Int32(v) => v as f64,
		Sample::UInt32(v) => v as f64,
		Sample::Float32(v) => v as f64,
		Sample::Float64(v) => v,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grid_tile(values: &[u8], w: u32, h: u32) -> Tile {
		Tile::create(w, h, SampleKind::UInt8, PixelKind::DataGrid, 1, values.to_vec(), None, None, None).unwrap()
	}

	#[test]
	fn accumulate_computes_min_max_mean() {
		let tile = grid_tile(&[10, 20, 30, 40], 2, 2);
		let mut stats = RasterStatistics::create(SampleKind::UInt8, PixelKind::DataGrid, 1, (0.0, 256.0));
		stats.accumulate(&tile, None).unwrap();
		assert_eq!(stats.min(0), 10.0);
		assert_eq!(stats.max(0), 40.0);
		assert_eq!(stats.mean(0), 25.0);
		assert_eq!(stats.valid_count(), 4);
	}

	#[test]
	fn no_data_pixels_are_excluded_but_counted() {
		let tile = grid_tile(&[10, 255, 30, 40], 2, 2);
		let mut no_data = crate::pixel::Pixel::create(SampleKind::UInt8, PixelKind::DataGrid, 1).unwrap();
		no_data.set_sample(0, Sample::UInt8(255)).unwrap();

		let mut stats = RasterStatistics::create(SampleKind::UInt8, PixelKind::DataGrid, 1, (0.0, 256.0));
		stats.accumulate(&tile, Some(&no_data)).unwrap();
		assert_eq!(stats.valid_count(), 3);
		assert_eq!(stats.no_data_count(), 1);
		assert_eq!(stats.max(0), 40.0);
	}

	#[test]
	fn merge_matches_accumulating_both_tiles_at_once() {
		let a = grid_tile(&[10, 20], 2, 1);
		let b = grid_tile(&[30, 40], 2, 1);
		let combined = grid_tile(&[10, 20, 30, 40], 2, 2);

		let mut stats_a = RasterStatistics::create(SampleKind::UInt8, PixelKind::DataGrid, 1, (0.0, 256.0));
		stats_a.accumulate(&a, None).unwrap();
		let mut stats_b = RasterStatistics::create(SampleKind::UInt8, PixelKind::DataGrid, 1, (0.0, 256.0));
		stats_b.accumulate(&b, None).unwrap();
		let merged = stats_a.merge(&stats_b).unwrap();

		let mut stats_combined = RasterStatistics::create(SampleKind::UInt8, PixelKind::DataGrid, 1, (0.0, 256.0));
		stats_combined.accumulate(&combined, None).unwrap();

		assert_eq!(merged.valid_count(), stats_combined.valid_count());
		assert!((merged.mean(0) - stats_combined.mean(0)).abs() < 1e-9);
		assert!((merged.stddev(0) - stats_combined.stddev(0)).abs() < 1e-9);
	}

	#[test]
	fn serialize_roundtrips() {
		let tile = grid_tile(&[1, 2, 3, 4, 5, 6], 3, 2);
		let mut stats = RasterStatistics::create(SampleKind::UInt8, PixelKind::DataGrid, 1, (0.0, 256.0));
		stats.accumulate(&tile, None).unwrap();
		let bytes = stats.serialize();
		let restored = RasterStatistics::deserialize(&bytes).unwrap();
		assert_eq!(restored.valid_count(), stats.valid_count());
		assert_eq!(restored.min(0), stats.min(0));
		assert_eq!(restored.max(0), stats.max(0));
		assert_eq!(restored.histogram(0), stats.histogram(0));
	}
}
