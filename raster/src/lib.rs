//! The core raster storage engine of a tiled, geo-referenced raster library.
//!
//! A raster is a [`coverage::CoverageDescriptor`] made of [`section::Section`]s,
//! each carrying a [`tile::Tile`]. Tiles are serialized by [`codec`] into an
//! (odd, even) BLOB pair, catalogued by pyramid level, and reassembled by
//! [`region`] into an arbitrary geographic window at the scale [`pyramid`]
//! resolves for. [`stats`] accumulates per-band histograms and moments
//! alongside. See `SPEC_FULL.md` for the full design.
//!
//! The SQL-class store, external image file adapters, styling, and the
//! HTTP/WMS server are out of scope; this crate models their interface
//! contracts as traits ([`region::TileStore`], [`section::FormatAdapter`])
//! with no concrete implementation.

pub mod codec;
pub mod coverage;
pub mod error;
pub mod palette;
pub mod pixel;
pub mod pyramid;
pub mod region;
pub mod sample;
pub mod section;
pub mod stats;
pub mod tile;

pub use error::{RasterError, RasterResult};
