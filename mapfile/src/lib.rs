//! Reader for binary vector map files: header validation, tile queries over
//! the zoom-interval sub-files and assembly of coastline polygons.

#[macro_use]
extern crate tracing;

pub mod block;
pub mod buffer;
pub mod coastline;
pub mod collect;
pub mod config;
pub mod database;
pub mod header;
pub mod index_cache;
pub mod mercator;
pub mod pipe;
pub mod query;
pub mod ser;
pub mod sink;
pub mod tags;
pub mod tile;
pub mod types;
pub mod vbe;

pub use crate::{
    coastline::{CoastlineFilter, Projection, TileProjection},
    collect::FeatureCollector,
    config::MapFileOptions,
    database::{MapFile, QueryReport, QueryStatus, StopHandle},
    header::{Header, OpenError, SubFile},
    sink::{MapSink, PointOfInterest, Way},
    tile::Tile,
    types::{BoundingBox, GeoPoint, TagSet},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("geojson: {0}")]
    Geojson(#[from] geojson::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Tile(#[from] tile::TileError),
    #[error("worker failed: {0}")]
    Worker(String),
}
