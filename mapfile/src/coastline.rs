//! Routes `natural=coastline` ways of a query into a [`CoastlineAlgorithm`].

use coastline::{ClosedPolygonHandler, CoastlineAlgorithm};
use geo::{coord, Coord, Rect};

use crate::{
    header::Header,
    mercator,
    sink::{MapSink, PointOfInterest, Way},
    tags::COASTLINE,
    tile::Tile,
    types::GeoPoint,
};

/// Maps geographic points into the pixel space of a tile, `y` growing
/// southwards.
pub trait Projection {
    fn project(&self, tile: Tile, point: GeoPoint) -> Coord;

    fn unproject(&self, tile: Tile, point: Coord) -> GeoPoint;

    fn tile_bounds(&self, tile: Tile) -> Rect;
}

/// Mercator pixels relative to the tile's north-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProjection {
    pub tile_size: u16,
}

impl Projection for TileProjection {
    fn project(&self, tile: Tile, point: GeoPoint) -> Coord {
        let origin = tile.pixel_origin(self.tile_size);
        coord! {
            x: mercator::longitude_to_pixel_x(point.longitude_degrees(), tile.zoom, self.tile_size) - origin.x,
            y: mercator::latitude_to_pixel_y(point.latitude_degrees(), tile.zoom, self.tile_size) - origin.y,
        }
    }

    fn unproject(&self, tile: Tile, point: Coord) -> GeoPoint {
        let origin = tile.pixel_origin(self.tile_size);
        GeoPoint::from_degrees(
            mercator::pixel_y_to_latitude(point.y + origin.y, tile.zoom, self.tile_size),
            mercator::pixel_x_to_longitude(point.x + origin.x, tile.zoom, self.tile_size),
        )
    }

    fn tile_bounds(&self, _tile: Tile) -> Rect {
        Tile::pixel_bounds(self.tile_size)
    }
}

/// A [`MapSink`] that keeps coastline ways for itself and forwards everything
/// else to `inner`. [`CoastlineFilter::finish`] turns the collected coastline
/// into polygons reported to `inner`.
#[derive(Debug)]
pub struct CoastlineFilter<S, P = TileProjection> {
    inner: S,
    projection: P,
    coastline_tag: Option<u16>,
    tile: Option<Tile>,
    algorithm: CoastlineAlgorithm,
}

impl<S> CoastlineFilter<S> {
    pub fn new(inner: S, header: &Header) -> Self {
        Self::with_projection(
            inner,
            header,
            TileProjection {
                tile_size: header.tile_size,
            },
        )
    }
}

impl<S, P: Projection> CoastlineFilter<S, P> {
    pub fn with_projection(inner: S, header: &Header, projection: P) -> Self {
        let coastline_tag = header.way_tags.id(COASTLINE);
        if coastline_tag.is_none() {
            debug!("map file declares no coastline tag");
        }
        Self {
            inner,
            projection,
            coastline_tag,
            tile: None,
            algorithm: CoastlineAlgorithm::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Drops the collected coastline.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn is_coastline(&self, way: &Way<'_>) -> bool {
        self.coastline_tag.map_or(false, |id| way.tags.contains(id))
    }

    /// Generates the coastline polygons of the tile announced by the last
    /// query and hands back the inner sink.
    pub fn finish(mut self) -> S
    where
        S: ClosedPolygonHandler,
    {
        match self.tile {
            Some(tile) => {
                let bounds = self.projection.tile_bounds(tile);
                self.algorithm
                    .generate_closed_polygons(bounds, &mut self.inner);
            }
            None if !self.algorithm.is_empty() => {
                warn!("coastline collected without a coastline tile");
            }
            None => {}
        }
        self.inner
    }
}

impl<S: MapSink, P: Projection> MapSink for CoastlineFilter<S, P> {
    fn render_point_of_interest(&mut self, point: &PointOfInterest<'_>) {
        self.inner.render_point_of_interest(point)
    }

    fn render_way(&mut self, way: &Way<'_>) {
        if !self.is_coastline(way) {
            return self.inner.render_way(way);
        }
        let Some(tile) = self.tile else {
            return self.inner.render_way(way);
        };

        let points = way
            .nodes
            .iter()
            .map(|&node| self.projection.project(tile, node))
            .collect();
        self.algorithm.add_segment(points);
    }

    fn render_coastline_tile(&mut self, tile: Tile) {
        self.algorithm.clear();
        self.tile = Some(tile);
        self.inner.render_coastline_tile(tile)
    }

    fn render_water_background(&mut self) {
        self.inner.render_water_background()
    }
}
