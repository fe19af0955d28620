use crate::{
    tile::Tile,
    types::{GeoPoint, TagSet},
};

/// A point of interest as decoded from a block. Borrowed data lives in the
/// block buffer and the decoder scratch space and is only valid during the
/// callback.
#[derive(Debug, Clone, Copy)]
pub struct PointOfInterest<'a> {
    pub layer: u8,
    pub position: GeoPoint,
    pub name: Option<&'a str>,
    pub house_number: Option<&'a str>,
    pub elevation: Option<i32>,
    pub tags: &'a TagSet,
}

#[derive(Debug, Clone, Copy)]
pub struct Way<'a> {
    pub layer: u8,
    /// Number of tags relevant for rendering.
    pub relevant_tags: u8,
    pub name: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub label_position: Option<GeoPoint>,
    pub tags: &'a TagSet,
    /// Which sixteenths of the block the way touches.
    pub tile_bitmask: u16,
    pub nodes: &'a [GeoPoint],
    /// Holes of a multipolygon outline.
    pub inner_rings: &'a [Vec<GeoPoint>],
}

impl Way<'_> {
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first() == self.nodes.last()
    }
}

/// Receives the features of a query as they are decoded.
pub trait MapSink {
    fn render_point_of_interest(&mut self, point: &PointOfInterest<'_>);

    fn render_way(&mut self, way: &Way<'_>);

    /// Tile the coastline of this query should be assembled for. Called once
    /// before any feature.
    fn render_coastline_tile(&mut self, _tile: Tile) {}

    /// Every block of the query is water.
    fn render_water_background(&mut self) {}
}

impl<S: MapSink + ?Sized> MapSink for &mut S {
    fn render_point_of_interest(&mut self, point: &PointOfInterest<'_>) {
        (**self).render_point_of_interest(point)
    }

    fn render_way(&mut self, way: &Way<'_>) {
        (**self).render_way(way)
    }

    fn render_coastline_tile(&mut self, tile: Tile) {
        (**self).render_coastline_tile(tile)
    }

    fn render_water_background(&mut self) {
        (**self).render_water_background()
    }
}
