use coastline::ClosedPolygonHandler;
use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::{
    sink::{MapSink, PointOfInterest, Way},
    tile::Tile,
    types::GeoPoint,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointOfInterestRecord {
    pub layer: u8,
    pub position: GeoPoint,
    pub name: Option<String>,
    pub house_number: Option<String>,
    pub elevation: Option<i32>,
    pub tags: Vec<u16>,
}

impl From<&PointOfInterest<'_>> for PointOfInterestRecord {
    fn from(point: &PointOfInterest<'_>) -> Self {
        Self {
            layer: point.layer,
            position: point.position,
            name: point.name.map(String::from),
            house_number: point.house_number.map(String::from),
            elevation: point.elevation,
            tags: point.tags.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WayRecord {
    pub layer: u8,
    pub relevant_tags: u8,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub label_position: Option<GeoPoint>,
    pub tags: Vec<u16>,
    pub tile_bitmask: u16,
    pub nodes: Vec<GeoPoint>,
    pub inner_rings: Vec<Vec<GeoPoint>>,
}

impl WayRecord {
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first() == self.nodes.last()
    }
}

impl From<&Way<'_>> for WayRecord {
    fn from(way: &Way<'_>) -> Self {
        Self {
            layer: way.layer,
            relevant_tags: way.relevant_tags,
            name: way.name.map(String::from),
            reference: way.reference.map(String::from),
            label_position: way.label_position,
            tags: way.tags.iter().collect(),
            tile_bitmask: way.tile_bitmask,
            nodes: way.nodes.to_vec(),
            inner_rings: way.inner_rings.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoastlineKind {
    Water,
    Island,
    ValidSegment,
    InvalidSegment,
}

/// Output of the coastline assembler in pixels of the coastline tile.
#[derive(Debug, Clone, PartialEq)]
pub struct CoastlineRecord {
    pub kind: CoastlineKind,
    pub points: Vec<Coord>,
}

/// Owns everything a query and its coastline produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollector {
    pub coastline_tile: Option<Tile>,
    pub points_of_interest: Vec<PointOfInterestRecord>,
    pub ways: Vec<WayRecord>,
    pub coastlines: Vec<CoastlineRecord>,
    /// Every block of the query was water.
    pub water_background: bool,
    /// The coastline tile lies inside the sea.
    pub water_tile: bool,
}

impl FeatureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coastlines_of(&self, kind: CoastlineKind) -> impl Iterator<Item = &CoastlineRecord> {
        self.coastlines.iter().filter(move |record| record.kind == kind)
    }

    fn push_coastline(&mut self, kind: CoastlineKind, points: &[Coord]) {
        self.coastlines.push(CoastlineRecord {
            kind,
            points: points.to_vec(),
        });
    }
}

impl MapSink for FeatureCollector {
    fn render_point_of_interest(&mut self, point: &PointOfInterest<'_>) {
        self.points_of_interest.push(point.into());
    }

    fn render_way(&mut self, way: &Way<'_>) {
        self.ways.push(way.into());
    }

    fn render_coastline_tile(&mut self, tile: Tile) {
        self.coastline_tile = Some(tile);
    }

    fn render_water_background(&mut self) {
        self.water_background = true;
    }
}

impl ClosedPolygonHandler for FeatureCollector {
    fn on_water_polygon(&mut self, polygon: &[Coord]) {
        self.push_coastline(CoastlineKind::Water, polygon)
    }

    fn on_island_polygon(&mut self, polygon: &[Coord]) {
        self.push_coastline(CoastlineKind::Island, polygon)
    }

    fn on_valid_coastline_segment(&mut self, segment: &[Coord]) {
        self.push_coastline(CoastlineKind::ValidSegment, segment)
    }

    fn on_invalid_coastline_segment(&mut self, segment: &[Coord]) {
        self.push_coastline(CoastlineKind::InvalidSegment, segment)
    }

    fn on_water_tile(&mut self) {
        self.water_tile = true;
    }
}
