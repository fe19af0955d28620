use std::{fmt, str::FromStr};

use geo::{coord, Coord, Rect};
use nom::{
    character::complete::{char, u64 as integer, u8 as zoom},
    combinator::{all_consuming, map_res},
    sequence::{terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::{
    mercator::{self, MAX_ZOOM},
    types::GeoPoint,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileError {
    #[error("zoom level {0} is above {}", MAX_ZOOM)]
    Zoom(u8),
    #[error("tile {x}/{y} does not exist at zoom level {zoom}")]
    OutOfRange { x: u64, y: u64, zoom: u8 },
    #[error("expected `zoom/x/y`, got {0:?}")]
    Syntax(String),
}

/// A map tile in the usual slippy map numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    pub zoom: u8,
    pub x: u64,
    pub y: u64,
}

impl Tile {
    pub fn new(x: u64, y: u64, zoom: u8) -> Result<Self, TileError> {
        if zoom > MAX_ZOOM {
            return Err(TileError::Zoom(zoom));
        }
        let tiles = mercator::tiles_per_axis(zoom);
        if x >= tiles || y >= tiles {
            return Err(TileError::OutOfRange { x, y, zoom });
        }
        Ok(Self { zoom, x, y })
    }

    /// Tile covering `point` at `zoom`.
    pub fn containing(point: GeoPoint, zoom: u8) -> Result<Self, TileError> {
        Self::new(
            mercator::longitude_to_tile_x(point.longitude_degrees(), zoom),
            mercator::latitude_to_tile_y(point.latitude_degrees(), zoom),
            zoom,
        )
    }

    /// Ancestor of this tile at a zoom level not deeper than its own.
    pub fn ancestor(&self, zoom: u8) -> Self {
        let shift = self.zoom.saturating_sub(zoom);
        Self {
            zoom: self.zoom - shift,
            x: self.x >> shift,
            y: self.y >> shift,
        }
    }

    pub fn origin(&self) -> GeoPoint {
        mercator::tile_origin(self.x, self.y, self.zoom)
    }

    /// Global pixel coordinates of the north-west corner.
    pub fn pixel_origin(&self, tile_size: u16) -> Coord {
        coord! {
            x: self.x as f64 * f64::from(tile_size),
            y: self.y as f64 * f64::from(tile_size),
        }
    }

    /// Pixel rectangle of the tile in its own coordinate space.
    pub fn pixel_bounds(tile_size: u16) -> Rect {
        Rect::new(
            coord! { x: 0.0, y: 0.0 },
            coord! { x: f64::from(tile_size), y: f64::from(tile_size) },
        )
    }

    /// Range of tiles at the deeper `zoom` covered by this tile.
    pub fn descendants(&self, zoom: u8) -> (std::ops::RangeInclusive<u64>, std::ops::RangeInclusive<u64>) {
        let shift = zoom.saturating_sub(self.zoom);
        let span = 1u64 << shift;
        let (x, y) = (self.x << shift, self.y << shift);
        (x..=x + span - 1, y..=y + span - 1)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

fn tile_numbers(s: &str) -> IResult<&str, (u8, u64, u64)> {
    tuple((
        terminated(zoom, char('/')),
        terminated(integer, char('/')),
        integer,
    ))(s)
}

/// Parses `zoom/x/y`.
pub fn parse_tile(s: &str) -> IResult<&str, Tile> {
    map_res(tile_numbers, |(zoom, x, y)| Tile::new(x, y, zoom))(s)
}

impl FromStr for Tile {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, (zoom, x, y)) = all_consuming(tile_numbers)(s.trim())
            .map_err(|_| TileError::Syntax(s.into()))?;
        Tile::new(x, y, zoom)
    }
}

#[test]
fn parse_tiles() {
    assert_eq!("14/8800/5373".parse(), Ok(Tile { zoom: 14, x: 8800, y: 5373 }));
    assert_eq!(" 0/0/0 ".parse(), Ok(Tile { zoom: 0, x: 0, y: 0 }));
    assert!(matches!("1/2/0".parse::<Tile>(), Err(TileError::OutOfRange { .. })));
    assert!(matches!("30/0/0".parse::<Tile>(), Err(TileError::Zoom(30))));
    assert!(matches!("14/8800".parse::<Tile>(), Err(TileError::Syntax(_))));
    assert!(matches!("14/8800/5373/1".parse::<Tile>(), Err(TileError::Syntax(_))));
    assert_eq!(Tile { zoom: 3, x: 1, y: 7 }.to_string(), "3/1/7");
}

#[test]
fn tile_hierarchy() {
    let tile = Tile::new(37, 21, 6).unwrap();
    assert_eq!(tile.ancestor(4), Tile { zoom: 4, x: 9, y: 5 });
    assert_eq!(tile.ancestor(8), tile);

    let parent = Tile::new(1, 2, 2).unwrap();
    assert_eq!(parent.descendants(4), (4..=7, 8..=11));
    assert_eq!(parent.descendants(2), (1..=1, 2..=2));
}

#[test]
fn tile_containing_point() {
    let berlin = GeoPoint::from_degrees(52.52, 13.405);
    let tile = Tile::containing(berlin, 14).unwrap();
    assert_eq!((tile.x, tile.y), (8802, 5373));
    assert!(Tile::containing(berlin, 22).is_err());
}
