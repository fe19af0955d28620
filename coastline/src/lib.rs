//! Reassembles coastline fragments of a map tile into closed water and island
//! polygons.
//!
//! Coordinates are tile pixels with `y` growing downwards. A ring with a
//! positive signed area (clockwise on screen) is water, a negative one is land.

#[macro_use]
extern crate tracing;

pub mod algorithm;
pub mod clip;
pub mod way;

pub use algorithm::{signed_area, ClosedPolygonHandler, CoastlineAlgorithm};
pub use clip::{clip_line, clip_polyline, touches, Outcode};
pub use way::{angle_of, corners_between, CoastlineWay, TileSide};
