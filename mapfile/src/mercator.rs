//! Spherical Mercator conversions between geographic coordinates, tile numbers
//! and pixels.
//!
//! Pixel and tile `y` values grow southwards.

use std::f64::consts::PI;

use crate::types::{GeoPoint, MICRO_DEGREES};

/// Latitude where the projected world becomes a square.
pub const LATITUDE_MAX: f64 = 85.05112877980659;
pub const LATITUDE_MIN: f64 = -LATITUDE_MAX;

/// Highest zoom level tile numbers are computed for.
pub const MAX_ZOOM: u8 = 21;

/// Number of tiles along one axis at `zoom`.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Side length of the whole world in pixels at `zoom`.
#[inline]
pub fn map_size(zoom: u8, tile_size: u16) -> f64 {
    f64::from(tile_size) * tiles_per_axis(zoom) as f64
}

fn clamp_latitude(latitude: f64) -> f64 {
    latitude.clamp(LATITUDE_MIN, LATITUDE_MAX)
}

/// Fraction of the world width in `[0, 1]` west of `longitude`.
fn longitude_fraction(longitude: f64) -> f64 {
    ((longitude + 180.0) / 360.0).clamp(0.0, 1.0)
}

/// Fraction of the world height in `[0, 1]` north of `latitude`.
fn latitude_fraction(latitude: f64) -> f64 {
    let sin = (clamp_latitude(latitude) * PI / 180.0).sin();
    (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)).clamp(0.0, 1.0)
}

pub fn longitude_to_pixel_x(longitude: f64, zoom: u8, tile_size: u16) -> f64 {
    longitude_fraction(longitude) * map_size(zoom, tile_size)
}

pub fn latitude_to_pixel_y(latitude: f64, zoom: u8, tile_size: u16) -> f64 {
    latitude_fraction(latitude) * map_size(zoom, tile_size)
}

pub fn pixel_x_to_longitude(x: f64, zoom: u8, tile_size: u16) -> f64 {
    360.0 * (x / map_size(zoom, tile_size)) - 180.0
}

pub fn pixel_y_to_latitude(y: f64, zoom: u8, tile_size: u16) -> f64 {
    let y = 0.5 - y / map_size(zoom, tile_size);
    90.0 - 360.0 * (-y * 2.0 * PI).exp().atan() / PI
}

fn fraction_to_tile(fraction: f64, zoom: u8) -> u64 {
    let tiles = tiles_per_axis(zoom);
    ((fraction * tiles as f64) as u64).min(tiles - 1)
}

pub fn longitude_to_tile_x(longitude: f64, zoom: u8) -> u64 {
    fraction_to_tile(longitude_fraction(longitude), zoom)
}

pub fn latitude_to_tile_y(latitude: f64, zoom: u8) -> u64 {
    fraction_to_tile(latitude_fraction(latitude), zoom)
}

/// Longitude of the western edge of tile column `x`.
pub fn tile_x_to_longitude(x: u64, zoom: u8) -> f64 {
    x as f64 / tiles_per_axis(zoom) as f64 * 360.0 - 180.0
}

/// Latitude of the northern edge of tile row `y`.
pub fn tile_y_to_latitude(y: u64, zoom: u8) -> f64 {
    let y = y as f64 / tiles_per_axis(zoom) as f64;
    (PI * (1.0 - 2.0 * y)).sinh().atan() * 180.0 / PI
}

/// North-west corner of a tile in micro-degrees, truncated towards zero.
pub fn tile_origin(x: u64, y: u64, zoom: u8) -> GeoPoint {
    GeoPoint {
        latitude: (tile_y_to_latitude(y, zoom) * MICRO_DEGREES) as i32,
        longitude: (tile_x_to_longitude(x, zoom) * MICRO_DEGREES) as i32,
    }
}
