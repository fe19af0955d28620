use std::f64::consts::{PI, TAU};

use geo::{Coord, Rect};

/// Edges of a tile in clockwise order, starting with the edge that contains
/// angle zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileSide {
    Right,
    Bottom,
    Left,
    Top,
}

impl TileSide {
    pub fn next_clockwise(self) -> Self {
        match self {
            TileSide::Right => TileSide::Bottom,
            TileSide::Bottom => TileSide::Left,
            TileSide::Left => TileSide::Top,
            TileSide::Top => TileSide::Right,
        }
    }

    /// The corner reached when walking clockwise past the end of this side.
    pub fn clockwise_corner(self, bounds: &Rect) -> Coord {
        let (min, max) = (bounds.min(), bounds.max());
        match self {
            TileSide::Right => geo::coord! { x: max.x, y: max.y },
            TileSide::Bottom => geo::coord! { x: min.x, y: max.y },
            TileSide::Left => geo::coord! { x: min.x, y: min.y },
            TileSide::Top => geo::coord! { x: max.x, y: min.y },
        }
    }

    /// Side of `bounds` hit by a ray leaving the center at `angle`.
    pub fn from_angle(angle: f64, bounds: &Rect) -> Self {
        let center = bounds.center();
        let (min, max) = (bounds.min(), bounds.max());
        let bottom_right = angle_of(geo::coord! { x: max.x, y: max.y }, center);
        let bottom_left = angle_of(geo::coord! { x: min.x, y: max.y }, center);
        let top_left = angle_of(geo::coord! { x: min.x, y: min.y }, center);
        let top_right = angle_of(geo::coord! { x: max.x, y: min.y }, center);

        if angle < bottom_right || angle >= top_right {
            TileSide::Right
        } else if angle < bottom_left {
            TileSide::Bottom
        } else if angle < top_left {
            TileSide::Left
        } else {
            TileSide::Top
        }
    }
}

/// Clockwise angle of `point` around `center` in `[0, 2π)`, zero pointing to
/// the right.
pub fn angle_of(point: Coord, center: Coord) -> f64 {
    let angle = (point.y - center.y).atan2(point.x - center.x);
    let angle = if angle < 0.0 { angle + TAU } else { angle };
    if angle >= TAU {
        0.0
    } else {
        angle
    }
}

/// A coastline polyline clipped to the tile, with the angles and sides where
/// it enters and leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct CoastlineWay {
    pub points: Vec<Coord>,
    pub entry_angle: f64,
    pub exit_angle: f64,
    pub entry_side: TileSide,
    pub exit_side: TileSide,
}

impl CoastlineWay {
    pub fn new(points: Vec<Coord>, bounds: &Rect) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let center = bounds.center();
        let entry_angle = angle_of(points[0], center);
        let exit_angle = angle_of(points[points.len() - 1], center);

        Some(Self {
            entry_side: TileSide::from_angle(entry_angle, bounds),
            exit_side: TileSide::from_angle(exit_angle, bounds),
            points,
            entry_angle,
            exit_angle,
        })
    }
}

/// Tile corners passed when walking clockwise along the tile border from the
/// exit of one way to the entry of the next.
///
/// With both points on the same side the walk either goes straight to the
/// entry (clockwise sweep below π) or once around the whole tile. The sweep is
/// taken modulo 2π so the right side, which holds the 0/2π seam, behaves like
/// any other side.
pub fn corners_between(
    exit_side: TileSide,
    exit_angle: f64,
    entry_side: TileSide,
    entry_angle: f64,
    bounds: &Rect,
) -> Vec<Coord> {
    let mut corners = Vec::with_capacity(4);
    let mut side = exit_side;

    if exit_side == entry_side {
        let sweep = (entry_angle - exit_angle).rem_euclid(TAU);
        if sweep < PI {
            return corners;
        }
        corners.push(side.clockwise_corner(bounds));
        side = side.next_clockwise();
    }

    while side != entry_side {
        corners.push(side.clockwise_corner(bounds));
        side = side.next_clockwise();
    }

    corners
}
