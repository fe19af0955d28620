//! Line and polyline clipping against an axis aligned rectangle.
//!
//! Coordinates follow screen conventions: `y` grows downwards, so the "top"
//! edge of a rectangle is `min().y` and the "bottom" edge is `max().y`.

use bitflags::bitflags;
use geo::{Coord, Rect};

bitflags! {
    /// Cohen–Sutherland region code of a point relative to a rectangle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Outcode: u8 {
        const LEFT = 0b0001;
        const RIGHT = 0b0010;
        const TOP = 0b0100;
        const BOTTOM = 0b1000;
    }
}

impl Outcode {
    pub fn of(point: Coord, rect: &Rect) -> Self {
        let (min, max) = (rect.min(), rect.max());
        let mut code = Outcode::empty();

        if point.x < min.x {
            code |= Outcode::LEFT;
        } else if point.x > max.x {
            code |= Outcode::RIGHT;
        }

        if point.y < min.y {
            code |= Outcode::TOP;
        } else if point.y > max.y {
            code |= Outcode::BOTTOM;
        }

        code
    }
}

/// Clips the segment `a -> b` to `rect` with the Cohen–Sutherland algorithm.
///
/// Returns the clipped endpoints, or `None` when the segment does not touch
/// the rectangle.
pub fn clip_line(mut a: Coord, mut b: Coord, rect: &Rect) -> Option<(Coord, Coord)> {
    let (min, max) = (rect.min(), rect.max());
    let mut code_a = Outcode::of(a, rect);
    let mut code_b = Outcode::of(b, rect);

    loop {
        if (code_a | code_b).is_empty() {
            return Some((a, b));
        }
        if code_a.intersects(code_b) {
            return None;
        }

        let move_a = !code_a.is_empty();
        let outside = if move_a { code_a } else { code_b };

        let point = if outside.contains(Outcode::TOP) {
            geo::coord! { x: a.x + (b.x - a.x) * (min.y - a.y) / (b.y - a.y), y: min.y }
        } else if outside.contains(Outcode::BOTTOM) {
            geo::coord! { x: a.x + (b.x - a.x) * (max.y - a.y) / (b.y - a.y), y: max.y }
        } else if outside.contains(Outcode::RIGHT) {
            geo::coord! { x: max.x, y: a.y + (b.y - a.y) * (max.x - a.x) / (b.x - a.x) }
        } else {
            geo::coord! { x: min.x, y: a.y + (b.y - a.y) * (min.x - a.x) / (b.x - a.x) }
        };

        if move_a {
            a = point;
            code_a = Outcode::of(a, rect);
        } else {
            b = point;
            code_b = Outcode::of(b, rect);
        }
    }
}

/// True when any segment of `polyline` touches `rect`.
pub fn touches(polyline: &[Coord], rect: &Rect) -> bool {
    match polyline {
        [] => false,
        [point] => Outcode::of(*point, rect).is_empty(),
        _ => polyline
            .windows(2)
            .any(|pair| clip_line(pair[0], pair[1], rect).is_some()),
    }
}

/// One of the four half-planes bounding a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Bottom,
    Right,
    Top,
    Left,
}

impl Edge {
    pub const CLIP_ORDER: [Edge; 4] = [Edge::Bottom, Edge::Right, Edge::Top, Edge::Left];

    pub fn contains(self, point: Coord, rect: &Rect) -> bool {
        match self {
            Edge::Bottom => point.y <= rect.max().y,
            Edge::Right => point.x <= rect.max().x,
            Edge::Top => point.y >= rect.min().y,
            Edge::Left => point.x >= rect.min().x,
        }
    }

    /// Intersection of `a -> b` with the edge line. The two points must lie on
    /// different sides of the edge.
    fn intersection(self, a: Coord, b: Coord, rect: &Rect) -> Coord {
        match self {
            Edge::Bottom | Edge::Top => {
                let y = if self == Edge::Bottom { rect.max().y } else { rect.min().y };
                geo::coord! { x: a.x + (b.x - a.x) * (y - a.y) / (b.y - a.y), y: y }
            }
            Edge::Right | Edge::Left => {
                let x = if self == Edge::Right { rect.max().x } else { rect.min().x };
                geo::coord! { x: x, y: a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x) }
            }
        }
    }
}

fn push_distinct(out: &mut Vec<Coord>, point: Coord) {
    if out.last() != Some(&point) {
        out.push(point);
    }
}

/// Sutherland–Hodgman step for an open polyline against a single edge.
///
/// Appends the clipped polyline to `out`. Points on the edge count as inside.
pub fn clip_polyline_edge(polyline: &[Coord], edge: Edge, rect: &Rect, out: &mut Vec<Coord>) {
    let Some((&first, rest)) = polyline.split_first() else {
        return;
    };

    let mut previous = first;
    let mut previous_inside = edge.contains(first, rect);
    if previous_inside {
        out.push(first);
    }

    for &point in rest {
        let inside = edge.contains(point, rect);
        match (previous_inside, inside) {
            (true, true) => out.push(point),
            (true, false) => push_distinct(out, edge.intersection(previous, point, rect)),
            (false, true) => {
                push_distinct(out, edge.intersection(previous, point, rect));
                push_distinct(out, point);
            }
            (false, false) => {}
        }
        previous = point;
        previous_inside = inside;
    }
}

/// Clips an open polyline to `rect`, one edge at a time in bottom, right, top,
/// left order. Returns `None` when less than two points survive.
pub fn clip_polyline(polyline: &[Coord], rect: &Rect) -> Option<Vec<Coord>> {
    let mut current = polyline.to_vec();
    let mut next = Vec::with_capacity(polyline.len());

    for edge in Edge::CLIP_ORDER {
        next.clear();
        clip_polyline_edge(&current, edge, rect, &mut next);
        std::mem::swap(&mut current, &mut next);
        if current.len() < 2 {
            return None;
        }
    }

    Some(current)
}
