use std::collections::{HashMap, HashSet};

use geo::{Area, Coord, LineString, Polygon, Rect};

use crate::{
    clip::{clip_polyline, touches},
    way::{corners_between, CoastlineWay},
};

/// Receives the output of [`CoastlineAlgorithm::generate_closed_polygons`].
pub trait ClosedPolygonHandler {
    fn on_water_polygon(&mut self, polygon: &[Coord]);
    fn on_island_polygon(&mut self, polygon: &[Coord]);
    fn on_valid_coastline_segment(&mut self, segment: &[Coord]);
    fn on_invalid_coastline_segment(&mut self, segment: &[Coord]);
    /// The whole tile is covered by water.
    fn on_water_tile(&mut self);
}

impl<H: ClosedPolygonHandler + ?Sized> ClosedPolygonHandler for &mut H {
    fn on_water_polygon(&mut self, polygon: &[Coord]) {
        (**self).on_water_polygon(polygon)
    }
    fn on_island_polygon(&mut self, polygon: &[Coord]) {
        (**self).on_island_polygon(polygon)
    }
    fn on_valid_coastline_segment(&mut self, segment: &[Coord]) {
        (**self).on_valid_coastline_segment(segment)
    }
    fn on_invalid_coastline_segment(&mut self, segment: &[Coord]) {
        (**self).on_invalid_coastline_segment(segment)
    }
    fn on_water_tile(&mut self) {
        (**self).on_water_tile()
    }
}

/// Exact bit pattern of a point, used to join fragments sharing an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointKey(u64, u64);

impl From<Coord> for PointKey {
    fn from(point: Coord) -> Self {
        // `+ 0.0` folds -0.0 into 0.0
        PointKey((point.x + 0.0).to_bits(), (point.y + 0.0).to_bits())
    }
}

/// Signed area of a ring. Positive when clockwise on screen (y down).
pub fn signed_area(ring: &[Coord]) -> f64 {
    Polygon::new(LineString::from(ring.to_vec()), vec![]).signed_area()
}

/// Rebuilds closed water and island polygons for a single tile out of
/// coastline fragments.
#[derive(Debug, Default)]
pub struct CoastlineAlgorithm {
    /// open fragments keyed by their first point
    starts: HashMap<PointKey, Vec<Coord>>,
    /// last point -> first point of the same open fragment
    ends: HashMap<PointKey, PointKey>,
    handled: HashSet<(PointKey, PointKey)>,
    closed: Vec<Vec<Coord>>,
}

impl CoastlineAlgorithm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.starts.clear();
        self.ends.clear();
        self.handled.clear();
        self.closed.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty() && self.closed.is_empty()
    }

    pub fn open_fragments(&self) -> impl Iterator<Item = &[Coord]> + '_ {
        self.starts.values().map(Vec::as_slice)
    }

    pub fn closed_fragments(&self) -> impl Iterator<Item = &[Coord]> + '_ {
        self.closed.iter().map(Vec::as_slice)
    }

    /// Adds a coastline polyline, merging it with stored fragments that share
    /// an endpoint.
    pub fn add_segment(&mut self, mut segment: Vec<Coord>) {
        let (Some(&first), Some(&last)) = (segment.first(), segment.last()) else {
            return;
        };
        if segment.len() < 2 {
            trace!("ignoring coastline with a single point");
            return;
        }

        let mut start = PointKey::from(first);
        let mut end = PointKey::from(last);

        if !self.handled.insert((start, end)) {
            trace!(?first, ?last, "coastline segment already added");
            return;
        }

        if start == end {
            self.closed.push(segment);
            return;
        }

        if let Some(next) = self.take_starting_at(end) {
            segment.extend_from_slice(&next[1..]);
            end = PointKey::from(next[next.len() - 1]);
            if start == end {
                self.closed.push(segment);
                return;
            }
        }

        if let Some(mut previous) = self.take_ending_at(start) {
            previous.extend_from_slice(&segment[1..]);
            segment = previous;
            start = PointKey::from(segment[0]);
            if start == end {
                self.closed.push(segment);
                return;
            }
        }

        if let Some(replaced) = self.starts.insert(start, segment) {
            debug!("two coastline fragments start at the same point, keeping the last one");
            let replaced_end = PointKey::from(replaced[replaced.len() - 1]);
            if self.ends.get(&replaced_end) == Some(&start) {
                self.ends.remove(&replaced_end);
            }
        }
        self.ends.insert(end, start);
    }

    fn take_starting_at(&mut self, key: PointKey) -> Option<Vec<Coord>> {
        let fragment = self.starts.remove(&key)?;
        let end = PointKey::from(fragment[fragment.len() - 1]);
        if self.ends.get(&end) == Some(&key) {
            self.ends.remove(&end);
        }
        Some(fragment)
    }

    fn take_ending_at(&mut self, key: PointKey) -> Option<Vec<Coord>> {
        let start = self.ends.remove(&key)?;
        self.starts.remove(&start)
    }

    /// Classifies closed rings, clips open fragments to `bounds` and stitches
    /// them along the tile border into water polygons.
    ///
    /// All accumulated state is consumed; the algorithm is empty afterwards.
    #[tracing::instrument(skip_all, fields(open = self.starts.len(), closed = self.closed.len()))]
    pub fn generate_closed_polygons<H>(&mut self, bounds: Rect, handler: &mut H)
    where
        H: ClosedPolygonHandler + ?Sized,
    {
        let closed = std::mem::take(&mut self.closed);
        let open: Vec<Vec<Coord>> = self.starts.drain().map(|(_, fragment)| fragment).collect();
        self.clear();

        let mut water = false;
        let mut island = false;
        for ring in &closed {
            let area = signed_area(ring);
            if area > 0.0 {
                water = true;
                handler.on_water_polygon(ring);
            } else if area < 0.0 {
                island = true;
                handler.on_island_polygon(ring);
            } else {
                trace!(points = ring.len(), "skipping degenerate coastline ring");
            }
        }

        let (min, max) = (bounds.min(), bounds.max());
        let strictly_inside =
            |p: &Coord| p.x > min.x && p.x < max.x && p.y > min.y && p.y < max.y;

        let mut invalid = false;
        let mut ways = Vec::with_capacity(open.len());
        for segment in &open {
            if strictly_inside(&segment[0]) || strictly_inside(&segment[segment.len() - 1]) {
                debug!(
                    start = ?segment[0],
                    end = ?segment[segment.len() - 1],
                    "coastline segment ends inside the tile"
                );
                invalid = true;
                handler.on_invalid_coastline_segment(segment);
                continue;
            }
            if !touches(segment, &bounds) {
                continue;
            }
            if let Some(way) =
                clip_polyline(segment, &bounds).and_then(|points| CoastlineWay::new(points, &bounds))
            {
                ways.push(way);
            }
        }

        if invalid {
            for way in &ways {
                handler.on_valid_coastline_segment(&way.points);
            }
            return;
        }

        if open.is_empty() {
            if island && !water {
                handler.on_water_tile();
            }
            return;
        }

        stitch(ways, &bounds, handler);
    }
}

fn sort_by_entry(ways: &mut [CoastlineWay]) {
    ways.sort_by(|a, b| a.entry_angle.total_cmp(&b.entry_angle));
}

/// Joins clipped ways clockwise along the tile border until every way has been
/// closed into a water polygon.
fn stitch<H>(mut ways: Vec<CoastlineWay>, bounds: &Rect, handler: &mut H)
where
    H: ClosedPolygonHandler + ?Sized,
{
    sort_by_entry(&mut ways);

    while !ways.is_empty() {
        let exit_angle = ways[0].exit_angle;
        let next = ways
            .iter()
            .position(|way| way.entry_angle > exit_angle)
            .unwrap_or(0);

        let corners = corners_between(
            ways[0].exit_side,
            exit_angle,
            ways[next].entry_side,
            ways[next].entry_angle,
            bounds,
        );

        if next == 0 {
            let mut ring = ways.remove(0).points;
            ring.extend(corners);
            let first = ring[0];
            ring.push(first);
            handler.on_water_polygon(&ring);
            continue;
        }

        let following = ways.remove(next);
        let mut joined = ways.remove(0).points;
        joined.extend(corners);
        joined.extend(following.points);

        match clip_polyline(&joined, bounds).and_then(|points| CoastlineWay::new(points, bounds)) {
            Some(way) => {
                ways.push(way);
                sort_by_entry(&mut ways);
            }
            None => warn!(points = joined.len(), "stitched coastline fell outside the tile"),
        }
    }
}
