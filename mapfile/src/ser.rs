use std::io::Write;

use geo::{Coord, LineString, Point, Polygon};
use geojson::{feature::Id, Feature};
use serde::Serialize;

use crate::{
    coastline::Projection,
    collect::{CoastlineKind, CoastlineRecord, FeatureCollector, PointOfInterestRecord, WayRecord},
    header::Header,
    tags::TagDictionary,
    tile::Tile,
    types::GeoPoint,
    Error,
};

#[derive(Debug, Serialize)]
struct PointOfInterestProperties<'a> {
    kind: &'static str,
    layer: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    house_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elevation: Option<i32>,
    tags: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct WayProperties<'a> {
    kind: &'static str,
    layer: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    reference: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<[f64; 2]>,
    tags: Vec<&'a str>,
    tile_bitmask: u16,
}

#[derive(Debug, Serialize)]
struct CoastlineProperties {
    kind: &'static str,
    coastline: CoastlineKind,
    tile: String,
}

fn properties<T: Serialize>(properties: &T) -> Option<geojson::JsonObject> {
    serde_json::to_value(properties)
        .ok()
        .as_ref()
        .and_then(geojson::JsonValue::as_object)
        .cloned()
}

fn feature(id: String, geometry: geojson::Geometry, properties: Option<geojson::JsonObject>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: Some(Id::String(id)),
        properties,
        foreign_members: None,
    }
}

/// The two tag dictionaries of a map file.
#[derive(Debug, Clone, Copy)]
pub struct TagNames<'a> {
    pub points_of_interest: &'a TagDictionary,
    pub ways: &'a TagDictionary,
}

impl<'a> From<&'a Header> for TagNames<'a> {
    fn from(header: &'a Header) -> Self {
        Self {
            points_of_interest: &header.point_of_interest_tags,
            ways: &header.way_tags,
        }
    }
}

fn tag_names<'a>(dictionary: &'a TagDictionary, ids: &[u16]) -> Vec<&'a str> {
    ids.iter().filter_map(|&id| dictionary.name(id)).collect()
}

fn line(points: &[GeoPoint]) -> LineString {
    points.iter().copied().map(Coord::from).collect()
}

fn point_of_interest(index: usize, record: &PointOfInterestRecord, names: TagNames<'_>) -> Feature {
    let props = PointOfInterestProperties {
        kind: "point_of_interest",
        layer: record.layer,
        name: record.name.as_deref(),
        house_number: record.house_number.as_deref(),
        elevation: record.elevation,
        tags: tag_names(names.points_of_interest, &record.tags),
    };
    let point = Point::from(Coord::from(record.position));
    feature(
        format!("poi/{index}"),
        geojson::Geometry::from(&point),
        properties(&props),
    )
}

fn way(index: usize, record: &WayRecord, names: TagNames<'_>) -> Feature {
    let props = WayProperties {
        kind: "way",
        layer: record.layer,
        name: record.name.as_deref(),
        reference: record.reference.as_deref(),
        label: record
            .label_position
            .map(|label| [label.longitude_degrees(), label.latitude_degrees()]),
        tags: tag_names(names.ways, &record.tags),
        tile_bitmask: record.tile_bitmask,
    };
    let geometry = if record.is_closed() {
        let polygon = Polygon::new(
            line(&record.nodes),
            record.inner_rings.iter().map(|ring| line(ring)).collect(),
        );
        geojson::Geometry::from(&polygon)
    } else {
        geojson::Geometry::from(&line(&record.nodes))
    };
    feature(format!("way/{index}"), geometry, properties(&props))
}

fn coastline<P: Projection>(
    index: usize,
    record: &CoastlineRecord,
    tile: Tile,
    projection: &P,
) -> Feature {
    let props = CoastlineProperties {
        kind: "coastline",
        coastline: record.kind,
        tile: tile.to_string(),
    };
    let points: LineString = record
        .points
        .iter()
        .map(|&pixel| Coord::from(projection.unproject(tile, pixel)))
        .collect();
    let geometry = match record.kind {
        CoastlineKind::Water | CoastlineKind::Island => {
            geojson::Geometry::from(&Polygon::new(points, vec![]))
        }
        CoastlineKind::ValidSegment | CoastlineKind::InvalidSegment => {
            geojson::Geometry::from(&points)
        }
    };
    feature(format!("coastline/{index}"), geometry, properties(&props))
}

fn sea<P: Projection>(tile: Tile, projection: &P) -> Feature {
    let bounds = projection.tile_bounds(tile);
    let outline: LineString = bounds
        .to_polygon()
        .exterior()
        .coords()
        .map(|&pixel| Coord::from(projection.unproject(tile, pixel)))
        .collect();
    let props = CoastlineProperties {
        kind: "sea",
        coastline: CoastlineKind::Water,
        tile: tile.to_string(),
    };
    feature(
        format!("sea/{tile}"),
        geojson::Geometry::from(&Polygon::new(outline, vec![])),
        properties(&props),
    )
}

/// Converts everything a query collected into GeoJSON features with tag
/// names resolved through `names`. Coastline pixels are mapped back to
/// coordinates with `projection`.
pub fn to_features<'a, P: Projection>(
    collector: &FeatureCollector,
    names: impl Into<TagNames<'a>>,
    projection: &P,
) -> Vec<Feature> {
    let names = names.into();
    let mut features = Vec::with_capacity(
        collector.points_of_interest.len() + collector.ways.len() + collector.coastlines.len() + 1,
    );

    features.extend(
        collector
            .points_of_interest
            .iter()
            .enumerate()
            .map(|(i, record)| point_of_interest(i, record, names)),
    );
    features.extend(
        collector
            .ways
            .iter()
            .enumerate()
            .map(|(i, record)| way(i, record, names)),
    );

    if let Some(tile) = collector.coastline_tile {
        features.extend(
            collector
                .coastlines
                .iter()
                .enumerate()
                .map(|(i, record)| coastline(i, record, tile, projection)),
        );
        if collector.water_tile {
            features.push(sea(tile, projection));
        }
    } else if !collector.coastlines.is_empty() {
        warn!(
            count = collector.coastlines.len(),
            "dropping coastline without a coastline tile"
        );
    }

    features
}

#[derive(Debug)]
pub struct WriteGeojson<W, T> {
    writer: W,
    _s: std::marker::PhantomData<T>,
}

impl<W, T> WriteGeojson<W, T> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _s: std::marker::PhantomData,
        }
    }
}

impl<W, T> crate::pipe::Pipe for WriteGeojson<W, T>
where
    W: Write,
    T: IntoIterator<Item = Feature>,
{
    type Input = Vec<T>;

    type Output = ();

    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        let features = input.into_iter().flatten().collect::<Vec<_>>();

        info!("Writing {} features to geojson", features.len());
        geojson::ser::to_feature_collection_writer(&mut self.writer, &features)?;
        self.writer.flush()?;
        Ok(Some(()))
    }
}
