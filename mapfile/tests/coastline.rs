mod common;

use common::{bbox_for_tiles, MapWriter, SubFileSpec, WaySpec, COASTLINE};
use geo::{coord, Coord, Rect};
use mapfile::{
    collect::CoastlineKind, ser, CoastlineFilter, FeatureCollector, GeoPoint, MapFile, Projection,
    QueryStatus, Tile, TileProjection,
};

/// Micro-degrees east and south of the tile's north-west corner.
struct MicroDegrees;

impl Projection for MicroDegrees {
    fn project(&self, tile: Tile, point: GeoPoint) -> Coord {
        let origin = tile.origin();
        coord! {
            x: f64::from(point.longitude - origin.longitude),
            y: f64::from(origin.latitude - point.latitude),
        }
    }

    fn unproject(&self, tile: Tile, point: Coord) -> GeoPoint {
        let origin = tile.origin();
        GeoPoint::new(origin.latitude - point.y as i32, origin.longitude + point.x as i32)
    }

    fn tile_bounds(&self, _tile: Tile) -> Rect {
        Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1000.0, y: 1000.0 })
    }
}

fn base_tile() -> Tile {
    Tile::new(548, 335, 10).unwrap()
}

/// One block holding a road and a coastline given in projected coordinates.
fn map_with_coastline(coastline: impl Fn(GeoPoint) -> Vec<GeoPoint>) -> MapFile<std::io::Cursor<Vec<u8>>> {
    let mut writer = MapWriter::new(bbox_for_tiles(10, (548, 548), (335, 335)));
    let coastline_tag = writer.way_tag(COASTLINE);
    let mut sub_file = SubFileSpec::new(10, 10, 10);

    let mut block = sub_file.block(base_tile(), false);
    let origin = block.origin();
    let road = [origin.offset(-10, 10), origin.offset(-20, 20)];
    let shore = coastline(origin);
    block
        .way(
            10,
            WaySpec {
                tags: &[0],
                bitmask: 0xffff,
                nodes: &road,
                ..Default::default()
            },
        )
        .way(
            10,
            WaySpec {
                tags: &[coastline_tag],
                bitmask: 0xffff,
                nodes: &shore,
                ..Default::default()
            },
        );
    sub_file.insert(base_tile(), block.build(), false);
    writer.sub_files.push(sub_file);
    writer.open()
}

#[test]
fn closed_coastline_ring_is_one_water_polygon() {
    let ring = [(0, 0), (4, 0), (4, 4), (0, 4), (0, 0)];
    let mut map = map_with_coastline(|origin| {
        ring.iter()
            .map(|&(x, y)| origin.offset(-y, x))
            .collect()
    });

    let mut filter = CoastlineFilter::with_projection(FeatureCollector::new(), map.header(), MicroDegrees);
    let report = map.query(base_tile(), true, &mut filter).unwrap();
    assert_eq!(report.status, QueryStatus::Complete);
    assert_eq!(report.ways, 2);

    let collector = filter.finish();
    assert_eq!(collector.ways.len(), 1, "only the road is forwarded");
    assert_eq!(collector.ways[0].tags, vec![0]);

    let water: Vec<_> = collector.coastlines_of(CoastlineKind::Water).collect();
    assert_eq!(water.len(), 1);
    let expected: Vec<Coord> = ring
        .iter()
        .map(|&(x, y)| coord! { x: f64::from(x), y: f64::from(y) })
        .collect();
    assert_eq!(water[0].points, expected);
    assert_eq!(collector.coastlines.len(), 1);
    assert!(!collector.water_tile);
}

#[test]
fn counter_clockwise_ring_is_an_island_in_the_sea() {
    let ring = [(0, 0), (0, 4), (4, 4), (4, 0), (0, 0)];
    let mut map = map_with_coastline(|origin| {
        ring.iter()
            .map(|&(x, y)| origin.offset(-y, x))
            .collect()
    });

    let mut filter = CoastlineFilter::with_projection(FeatureCollector::new(), map.header(), MicroDegrees);
    map.query(base_tile(), true, &mut filter).unwrap();
    let collector = filter.finish();

    assert_eq!(collector.coastlines_of(CoastlineKind::Island).count(), 1);
    assert_eq!(collector.coastlines_of(CoastlineKind::Water).count(), 0);
    assert!(collector.water_tile);
}

#[test]
fn coastline_crossing_the_tile() {
    // West to east through the middle of the tile, in projected units.
    let mut map = map_with_coastline(|origin| {
        vec![origin.offset(-500, -200), origin.offset(-500, 1200)]
    });

    let mut filter = CoastlineFilter::with_projection(FeatureCollector::new(), map.header(), MicroDegrees);
    map.query(base_tile(), true, &mut filter).unwrap();
    let collector = filter.finish();

    assert_eq!(collector.coastlines_of(CoastlineKind::InvalidSegment).count(), 0);
    let water: Vec<_> = collector.coastlines_of(CoastlineKind::Water).collect();
    assert_eq!(water.len(), 1);
    let ring = &water[0].points;
    assert_eq!(ring.first(), ring.last());
    for point in ring {
        assert!((0.0..=1000.0).contains(&point.x));
        assert!((0.0..=1000.0).contains(&point.y));
    }
}

#[test]
fn coastline_ending_inside_the_tile_is_invalid() {
    let mut map = map_with_coastline(|origin| {
        vec![origin.offset(-500, -200), origin.offset(-500, 500)]
    });

    let mut filter = CoastlineFilter::with_projection(FeatureCollector::new(), map.header(), MicroDegrees);
    map.query(base_tile(), true, &mut filter).unwrap();
    let collector = filter.finish();

    assert_eq!(collector.coastlines_of(CoastlineKind::InvalidSegment).count(), 1);
    assert_eq!(collector.coastlines_of(CoastlineKind::Water).count(), 0);
}

#[test]
fn coastline_features_in_pixels_round_trip_to_geojson() {
    let mut map = map_with_coastline(|origin| {
        vec![origin.offset(-50_000, -10_000), origin.offset(-50_000, 400_000)]
    });
    let projection = TileProjection {
        tile_size: map.header().tile_size,
    };

    let mut filter = CoastlineFilter::new(FeatureCollector::new(), map.header());
    map.query(base_tile(), true, &mut filter).unwrap();
    let collector = filter.finish();
    assert_eq!(collector.coastlines_of(CoastlineKind::Water).count(), 1);

    let features = ser::to_features(&collector, map.header(), &projection);
    assert_eq!(features.len(), 2);
    let coastline = &features[1];
    assert_eq!(
        coastline.property("coastline"),
        Some(&serde_json::json!("water"))
    );
    match &coastline.geometry.as_ref().unwrap().value {
        geojson::Value::Polygon(rings) => {
            for position in &rings[0] {
                assert!(position[0] >= 12.65 && position[0] <= 13.01);
                assert!(position[1] >= 52.48 && position[1] <= 52.70);
            }
        }
        other => panic!("unexpected geometry {other:?}"),
    }
}
