mod common;

use common::{bbox_for_tiles, temp_file, MapWriter, SubFileSpec};
use mapfile::{GeoPoint, MapFile, OpenError, Tile};

fn writer() -> MapWriter {
    let mut writer = MapWriter::new(bbox_for_tiles(10, (548, 549), (335, 336)));
    writer.sub_files.push(SubFileSpec::new(10, 8, 12));
    writer
}

fn open(bytes: &[u8]) -> Result<MapFile, OpenError> {
    let file = temp_file(bytes);
    MapFile::open(file.path())
}

#[test]
fn header_fields() {
    let mut writer = writer();
    writer.start_position = Some(GeoPoint::new(52_520_000, 13_405_000));
    writer.comment = "synthetic".into();
    let map = open(&writer.bytes()).unwrap();

    let header = map.header();
    assert_eq!(header.version, 3);
    assert_eq!(header.tile_size, 256);
    assert_eq!(header.projection, "Mercator");
    assert_eq!(header.bounding_box, writer.bounding_box);
    assert_eq!(header.start_position, writer.start_position);
    assert_eq!(header.date, 1_700_000_000_000);
    assert_eq!(header.comment.as_deref(), Some("synthetic"));
    assert_eq!(header.point_of_interest_tags.id("natural=peak"), Some(1));
    assert_eq!(header.way_tags.name(2), Some("natural=coastline"));
    assert!(!header.is_debug());

    assert_eq!(header.sub_files.len(), 1);
    let sub_file = &header.sub_files[0];
    assert_eq!((sub_file.boundary_left, sub_file.boundary_right), (548, 549));
    assert_eq!((sub_file.boundary_top, sub_file.boundary_bottom), (335, 336));
    assert_eq!(sub_file.blocks, 4);
    assert_eq!(sub_file.block_tile(3), Tile::new(549, 336, 10).unwrap());
    assert_eq!((header.zoom_min, header.zoom_max), (8, 12));
    assert_eq!(header.query_zoom(3), 8);
    assert_eq!(header.query_zoom(17), 12);

    map.close();
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let error = MapFile::open(dir.path().join("missing.map")).unwrap_err();
    assert!(matches!(error, OpenError::Io(_)));
}

#[test]
fn invalid_magic() {
    let mut bytes = writer().bytes();
    bytes[0] = b'M';
    assert!(matches!(open(&bytes), Err(OpenError::InvalidMagic)));
}

#[test]
fn invalid_header_size() {
    let mut bytes = writer().bytes();
    bytes[20..24].copy_from_slice(&10u32.to_be_bytes());
    assert!(matches!(open(&bytes), Err(OpenError::HeaderSize(10))));

    bytes[20..24].copy_from_slice(&2_000_000u32.to_be_bytes());
    assert!(matches!(open(&bytes), Err(OpenError::HeaderSize(2_000_000))));
}

#[test]
fn header_larger_than_file() {
    let bytes = writer().bytes();
    assert!(matches!(
        open(&bytes[..40]),
        Err(OpenError::HeaderTruncated { .. })
    ));
}

#[test]
fn unsupported_version() {
    let mut writer = writer();
    writer.version = 5;
    assert!(matches!(
        open(&writer.bytes()),
        Err(OpenError::UnsupportedVersion(5))
    ));
}

#[test]
fn unsupported_projection() {
    let mut writer = writer();
    writer.projection = "Equirectangular".into();
    match open(&writer.bytes()) {
        Err(OpenError::Projection(name)) => assert_eq!(name, "Equirectangular"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn zero_tile_size() {
    let mut writer = writer();
    writer.tile_size = 0;
    assert!(matches!(open(&writer.bytes()), Err(OpenError::TileSize(0))));
}

#[test]
fn inverted_bounding_box() {
    let mut writer = writer();
    writer.sub_files.clear();
    std::mem::swap(
        &mut writer.bounding_box.min_latitude,
        &mut writer.bounding_box.max_latitude,
    );
    assert!(matches!(
        open(&writer.bytes()),
        Err(OpenError::BoundingBox(_))
    ));
}

#[test]
fn start_position_out_of_range() {
    let mut writer = writer();
    writer.start_position = Some(GeoPoint::new(91_000_000, 0));
    assert!(matches!(
        open(&writer.bytes()),
        Err(OpenError::StartPosition(_))
    ));
}

#[test]
fn no_sub_files() {
    let mut writer = writer();
    writer.sub_files.clear();
    assert!(matches!(open(&writer.bytes()), Err(OpenError::NoSubFiles)));
}

#[test]
fn invalid_zoom_range() {
    let mut writer = writer();
    writer.sub_files[0].zoom_min = 13;
    assert!(matches!(
        open(&writer.bytes()),
        Err(OpenError::ZoomRange { sub_file: 0, min: 13, max: 12 })
    ));
}

#[test]
fn sub_file_past_the_end() {
    let bytes = writer().bytes();
    let header_end = 24 + u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]) as usize;
    assert!(matches!(
        open(&bytes[..header_end + 3]),
        Err(OpenError::SubFileBounds { sub_file: 0, .. })
    ));
}

#[test]
fn duplicate_tag() {
    let mut writer = writer();
    writer.way_tags.push("highway=primary".into());
    assert!(matches!(open(&writer.bytes()), Err(OpenError::Tags(_))));
}
