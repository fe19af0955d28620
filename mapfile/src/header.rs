use std::io::Read;

use bitflags::bitflags;

use crate::{
    buffer::{BufferError, ReadBuffer},
    mercator::{self, MAX_ZOOM},
    tags::{TagDictionary, TagError},
    tile::Tile,
    types::{BoundingBox, GeoPoint},
};

pub const MAGIC: &[u8; 20] = b"mapsforge binary OSM";
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 2..=3;
pub const PROJECTION: &str = "Mercator";

pub const HEADER_SIZE_MIN: u32 = 50;
pub const HEADER_SIZE_MAX: u32 = 1_000_000;

/// Bytes before the remaining header: magic and the size field itself.
const PREAMBLE_SIZE: u64 = MAGIC.len() as u64 + 4;

/// Size of the `+++IndexStart` signature in debug files.
pub const SIGNATURE_LENGTH_INDEX: u64 = 16;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MetaFlags: u8 {
        const DEBUG = 0x80;
        const START_POSITION = 0x40;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed header: {0}")]
    Buffer(#[from] BufferError),
    #[error("not a map file")]
    InvalidMagic,
    #[error("invalid remaining header size {0}")]
    HeaderSize(u32),
    #[error("header of {header_size} bytes does not fit in a {file_size} byte file")]
    HeaderTruncated { header_size: u32, file_size: u64 },
    #[error("unsupported file version {0}")]
    UnsupportedVersion(u32),
    #[error("unsupported projection {0:?}")]
    Projection(String),
    #[error("invalid tile size {0}")]
    TileSize(u16),
    #[error("invalid bounding box {0:?}")]
    BoundingBox(BoundingBox),
    #[error("invalid start position {0:?}")]
    StartPosition(GeoPoint),
    #[error("map file has no sub-files")]
    NoSubFiles,
    #[error("sub-file {sub_file}: invalid zoom range {min}..={max}")]
    ZoomRange { sub_file: usize, min: u8, max: u8 },
    #[error("sub-file {sub_file}: invalid base zoom level {base}")]
    BaseZoom { sub_file: usize, base: u8 },
    #[error("sub-file {sub_file}: {start}+{size} exceeds file size {file_size}")]
    SubFileBounds {
        sub_file: usize,
        start: u64,
        size: u64,
        file_size: u64,
    },
    #[error(transparent)]
    Tags(#[from] TagError),
}

/// One zoom interval of the map file with its own index and block grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFile {
    pub id: usize,
    pub base_zoom: u8,
    pub zoom_min: u8,
    pub zoom_max: u8,
    pub start_address: u64,
    pub size: u64,
    pub index_start: u64,
    pub index_end: u64,
    pub boundary_left: u64,
    pub boundary_top: u64,
    pub boundary_right: u64,
    pub boundary_bottom: u64,
    pub blocks_width: u64,
    pub blocks_height: u64,
    pub blocks: u64,
    /// Bytes of the per-zoom (points, ways) count table at the start of a block.
    pub entries_table_size: usize,
}

impl SubFile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        base_zoom: u8,
        zoom_min: u8,
        zoom_max: u8,
        start_address: u64,
        size: u64,
        bounding_box: &BoundingBox,
        debug: bool,
    ) -> Self {
        let boundary_left =
            mercator::longitude_to_tile_x(f64::from(bounding_box.min_longitude) / 1e6, base_zoom);
        let boundary_right =
            mercator::longitude_to_tile_x(f64::from(bounding_box.max_longitude) / 1e6, base_zoom);
        let boundary_top =
            mercator::latitude_to_tile_y(f64::from(bounding_box.max_latitude) / 1e6, base_zoom);
        let boundary_bottom =
            mercator::latitude_to_tile_y(f64::from(bounding_box.min_latitude) / 1e6, base_zoom);

        let blocks_width = boundary_right - boundary_left + 1;
        let blocks_height = boundary_bottom - boundary_top + 1;
        let blocks = blocks_width * blocks_height;

        let index_start = start_address + if debug { SIGNATURE_LENGTH_INDEX } else { 0 };

        Self {
            id,
            base_zoom,
            zoom_min,
            zoom_max,
            start_address,
            size,
            index_start,
            index_end: index_start + blocks * crate::index_cache::INDEX_ENTRY_SIZE as u64,
            boundary_left,
            boundary_top,
            boundary_right,
            boundary_bottom,
            blocks_width,
            blocks_height,
            blocks,
            entries_table_size: 4 * (usize::from(zoom_max.saturating_sub(zoom_min)) + 1),
        }
    }

    /// Base zoom tile stored in `block`.
    pub fn block_tile(&self, block: u64) -> Tile {
        Tile {
            zoom: self.base_zoom,
            x: self.boundary_left + block % self.blocks_width,
            y: self.boundary_top + block / self.blocks_width,
        }
    }

    pub fn block_number(&self, column: u64, row: u64) -> u64 {
        row * self.blocks_width + column
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub version: u32,
    pub flags: MetaFlags,
    pub projection: String,
    pub tile_size: u16,
    pub bounding_box: BoundingBox,
    pub start_position: Option<GeoPoint>,
    /// Milliseconds since the unix epoch.
    pub date: i64,
    pub point_of_interest_tags: TagDictionary,
    pub way_tags: TagDictionary,
    pub comment: Option<String>,
    pub sub_files: Vec<SubFile>,
    pub zoom_min: u8,
    pub zoom_max: u8,
    pub file_size: u64,
    zoom_table: Vec<Option<usize>>,
}

impl Header {
    /// Reads and validates the header at the start of `reader`.
    pub fn read<R: Read>(reader: &mut R, file_size: u64) -> Result<Self, OpenError> {
        let mut preamble = [0u8; PREAMBLE_SIZE as usize];
        reader.read_exact(&mut preamble)?;
        if &preamble[..MAGIC.len()] != MAGIC {
            return Err(OpenError::InvalidMagic);
        }

        let mut size = [0u8; 4];
        size.copy_from_slice(&preamble[MAGIC.len()..]);
        let header_size = u32::from_be_bytes(size);
        if !(HEADER_SIZE_MIN..=HEADER_SIZE_MAX).contains(&header_size) {
            return Err(OpenError::HeaderSize(header_size));
        }
        if PREAMBLE_SIZE + u64::from(header_size) > file_size {
            return Err(OpenError::HeaderTruncated {
                header_size,
                file_size,
            });
        }

        let mut data = vec![0u8; header_size as usize];
        reader.read_exact(&mut data)?;
        Self::parse(&mut ReadBuffer::new(&data), file_size)
    }

    fn parse(buffer: &mut ReadBuffer, file_size: u64) -> Result<Self, OpenError> {
        let version = buffer.read_u32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(OpenError::UnsupportedVersion(version));
        }

        let flags = MetaFlags::from_bits_truncate(buffer.read_u8()?);
        let sub_file_count = buffer.read_u8()?;

        let projection = buffer.read_str()?;
        if projection != PROJECTION {
            return Err(OpenError::Projection(projection.into()));
        }

        let tile_size = buffer.read_u16()?;
        if tile_size < 1 {
            return Err(OpenError::TileSize(tile_size));
        }

        let max_latitude = buffer.read_i32()?;
        let min_longitude = buffer.read_i32()?;
        let min_latitude = buffer.read_i32()?;
        let max_longitude = buffer.read_i32()?;
        let bounding_box = BoundingBox {
            min_latitude,
            min_longitude,
            max_latitude,
            max_longitude,
        };
        if !bounding_box.is_valid() {
            return Err(OpenError::BoundingBox(bounding_box));
        }

        let start_position = if flags.contains(MetaFlags::START_POSITION) {
            let position = GeoPoint::new(buffer.read_i32()?, buffer.read_i32()?);
            if !position.is_valid() {
                return Err(OpenError::StartPosition(position));
            }
            Some(position)
        } else {
            None
        };

        let date = buffer.read_i64()?;
        let point_of_interest_tags = read_tags(buffer)?;
        let way_tags = read_tags(buffer)?;

        let comment = Some(buffer.read_str()?)
            .filter(|comment| !comment.is_empty())
            .map(String::from);

        if sub_file_count == 0 {
            return Err(OpenError::NoSubFiles);
        }

        let debug = flags.contains(MetaFlags::DEBUG);
        let mut sub_files = Vec::with_capacity(usize::from(sub_file_count));
        for id in 0..usize::from(sub_file_count) {
            let base_zoom = buffer.read_u8()?;
            let zoom_min = buffer.read_u8()?;
            let zoom_max = buffer.read_u8()?;
            if zoom_min > zoom_max || zoom_max > MAX_ZOOM {
                return Err(OpenError::ZoomRange {
                    sub_file: id,
                    min: zoom_min,
                    max: zoom_max,
                });
            }
            if base_zoom > MAX_ZOOM {
                return Err(OpenError::BaseZoom {
                    sub_file: id,
                    base: base_zoom,
                });
            }

            let start = buffer.read_u40()?;
            let size = buffer.read_u40()?;
            if start >= file_size || start.saturating_add(size) > file_size {
                return Err(OpenError::SubFileBounds {
                    sub_file: id,
                    start,
                    size,
                    file_size,
                });
            }

            sub_files.push(SubFile::new(
                id,
                base_zoom,
                zoom_min,
                zoom_max,
                start,
                size,
                &bounding_box,
                debug,
            ));
        }

        let (zoom_min, zoom_max, zoom_table) = zoom_table(&sub_files);

        debug!(
            version,
            ?flags,
            tile_size,
            sub_files = sub_files.len(),
            zoom_min,
            zoom_max,
            "parsed map header"
        );

        Ok(Self {
            version,
            flags,
            projection: projection.into(),
            tile_size,
            bounding_box,
            start_position,
            date,
            point_of_interest_tags,
            way_tags,
            comment,
            sub_files,
            zoom_min,
            zoom_max,
            file_size,
            zoom_table,
        })
    }

    pub fn is_debug(&self) -> bool {
        self.flags.contains(MetaFlags::DEBUG)
    }

    /// `zoom` clamped to the zoom levels covered by the file.
    pub fn query_zoom(&self, zoom: u8) -> u8 {
        zoom.clamp(self.zoom_min, self.zoom_max)
    }

    /// Sub-file answering queries at `zoom` after clamping.
    pub fn sub_file_for_zoom(&self, zoom: u8) -> Option<&SubFile> {
        let index = usize::from(self.query_zoom(zoom) - self.zoom_min);
        self.zoom_table
            .get(index)
            .copied()
            .flatten()
            .and_then(|id| self.sub_files.get(id))
    }
}

fn read_tags(buffer: &mut ReadBuffer) -> Result<TagDictionary, OpenError> {
    let count = buffer.read_u16()?;
    let mut tags = TagDictionary::default();
    for _ in 0..count {
        let name = buffer.read_str()?;
        let id = buffer.read_u16()?;
        tags.insert(name, id)?;
    }
    Ok(tags)
}

/// Global zoom range and, for every zoom level in it, the sub-file serving it.
/// Later sub-files take precedence on overlapping ranges.
fn zoom_table(sub_files: &[SubFile]) -> (u8, u8, Vec<Option<usize>>) {
    let zoom_min = sub_files.iter().map(|s| s.zoom_min).min().unwrap_or(0);
    let zoom_max = sub_files.iter().map(|s| s.zoom_max).max().unwrap_or(0);

    let mut table = vec![None; usize::from(zoom_max - zoom_min) + 1];
    for sub_file in sub_files {
        for zoom in sub_file.zoom_min..=sub_file.zoom_max {
            table[usize::from(zoom - zoom_min)] = Some(sub_file.id);
        }
    }
    (zoom_min, zoom_max, table)
}
