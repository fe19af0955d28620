//! Decoding of a single block: the points of interest and ways anchored to
//! one base zoom tile.

use bitflags::bitflags;

use crate::{
    buffer::{BufferError, ReadBuffer},
    header::SubFile,
    sink::{MapSink, PointOfInterest, Way},
    tags::TagDictionary,
    types::{GeoPoint, TagSet},
};

pub const SIGNATURE_LENGTH: usize = 32;
pub const BLOCK_SIGNATURE: &str = "###TileStart";
pub const POINT_OF_INTEREST_SIGNATURE: &str = "***POIStart";
pub const WAY_SIGNATURE: &str = "---WayStart";

pub const MAX_WAY_NODES: u32 = 8192;
pub const MAX_INNER_RINGS: u32 = 1024;

const LAYER_SHIFT: u8 = 4;
const TAG_COUNT_MASK: u8 = 0x0F;
const RELEVANT_TAGS_SHIFT: u8 = 5;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PoiFeatures: u8 {
        const NAME = 0x80;
        const ELEVATION = 0x40;
        const HOUSE_NUMBER = 0x20;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WayFeatures: u8 {
        const NAME = 0x80;
        const REF = 0x40;
        const LABEL_POSITION = 0x20;
        const MULTIPOLYGON = 0x10;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("invalid {kind} signature {found:?}")]
    Signature { kind: &'static str, found: String },
    #[error("query zoom {zoom} outside the entries table {min}..={max}")]
    QueryZoom { zoom: u8, min: u8, max: u8 },
    #[error("invalid first way offset {offset} in a {len} byte block")]
    FirstWayOffset { offset: usize, len: usize },
    #[error("points of interest end at {position}, past the first way at {first_way}")]
    PointsOverrun { position: usize, first_way: usize },
    #[error("undeclared point of interest tag id {0}")]
    PoiTagId(u32),
    #[error("undeclared way tag id {0}")]
    WayTagId(u32),
    #[error("way data size {0} too small")]
    WayDataSize(u32),
    #[error("way node count {0} outside 1..={}", MAX_WAY_NODES)]
    WayNodeCount(u32),
    #[error("inner ring count {0} outside 1..={}", MAX_INNER_RINGS)]
    InnerRingCount(u32),
}

/// Buffers reused across records and blocks.
#[derive(Debug, Default)]
pub struct Scratch {
    tags: TagSet,
    nodes: Vec<GeoPoint>,
    inner_rings: Vec<Vec<GeoPoint>>,
}

/// Features seen while decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCounts {
    pub points_of_interest: u64,
    pub ways: u64,
    pub ways_filtered: u64,
}

/// Everything the decoder needs to know about the block besides its bytes.
#[derive(Debug, Clone, Copy)]
pub struct BlockDecoder<'a> {
    pub sub_file: &'a SubFile,
    pub point_of_interest_tags: &'a TagDictionary,
    pub way_tags: &'a TagDictionary,
    pub query_zoom: u8,
    pub bitmask: Option<u16>,
    /// North-west corner of the block's tile.
    pub origin: GeoPoint,
    pub debug: bool,
    pub read_way_names: bool,
}

impl<'a> BlockDecoder<'a> {
    pub fn decode<S: MapSink + ?Sized>(
        &self,
        data: &[u8],
        scratch: &mut Scratch,
        sink: &mut S,
        counts: &mut BlockCounts,
    ) -> Result<(), BlockError> {
        let mut buffer = ReadBuffer::new(data);

        if self.debug {
            check_signature(&mut buffer, "block", BLOCK_SIGNATURE)?;
        }

        let (points, ways) = self.read_entries_table(&mut buffer)?;

        let offset = buffer.read_vbe_unsigned()? as usize;
        let first_way = buffer.position() + offset;
        if first_way > buffer.len() {
            return Err(BlockError::FirstWayOffset {
                offset: first_way,
                len: buffer.len(),
            });
        }

        for _ in 0..points {
            self.read_point_of_interest(&mut buffer, scratch, sink)?;
            counts.points_of_interest += 1;
        }

        if buffer.position() > first_way {
            return Err(BlockError::PointsOverrun {
                position: buffer.position(),
                first_way,
            });
        }
        buffer.set_position(first_way)?;

        for _ in 0..ways {
            if self.read_way(&mut buffer, scratch, sink)? {
                counts.ways += 1;
            } else {
                counts.ways_filtered += 1;
            }
        }

        Ok(())
    }

    /// Points of interest and ways visible at the query zoom.
    fn read_entries_table(&self, buffer: &mut ReadBuffer) -> Result<(u32, u32), BlockError> {
        let (min, max) = (self.sub_file.zoom_min, self.sub_file.zoom_max);
        if !(min..=max).contains(&self.query_zoom) {
            return Err(BlockError::QueryZoom {
                zoom: self.query_zoom,
                min,
                max,
            });
        }

        let end = buffer.position() + self.sub_file.entries_table_size;
        let (mut points, mut ways) = (0u32, 0u32);
        for _ in min..=self.query_zoom {
            points += u32::from(buffer.read_u16()?);
            ways += u32::from(buffer.read_u16()?);
        }
        buffer.set_position(end)?;
        Ok((points, ways))
    }

    fn read_tags(
        buffer: &mut ReadBuffer,
        count: u8,
        dictionary: &TagDictionary,
        tags: &mut TagSet,
        error: fn(u32) -> BlockError,
    ) -> Result<(), BlockError> {
        tags.clear();
        for _ in 0..count {
            let id = buffer.read_vbe_unsigned()?;
            match u16::try_from(id) {
                Ok(id) if dictionary.contains_id(id) => tags.insert(id),
                _ => return Err(error(id)),
            }
        }
        Ok(())
    }

    fn read_point_of_interest<S: MapSink + ?Sized>(
        &self,
        buffer: &mut ReadBuffer,
        scratch: &mut Scratch,
        sink: &mut S,
    ) -> Result<(), BlockError> {
        if self.debug {
            check_signature(buffer, "point of interest", POINT_OF_INTEREST_SIGNATURE)?;
        }

        let latitude = buffer.read_vbe_signed()?;
        let longitude = buffer.read_vbe_signed()?;
        let position = self.origin.offset(latitude, longitude);

        let special = buffer.read_u8()?;
        Self::read_tags(
            buffer,
            special & TAG_COUNT_MASK,
            self.point_of_interest_tags,
            &mut scratch.tags,
            BlockError::PoiTagId,
        )?;

        let features = PoiFeatures::from_bits_truncate(buffer.read_u8()?);
        let name = features
            .contains(PoiFeatures::NAME)
            .then(|| buffer.read_str())
            .transpose()?;
        let elevation = features
            .contains(PoiFeatures::ELEVATION)
            .then(|| buffer.read_vbe_signed())
            .transpose()?;
        let house_number = features
            .contains(PoiFeatures::HOUSE_NUMBER)
            .then(|| buffer.read_str())
            .transpose()?;

        sink.render_point_of_interest(&PointOfInterest {
            layer: special >> LAYER_SHIFT,
            position,
            name,
            house_number,
            elevation,
            tags: &scratch.tags,
        });
        Ok(())
    }

    /// Returns false when the way was skipped by the tile bitmask.
    fn read_way<S: MapSink + ?Sized>(
        &self,
        buffer: &mut ReadBuffer,
        scratch: &mut Scratch,
        sink: &mut S,
    ) -> Result<bool, BlockError> {
        if self.debug {
            check_signature(buffer, "way", WAY_SIGNATURE)?;
        }

        let size = buffer.read_vbe_unsigned()?;
        let tile_bitmask = buffer.read_u16()?;
        if let Some(bitmask) = self.bitmask {
            if tile_bitmask & bitmask == 0 {
                let rest = size.checked_sub(2).ok_or(BlockError::WayDataSize(size))?;
                buffer.skip(rest as usize)?;
                return Ok(false);
            }
        }

        let special = buffer.read_u8()?;
        let relevant_tags = buffer.read_u8()? >> RELEVANT_TAGS_SHIFT;
        Self::read_tags(
            buffer,
            special & TAG_COUNT_MASK,
            self.way_tags,
            &mut scratch.tags,
            BlockError::WayTagId,
        )?;

        let count = buffer.read_vbe_unsigned()?;
        if !(1..=MAX_WAY_NODES).contains(&count) {
            return Err(BlockError::WayNodeCount(count));
        }
        self.read_node_chain(buffer, count, &mut scratch.nodes)?;

        let features = WayFeatures::from_bits_truncate(buffer.read_u8()?);
        let name = features
            .contains(WayFeatures::NAME)
            .then(|| buffer.read_str())
            .transpose()?
            .filter(|_| self.read_way_names);
        let reference = features
            .contains(WayFeatures::REF)
            .then(|| buffer.read_str())
            .transpose()?
            .filter(|_| self.read_way_names);
        let label_position = if features.contains(WayFeatures::LABEL_POSITION) {
            let latitude = buffer.read_vbe_signed()?;
            let longitude = buffer.read_vbe_signed()?;
            Some(scratch.nodes[0].offset(latitude, longitude))
        } else {
            None
        };

        let mut inner = 0;
        if features.contains(WayFeatures::MULTIPOLYGON) {
            let rings = buffer.read_vbe_unsigned()?;
            if !(1..=MAX_INNER_RINGS).contains(&rings) {
                return Err(BlockError::InnerRingCount(rings));
            }
            inner = rings as usize;
            if scratch.inner_rings.len() < inner {
                scratch.inner_rings.resize_with(inner, Vec::new);
            }
            for ring in &mut scratch.inner_rings[..inner] {
                let count = buffer.read_vbe_unsigned()?;
                if !(1..=MAX_WAY_NODES).contains(&count) {
                    return Err(BlockError::WayNodeCount(count));
                }
                self.read_node_chain(buffer, count, ring)?;
            }
        }

        sink.render_way(&Way {
            layer: special >> LAYER_SHIFT,
            relevant_tags,
            name,
            reference,
            label_position,
            tags: &scratch.tags,
            tile_bitmask,
            nodes: &scratch.nodes,
            inner_rings: &scratch.inner_rings[..inner],
        });
        Ok(true)
    }

    /// First node relative to the block origin, every other one relative to
    /// its predecessor.
    fn read_node_chain(
        &self,
        buffer: &mut ReadBuffer,
        count: u32,
        nodes: &mut Vec<GeoPoint>,
    ) -> Result<(), BlockError> {
        nodes.clear();
        let mut current = self.origin;
        for _ in 0..count {
            let latitude = buffer.read_vbe_signed()?;
            let longitude = buffer.read_vbe_signed()?;
            current = current.offset(latitude, longitude);
            nodes.push(current);
        }
        Ok(())
    }
}

fn check_signature(
    buffer: &mut ReadBuffer,
    kind: &'static str,
    expected: &str,
) -> Result<(), BlockError> {
    let bytes = buffer.take(SIGNATURE_LENGTH)?;
    if !bytes.starts_with(expected.as_bytes()) {
        return Err(BlockError::Signature {
            kind,
            found: String::from_utf8_lossy(bytes).trim_end().into(),
        });
    }
    Ok(())
}
