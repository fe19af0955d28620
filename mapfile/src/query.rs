use crate::{
    header::{Header, SubFile},
    tile::Tile,
};

/// Way bitmasks of the four tiles one zoom level below a block, indexed by
/// `(y & 1) << 1 | (x & 1)`.
const QUADRANTS: [u16; 4] = [0xCC00, 0x3300, 0x00CC, 0x0033];

/// Way bitmasks of the sixteen tiles two zoom levels below a block. The outer
/// index is the quadrant of the parent tile, the inner one the quadrant of the
/// tile within its parent, both as in [`QUADRANTS`].
const SUBTILES: [[u16; 4]; 4] = [
    [0x8000, 0x4000, 0x0800, 0x0400],
    [0x2000, 0x1000, 0x0200, 0x0100],
    [0x0080, 0x0040, 0x0008, 0x0004],
    [0x0020, 0x0010, 0x0002, 0x0001],
];

fn quadrant(x: u64, y: u64) -> usize {
    ((y & 1) << 1 | (x & 1)) as usize
}

/// Bitmask selecting the ways of a `base_zoom` block that touch `tile`.
///
/// `tile` must be deeper than `base_zoom`. Below two levels the mask of the
/// tile's ancestor two levels under the block is used.
pub fn quadrant_bitmask(tile: &Tile, base_zoom: u8) -> u16 {
    match tile.zoom.saturating_sub(base_zoom) {
        0 => u16::MAX,
        1 => QUADRANTS[quadrant(tile.x, tile.y)],
        difference => {
            let shift = difference - 2;
            let (x, y) = (tile.x >> shift, tile.y >> shift);
            SUBTILES[quadrant(x >> 1, y >> 1)][quadrant(x, y)]
        }
    }
}

/// Blocks to read and the filter to apply for one tile query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub tile: Tile,
    /// Requested zoom clamped to the zoom levels of the file.
    pub query_zoom: u8,
    pub sub_file: usize,
    /// Inclusive block column / row range relative to the sub-file boundary.
    pub from_block_x: u64,
    pub to_block_x: u64,
    pub from_block_y: u64,
    pub to_block_y: u64,
    /// Present when ways must be filtered by their tile bitmask.
    pub bitmask: Option<u16>,
    /// Tile whose pixel space coastline polygons are built in.
    pub coastline_tile: Tile,
    empty: bool,
}

impl QueryPlan {
    /// `None` when no sub-file serves the tile's zoom level.
    pub fn new(header: &Header, tile: Tile) -> Option<Self> {
        let query_zoom = header.query_zoom(tile.zoom);
        let sub_file = header.sub_file_for_zoom(tile.zoom)?;
        Some(Self::for_sub_file(sub_file, tile, query_zoom))
    }

    pub fn for_sub_file(sub_file: &SubFile, tile: Tile, query_zoom: u8) -> Self {
        let base_zoom = sub_file.base_zoom;

        let (xs, ys, bitmask, coastline_tile) = if tile.zoom < base_zoom {
            let (xs, ys) = tile.descendants(base_zoom);
            (xs, ys, None, tile)
        } else if tile.zoom > base_zoom {
            let parent = tile.ancestor(base_zoom);
            (
                parent.x..=parent.x,
                parent.y..=parent.y,
                Some(quadrant_bitmask(&tile, base_zoom)),
                parent,
            )
        } else {
            (tile.x..=tile.x, tile.y..=tile.y, None, tile)
        };

        let from_x = (*xs.start()).max(sub_file.boundary_left);
        let to_x = (*xs.end()).min(sub_file.boundary_right);
        let from_y = (*ys.start()).max(sub_file.boundary_top);
        let to_y = (*ys.end()).min(sub_file.boundary_bottom);
        let empty = from_x > to_x || from_y > to_y;

        Self {
            tile,
            query_zoom,
            sub_file: sub_file.id,
            from_block_x: from_x.saturating_sub(sub_file.boundary_left),
            to_block_x: to_x.saturating_sub(sub_file.boundary_left),
            from_block_y: from_y.saturating_sub(sub_file.boundary_top),
            to_block_y: to_y.saturating_sub(sub_file.boundary_top),
            bitmask,
            coastline_tile,
            empty,
        }
    }

    /// The tile lies outside the sub-file boundary.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn block_count(&self) -> u64 {
        if self.empty {
            0
        } else {
            (self.to_block_x - self.from_block_x + 1) * (self.to_block_y - self.from_block_y + 1)
        }
    }

    /// Block `(column, row)` pairs in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let rows = if self.empty {
            1..=0
        } else {
            self.from_block_y..=self.to_block_y
        };
        rows.flat_map(move |row| (self.from_block_x..=self.to_block_x).map(move |column| (column, row)))
    }
}
