//! Writer for small synthetic map files.
#![allow(dead_code)]

use std::{collections::HashMap, io::Cursor, io::Write};

use mapfile::{
    block::{BLOCK_SIGNATURE, POINT_OF_INTEREST_SIGNATURE, SIGNATURE_LENGTH, WAY_SIGNATURE},
    header::{MAGIC, SIGNATURE_LENGTH_INDEX},
    mercator,
    vbe::{encode_signed, encode_unsigned},
    BoundingBox, GeoPoint, MapFile, MapFileOptions, SubFile, Tile,
};

pub const COASTLINE: &str = "natural=coastline";

fn string(out: &mut Vec<u8>, s: &str) {
    encode_unsigned(s.len() as u32, out);
    out.extend_from_slice(s.as_bytes());
}

fn signature(out: &mut Vec<u8>, text: &str, length: usize) {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(length, b' ');
    out.extend_from_slice(&bytes);
}

fn u40(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes()[3..]);
}

/// Bounding box a little inside the given base zoom tile range, so that the
/// sub-file grid covers exactly those tiles.
pub fn bbox_for_tiles(zoom: u8, xs: (u64, u64), ys: (u64, u64)) -> BoundingBox {
    let inset = 0.001;
    let degrees = |value: f64| (value * 1e6) as i32;
    BoundingBox {
        min_latitude: degrees(mercator::tile_y_to_latitude(ys.1 + 1, zoom) + inset),
        min_longitude: degrees(mercator::tile_x_to_longitude(xs.0, zoom) + inset),
        max_latitude: degrees(mercator::tile_y_to_latitude(ys.0, zoom) - inset),
        max_longitude: degrees(mercator::tile_x_to_longitude(xs.1 + 1, zoom) - inset),
    }
}

/// Encodes the contents of one block.
#[derive(Debug)]
pub struct BlockBuilder {
    zoom_min: u8,
    zoom_max: u8,
    origin: GeoPoint,
    debug: bool,
    points: HashMap<u8, Vec<Vec<u8>>>,
    ways: HashMap<u8, Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, Default)]
pub struct WaySpec<'a> {
    pub layer: u8,
    pub tags: &'a [u16],
    pub bitmask: u16,
    pub nodes: &'a [GeoPoint],
    pub name: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub label_position: Option<GeoPoint>,
    pub inner_rings: &'a [&'a [GeoPoint]],
}

impl BlockBuilder {
    pub fn new(zoom_min: u8, zoom_max: u8, tile: Tile, debug: bool) -> Self {
        Self {
            zoom_min,
            zoom_max,
            origin: tile.origin(),
            debug,
            points: HashMap::new(),
            ways: HashMap::new(),
        }
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Adds a point of interest first visible at `zoom`.
    pub fn point_of_interest(
        &mut self,
        zoom: u8,
        position: GeoPoint,
        tags: &[u16],
        name: Option<&str>,
    ) -> &mut Self {
        let mut out = vec![];
        if self.debug {
            signature(&mut out, POINT_OF_INTEREST_SIGNATURE, SIGNATURE_LENGTH);
        }
        encode_signed(position.latitude - self.origin.latitude, &mut out);
        encode_signed(position.longitude - self.origin.longitude, &mut out);
        out.push(5 << 4 | tags.len() as u8);
        for &tag in tags {
            encode_unsigned(u32::from(tag), &mut out);
        }
        match name {
            Some(name) => {
                out.push(0x80);
                string(&mut out, name);
            }
            None => out.push(0),
        }
        self.points.entry(zoom).or_default().push(out);
        self
    }

    /// Adds a way first visible at `zoom`.
    pub fn way(&mut self, zoom: u8, way: WaySpec<'_>) -> &mut Self {
        let mut body = way.bitmask.to_be_bytes().to_vec();
        body.push(way.layer << 4 | way.tags.len() as u8);
        body.push((way.tags.len() as u8) << 5);
        for &tag in way.tags {
            encode_unsigned(u32::from(tag), &mut body);
        }
        self.node_chain(way.nodes, &mut body);

        let mut features = 0u8;
        if way.name.is_some() {
            features |= 0x80;
        }
        if way.reference.is_some() {
            features |= 0x40;
        }
        if way.label_position.is_some() {
            features |= 0x20;
        }
        if !way.inner_rings.is_empty() {
            features |= 0x10;
        }
        body.push(features);
        if let Some(name) = way.name {
            string(&mut body, name);
        }
        if let Some(reference) = way.reference {
            string(&mut body, reference);
        }
        if let (Some(label), Some(first)) = (way.label_position, way.nodes.first()) {
            encode_signed(label.latitude - first.latitude, &mut body);
            encode_signed(label.longitude - first.longitude, &mut body);
        }
        if !way.inner_rings.is_empty() {
            encode_unsigned(way.inner_rings.len() as u32, &mut body);
            for ring in way.inner_rings {
                self.node_chain(ring, &mut body);
            }
        }

        let mut out = vec![];
        if self.debug {
            signature(&mut out, WAY_SIGNATURE, SIGNATURE_LENGTH);
        }
        encode_unsigned(body.len() as u32, &mut out);
        out.extend(body);
        self.ways.entry(zoom).or_default().push(out);
        self
    }

    /// Adds raw way bytes, for corrupt data.
    pub fn raw_way(&mut self, zoom: u8, bytes: Vec<u8>) -> &mut Self {
        self.ways.entry(zoom).or_default().push(bytes);
        self
    }

    fn node_chain(&self, nodes: &[GeoPoint], out: &mut Vec<u8>) {
        encode_unsigned(nodes.len() as u32, out);
        let mut previous = self.origin;
        for node in nodes {
            encode_signed(node.latitude - previous.latitude, out);
            encode_signed(node.longitude - previous.longitude, out);
            previous = *node;
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![];
        if self.debug {
            signature(&mut out, BLOCK_SIGNATURE, SIGNATURE_LENGTH);
        }

        let (mut points, mut ways): (Vec<u8>, Vec<u8>) = (vec![], vec![]);
        for zoom in self.zoom_min..=self.zoom_max {
            let zoom_points = self.points.get(&zoom).map_or(&[][..], Vec::as_slice);
            let zoom_ways = self.ways.get(&zoom).map_or(&[][..], Vec::as_slice);
            out.extend_from_slice(&(zoom_points.len() as u16).to_be_bytes());
            out.extend_from_slice(&(zoom_ways.len() as u16).to_be_bytes());
            points.extend(zoom_points.iter().flatten());
            ways.extend(zoom_ways.iter().flatten());
        }

        encode_unsigned(points.len() as u32, &mut out);
        out.extend(points);
        out.extend(ways);
        out
    }
}

#[derive(Debug, Clone)]
pub struct SubFileSpec {
    pub base_zoom: u8,
    pub zoom_min: u8,
    pub zoom_max: u8,
    /// Block contents and water flag by base zoom tile. Missing blocks are
    /// empty.
    pub blocks: HashMap<Tile, (Vec<u8>, bool)>,
}

impl SubFileSpec {
    pub fn new(base_zoom: u8, zoom_min: u8, zoom_max: u8) -> Self {
        Self {
            base_zoom,
            zoom_min,
            zoom_max,
            blocks: HashMap::new(),
        }
    }

    pub fn block(&self, tile: Tile, debug: bool) -> BlockBuilder {
        BlockBuilder::new(self.zoom_min, self.zoom_max, tile, debug)
    }

    pub fn insert(&mut self, tile: Tile, data: Vec<u8>, water: bool) -> &mut Self {
        self.blocks.insert(tile, (data, water));
        self
    }
}

#[derive(Debug, Clone)]
pub struct MapWriter {
    pub version: u32,
    pub projection: String,
    pub tile_size: u16,
    pub bounding_box: BoundingBox,
    pub start_position: Option<GeoPoint>,
    pub debug: bool,
    pub date: i64,
    pub point_of_interest_tags: Vec<String>,
    pub way_tags: Vec<String>,
    pub comment: String,
    pub sub_files: Vec<SubFileSpec>,
}

impl MapWriter {
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            version: 3,
            projection: "Mercator".to_string(),
            tile_size: 256,
            bounding_box,
            start_position: None,
            debug: false,
            date: 1_700_000_000_000,
            point_of_interest_tags: vec!["amenity=pub".into(), "natural=peak".into()],
            way_tags: vec![
                "highway=primary".into(),
                "building=yes".into(),
                COASTLINE.into(),
            ],
            comment: String::new(),
            sub_files: vec![],
        }
    }

    pub fn way_tag(&self, name: &str) -> u16 {
        self.way_tags.iter().position(|tag| tag == name).unwrap() as u16
    }

    pub fn grid(&self, index: usize) -> SubFile {
        let spec = &self.sub_files[index];
        SubFile::new(
            index,
            spec.base_zoom,
            spec.zoom_min,
            spec.zoom_max,
            0,
            0,
            &self.bounding_box,
            self.debug,
        )
    }

    fn header(&self, addresses: &[(u64, u64)]) -> Vec<u8> {
        let mut out = vec![];
        out.extend_from_slice(&self.version.to_be_bytes());
        let mut flags = 0u8;
        if self.debug {
            flags |= 0x80;
        }
        if self.start_position.is_some() {
            flags |= 0x40;
        }
        out.push(flags);
        out.push(self.sub_files.len() as u8);
        string(&mut out, &self.projection);
        out.extend_from_slice(&self.tile_size.to_be_bytes());
        for value in [
            self.bounding_box.max_latitude,
            self.bounding_box.min_longitude,
            self.bounding_box.min_latitude,
            self.bounding_box.max_longitude,
        ] {
            out.extend_from_slice(&value.to_be_bytes());
        }
        if let Some(position) = self.start_position {
            out.extend_from_slice(&position.latitude.to_be_bytes());
            out.extend_from_slice(&position.longitude.to_be_bytes());
        }
        out.extend_from_slice(&self.date.to_be_bytes());
        for tags in [&self.point_of_interest_tags, &self.way_tags] {
            out.extend_from_slice(&(tags.len() as u16).to_be_bytes());
            for (id, tag) in tags.iter().enumerate() {
                string(&mut out, tag);
                out.extend_from_slice(&(id as u16).to_be_bytes());
            }
        }
        string(&mut out, &self.comment);
        for (spec, &(start, size)) in self.sub_files.iter().zip(addresses) {
            out.push(spec.base_zoom);
            out.push(spec.zoom_min);
            out.push(spec.zoom_max);
            u40(&mut out, start);
            u40(&mut out, size);
        }

        let mut file = MAGIC.to_vec();
        file.extend_from_slice(&(out.len() as u32).to_be_bytes());
        file.extend(out);
        file
    }

    fn sub_file(&self, index: usize) -> Vec<u8> {
        let grid = self.grid(index);
        let spec = &self.sub_files[index];

        let mut out = vec![];
        if self.debug {
            signature(&mut out, "+++IndexStart", SIGNATURE_LENGTH_INDEX as usize);
        }
        let index_start = out.len();
        out.resize(index_start + grid.blocks as usize * 5, 0);

        for block in 0..grid.blocks {
            let tile = grid.block_tile(block);
            let (data, water) = spec
                .blocks
                .get(&tile)
                .map_or((&[][..], false), |(data, water)| (data.as_slice(), *water));
            let mut entry = out.len() as u64;
            if water {
                entry |= 0x80_0000_0000;
            }
            let at = index_start + block as usize * 5;
            out[at..at + 5].copy_from_slice(&entry.to_be_bytes()[3..]);
            out.extend_from_slice(data);
        }
        out
    }

    pub fn bytes(&self) -> Vec<u8> {
        let bodies: Vec<Vec<u8>> = (0..self.sub_files.len()).map(|i| self.sub_file(i)).collect();
        let placeholder = vec![(0, 0); bodies.len()];
        let mut start = self.header(&placeholder).len() as u64;

        let mut addresses = vec![];
        for body in &bodies {
            addresses.push((start, body.len() as u64));
            start += body.len() as u64;
        }

        let mut file = self.header(&addresses);
        for body in bodies {
            file.extend(body);
        }
        file
    }

    pub fn open(&self) -> MapFile<Cursor<Vec<u8>>> {
        self.open_with(MapFileOptions::default())
    }

    pub fn open_with(&self, options: MapFileOptions) -> MapFile<Cursor<Vec<u8>>> {
        let bytes = self.bytes();
        let len = bytes.len() as u64;
        MapFile::from_reader(Cursor::new(bytes), len, options).unwrap()
    }
}

pub fn temp_file(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}
