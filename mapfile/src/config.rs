use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::index_cache;

/// Blocks larger than this are considered corrupt and skipped.
pub const DEFAULT_MAXIMUM_BLOCK_SIZE: u64 = 2_500_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapFileOptions {
    /// Index blocks kept in memory, each covering
    /// [`index_cache::INDEX_ENTRIES_PER_BLOCK`] map blocks.
    pub index_cache_capacity: usize,
    pub maximum_block_size: u64,
    /// Report way names and refs to the sink.
    pub read_way_names: bool,
}

impl Default for MapFileOptions {
    fn default() -> Self {
        Self {
            index_cache_capacity: index_cache::DEFAULT_CAPACITY,
            maximum_block_size: DEFAULT_MAXIMUM_BLOCK_SIZE,
            read_way_names: true,
        }
    }
}

impl MapFileOptions {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[test]
fn partial_options_use_defaults() {
    let options: MapFileOptions = serde_json::from_str(r#"{ "index_cache_capacity": 8 }"#).unwrap();
    assert_eq!(options.index_cache_capacity, 8);
    assert_eq!(options.maximum_block_size, 2_500_000);
    assert!(options.read_way_names);

    let options: MapFileOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, MapFileOptions::default());
}
