//! LRU cache of index blocks.
//!
//! The index of a sub-file holds one 5 byte entry per block. Entries are read
//! and cached [`INDEX_ENTRIES_PER_BLOCK`] at a time; each cached block keeps
//! the tick of its last access and the least recently used one is dropped
//! when the cache is full.

use std::{
    collections::HashMap,
    io::{self, Read, Seek, SeekFrom},
};

use crate::{buffer::read_u40, header::SubFile};

pub const INDEX_ENTRY_SIZE: usize = 5;
pub const INDEX_ENTRIES_PER_BLOCK: u64 = 128;
pub const INDEX_BLOCK_SIZE: usize = INDEX_ENTRIES_PER_BLOCK as usize * INDEX_ENTRY_SIZE;

pub const DEFAULT_CAPACITY: usize = 64;

const OFFSET_MASK: u64 = 0x7F_FFFF_FFFF;
const WATER_MASK: u64 = 0x80_0000_0000;

#[derive(Debug, thiserror::Error)]
pub enum IndexCacheError {
    #[error("block {block} is outside sub-file {sub_file} ({blocks} blocks)")]
    OutOfRange {
        sub_file: usize,
        block: u64,
        blocks: u64,
    },
    #[error("index block at {position} truncated: read {read} of {expected} bytes")]
    ShortRead {
        position: u64,
        read: usize,
        expected: usize,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Location of a block relative to the start of its sub-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u64,
    /// Every feature of the block is water.
    pub water: bool,
}

impl From<u64> for IndexEntry {
    fn from(raw: u64) -> Self {
        Self {
            offset: raw & OFFSET_MASK,
            water: raw & WATER_MASK != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CachedIndexBlock {
    data: Vec<u8>,
    last_accessed: u64,
}

#[derive(Debug)]
pub struct IndexCache {
    capacity: usize,
    blocks: HashMap<(usize, u64), CachedIndexBlock>,
    tick: u64,
    stats: CacheStats,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl IndexCache {
    /// A cache holding at most `capacity` index blocks (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            blocks: HashMap::with_capacity(capacity),
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Index entry of `block` in `sub_file`, reading its index block from
    /// `reader` on a miss.
    pub fn get<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        sub_file: &SubFile,
        block: u64,
    ) -> Result<IndexEntry, IndexCacheError> {
        if block >= sub_file.blocks {
            return Err(IndexCacheError::OutOfRange {
                sub_file: sub_file.id,
                block,
                blocks: sub_file.blocks,
            });
        }

        let index_block = block / INDEX_ENTRIES_PER_BLOCK;
        let key = (sub_file.id, index_block);
        self.tick += 1;

        if let Some(cached) = self.blocks.get_mut(&key) {
            self.stats.hits += 1;
            cached.last_accessed = self.tick;
        } else {
            self.stats.misses += 1;
            let data = read_index_block(reader, sub_file, index_block)?;
            if self.blocks.len() >= self.capacity {
                self.evict();
            }
            self.blocks.insert(
                key,
                CachedIndexBlock {
                    data,
                    last_accessed: self.tick,
                },
            );
        }

        let data = self
            .blocks
            .get(&key)
            .map(|cached| cached.data.as_slice())
            .unwrap_or_default();

        let start = (block % INDEX_ENTRIES_PER_BLOCK) as usize * INDEX_ENTRY_SIZE;
        let entry: &[u8; INDEX_ENTRY_SIZE] = data
            .get(start..start + INDEX_ENTRY_SIZE)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(IndexCacheError::ShortRead {
                position: sub_file.index_start
                    + index_block * INDEX_BLOCK_SIZE as u64
                    + start as u64,
                read: data.len(),
                expected: start + INDEX_ENTRY_SIZE,
            })?;

        Ok(IndexEntry::from(read_u40(entry)))
    }

    fn evict(&mut self) {
        let oldest = self
            .blocks
            .iter()
            .min_by_key(|(_, cached)| cached.last_accessed)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            trace!(sub_file = key.0, index_block = key.1, "evicting index block");
            self.blocks.remove(&key);
            self.stats.evictions += 1;
        }
    }
}

fn read_index_block<R: Read + Seek>(
    reader: &mut R,
    sub_file: &SubFile,
    index_block: u64,
) -> Result<Vec<u8>, IndexCacheError> {
    let position = sub_file.index_start + index_block * INDEX_BLOCK_SIZE as u64;
    let expected = sub_file
        .index_end
        .saturating_sub(position)
        .min(INDEX_BLOCK_SIZE as u64) as usize;

    reader.seek(SeekFrom::Start(position))?;
    let mut data = vec![0u8; expected];
    let mut read = 0;
    while read < expected {
        match reader.read(&mut data[read..]) {
            Ok(0) => {
                return Err(IndexCacheError::ShortRead {
                    position,
                    read,
                    expected,
                })
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use std::io::Cursor;

    /// A sub-file of `blocks` blocks in one row whose index starts at 0, with
    /// entry `n` pointing at offset `n * 10`.
    fn index(blocks: u64) -> (SubFile, Cursor<Vec<u8>>) {
        let bounding_box = BoundingBox {
            min_latitude: 0,
            min_longitude: 0,
            max_latitude: 0,
            max_longitude: 0,
        };
        let mut sub_file = SubFile::new(0, 0, 0, 0, 0, 0, &bounding_box, false);
        sub_file.blocks_width = blocks;
        sub_file.blocks = blocks;
        sub_file.index_end = blocks * INDEX_ENTRY_SIZE as u64;

        let mut data = vec![];
        for n in 0..blocks {
            let raw = n * 10 | if n % 2 == 1 { WATER_MASK } else { 0 };
            data.extend_from_slice(&raw.to_be_bytes()[3..]);
        }
        (sub_file, Cursor::new(data))
    }

    #[test]
    fn entries() {
        let (sub_file, mut reader) = index(300);
        let mut cache = IndexCache::new(4);
        assert_eq!(
            cache.get(&mut reader, &sub_file, 0).unwrap(),
            IndexEntry { offset: 0, water: false }
        );
        assert_eq!(
            cache.get(&mut reader, &sub_file, 129).unwrap(),
            IndexEntry { offset: 1290, water: true }
        );
        // last index block only holds 44 entries
        assert_eq!(cache.get(&mut reader, &sub_file, 299).unwrap().offset, 2990);
        assert_eq!(cache.len(), 3);
        assert!(matches!(
            cache.get(&mut reader, &sub_file, 300),
            Err(IndexCacheError::OutOfRange { block: 300, .. })
        ));
    }

    #[test]
    fn least_recently_used_block_is_evicted() {
        let (sub_file, mut reader) = index(128 * 4);
        let mut cache = IndexCache::new(3);

        for block in [0, 128, 256] {
            cache.get(&mut reader, &sub_file, block).unwrap();
        }
        // touch the first block again so the second becomes the oldest
        cache.get(&mut reader, &sub_file, 1).unwrap();
        cache.get(&mut reader, &sub_file, 384).unwrap();
        assert_eq!(cache.stats().misses, 4);
        assert_eq!(cache.stats().evictions, 1);

        for block in [2, 257, 385] {
            cache.get(&mut reader, &sub_file, block).unwrap();
        }
        assert_eq!(cache.stats().misses, 4);

        cache.get(&mut reader, &sub_file, 130).unwrap();
        assert_eq!(cache.stats().misses, 5);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn truncated_index() {
        let (sub_file, reader) = index(10);
        let mut data = reader.into_inner();
        data.truncate(22);
        let mut reader = Cursor::new(data);

        let mut cache = IndexCache::default();
        assert!(matches!(
            cache.get(&mut reader, &sub_file, 3),
            Err(IndexCacheError::ShortRead { read: 22, expected: 50, .. })
        ));
        assert!(cache.is_empty());
    }
}
