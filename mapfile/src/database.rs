use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    block::{BlockCounts, BlockDecoder, Scratch},
    config::MapFileOptions,
    header::{Header, OpenError},
    index_cache::{CacheStats, IndexCache, IndexCacheError, IndexEntry},
    query::QueryPlan,
    sink::MapSink,
    tile::Tile,
    Error,
};

/// Cancels the running query of a [`MapFile`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Complete,
    /// Stopped through the [`StopHandle`].
    Cancelled,
    /// Stopped early because of corrupt data. Everything before it was
    /// delivered.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryReport {
    pub status: QueryStatus,
    pub blocks_read: u64,
    pub blocks_skipped: u64,
    pub points_of_interest: u64,
    pub ways: u64,
    pub ways_filtered: u64,
    /// Every visited block was flagged as water.
    pub water: bool,
}

/// An open map file. One query at a time; give every worker thread its own
/// instance.
#[derive(Debug)]
pub struct MapFile<R = File> {
    reader: R,
    header: Header,
    options: MapFileOptions,
    index_cache: IndexCache,
    stop: StopHandle,
    scratch: Scratch,
    block: Vec<u8>,
}

impl MapFile<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        Self::open_with(path, MapFileOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: MapFileOptions) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        info!(path = %path.display(), file_size, "opening map file");
        Self::from_reader(file, file_size, options)
    }
}

impl<R: Read + Seek> MapFile<R> {
    /// Reads the header from the start of `reader`, a map file of `file_size`
    /// bytes.
    pub fn from_reader(
        mut reader: R,
        file_size: u64,
        options: MapFileOptions,
    ) -> Result<Self, OpenError> {
        reader.seek(SeekFrom::Start(0))?;
        let header = Header::read(&mut reader, file_size)?;

        Ok(Self {
            reader,
            header,
            index_cache: IndexCache::new(options.index_cache_capacity),
            options,
            stop: StopHandle::default(),
            scratch: Scratch::default(),
            block: Vec::new(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn options(&self) -> &MapFileOptions {
        &self.options
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn index_cache_stats(&self) -> CacheStats {
        self.index_cache.stats()
    }

    pub fn close(self) {
        debug!(index_cache = ?self.index_cache.stats(), "closing map file");
    }

    /// [`MapFile::query`] with the way name setting from [`MapFileOptions`].
    pub fn query_with_options<S: MapSink + ?Sized>(
        &mut self,
        tile: Tile,
        sink: &mut S,
    ) -> Result<QueryReport, Error> {
        let read_way_names = self.options.read_way_names;
        self.query(tile, read_way_names, sink)
    }

    /// Decodes every feature stored for `tile` into `sink`.
    ///
    /// Corrupt data stops the query with [`QueryStatus::Aborted`]; only I/O
    /// failures are returned as errors.
    #[tracing::instrument(level = "debug", skip_all, fields(tile = %tile))]
    pub fn query<S: MapSink + ?Sized>(
        &mut self,
        tile: Tile,
        read_way_names: bool,
        sink: &mut S,
    ) -> Result<QueryReport, Error> {
        self.stop.reset();
        let mut report = QueryReport::default();

        let Some(plan) = QueryPlan::new(&self.header, tile) else {
            warn!(zoom = tile.zoom, "no sub-file for zoom level");
            report.status = QueryStatus::Aborted;
            return Ok(report);
        };

        let mut counts = BlockCounts::default();
        let status = self.scan(&plan, read_way_names, sink, &mut report, &mut counts);

        report.points_of_interest = counts.points_of_interest;
        report.ways = counts.ways;
        report.ways_filtered = counts.ways_filtered;
        report.status = status?;

        debug!(?report, "query finished");
        Ok(report)
    }

    fn scan<S: MapSink + ?Sized>(
        &mut self,
        plan: &QueryPlan,
        read_way_names: bool,
        sink: &mut S,
        report: &mut QueryReport,
        counts: &mut BlockCounts,
    ) -> Result<QueryStatus, Error> {
        let Self {
            reader,
            header,
            options,
            index_cache,
            stop,
            scratch,
            block: buffer,
        } = self;
        let sub_file = &header.sub_files[plan.sub_file];

        sink.render_coastline_tile(plan.coastline_tile);

        let mut water = true;
        let mut water_known = false;

        for (column, row) in plan.blocks() {
            if stop.is_stopped() {
                info!("query cancelled");
                return Ok(QueryStatus::Cancelled);
            }

            let block = sub_file.block_number(column, row);
            let Some(entry) = index_entry(index_cache, reader, sub_file, block)? else {
                return Ok(QueryStatus::Aborted);
            };
            water &= entry.water;
            water_known = true;

            let next = if block + 1 == sub_file.blocks {
                sub_file.size
            } else {
                match index_entry(index_cache, reader, sub_file, block + 1)? {
                    Some(next) => next.offset,
                    None => return Ok(QueryStatus::Aborted),
                }
            };

            if entry.offset > sub_file.size || next > sub_file.size || next < entry.offset {
                error!(
                    sub_file = sub_file.id,
                    block,
                    offset = entry.offset,
                    next,
                    size = sub_file.size,
                    "invalid block pointer"
                );
                return Ok(QueryStatus::Aborted);
            }

            let size = next - entry.offset;
            if size == 0 {
                trace!(block, "empty block");
                report.blocks_skipped += 1;
                continue;
            }
            if size > options.maximum_block_size {
                warn!(
                    sub_file = sub_file.id,
                    block,
                    size,
                    maximum = options.maximum_block_size,
                    "skipping oversized block"
                );
                report.blocks_skipped += 1;
                continue;
            }

            buffer.resize(size as usize, 0);
            reader.seek(SeekFrom::Start(sub_file.start_address + entry.offset))?;
            match reader.read_exact(buffer) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    error!(sub_file = sub_file.id, block, size, "block truncated");
                    return Ok(QueryStatus::Aborted);
                }
                Err(e) => return Err(e.into()),
            }
            report.blocks_read += 1;

            let decoder = BlockDecoder {
                sub_file,
                point_of_interest_tags: &header.point_of_interest_tags,
                way_tags: &header.way_tags,
                query_zoom: plan.query_zoom,
                bitmask: plan.bitmask,
                origin: sub_file.block_tile(block).origin(),
                debug: header.is_debug(),
                read_way_names,
            };
            if let Err(e) = decoder.decode(&buffer[..], scratch, sink, counts) {
                error!(sub_file = sub_file.id, block, error = %e, "corrupt block");
                return Ok(QueryStatus::Aborted);
            }
        }

        if water && water_known {
            report.water = true;
            sink.render_water_background();
        }

        Ok(QueryStatus::Complete)
    }
}

/// `None` after logging when the index cannot provide the entry; I/O errors
/// are passed on.
fn index_entry<R: Read + Seek>(
    cache: &mut IndexCache,
    reader: &mut R,
    sub_file: &crate::header::SubFile,
    block: u64,
) -> Result<Option<IndexEntry>, Error> {
    match cache.get(reader, sub_file, block) {
        Ok(entry) => Ok(Some(entry)),
        Err(IndexCacheError::Io(e)) => Err(e.into()),
        Err(e) => {
            error!(sub_file = sub_file.id, block, error = %e, "index entry unavailable");
            Ok(None)
        }
    }
}
