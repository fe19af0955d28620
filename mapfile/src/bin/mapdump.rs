use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::Parser;
use eyre::{bail, WrapErr};
use geojson::Feature;
use mapfile::{
    pipe::{ConsumeLeft, Pipe, Producer, TryCollector, Unzip},
    ser, CoastlineFilter, Error, FeatureCollector, MapFile, MapFileOptions, QueryReport,
    QueryStatus, Tile, TileProjection,
};
use rayon::prelude::*;

/// Dumps the features of map file tiles as GeoJSON.
#[derive(Debug, clap::Parser)]
struct Args {
    /// Path to the map file
    #[arg()]
    map: PathBuf,

    /// Tiles as `zoom/x/y` or an inclusive rectangle `zoom/x/y..zoom/x/y`
    #[arg(required = true, num_args = 1.., value_parser = parse_tiles)]
    tiles: Vec<TileRange>,

    /// Write the feature collection here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file with map file options
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct TileRange(Vec<Tile>);

fn parse_tiles(arg: &str) -> eyre::Result<TileRange> {
    let Some((from, to)) = arg.split_once("..") else {
        return Ok(TileRange(vec![arg.parse()?]));
    };
    let (from, to): (Tile, Tile) = (from.parse()?, to.parse()?);
    if from.zoom != to.zoom {
        bail!("tile range {arg} spans zoom levels");
    }
    let mut tiles = Vec::new();
    for y in from.y.min(to.y)..=from.y.max(to.y) {
        for x in from.x.min(to.x)..=from.x.max(to.x) {
            tiles.push(Tile::new(x, y, from.zoom)?);
        }
    }
    Ok(TileRange(tiles))
}

/// Logs one line per tile and the totals.
struct LogSummary;

impl Pipe for LogSummary {
    type Input = Vec<(Tile, QueryReport)>;

    type Output = ();

    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        let mut total = QueryReport::default();
        for (tile, report) in &input {
            tracing::info!(
                %tile,
                status = ?report.status,
                blocks = report.blocks_read,
                pois = report.points_of_interest,
                ways = report.ways,
                water = report.water,
                "tile done"
            );
            if report.status != QueryStatus::Complete {
                tracing::warn!(%tile, status = ?report.status, "incomplete tile");
            }
            total.blocks_read += report.blocks_read;
            total.blocks_skipped += report.blocks_skipped;
            total.points_of_interest += report.points_of_interest;
            total.ways += report.ways;
            total.ways_filtered += report.ways_filtered;
        }
        tracing::info!(
            tiles = input.len(),
            blocks = total.blocks_read,
            skipped = total.blocks_skipped,
            pois = total.points_of_interest,
            ways = total.ways,
            filtered = total.ways_filtered,
            "dump finished"
        );
        Ok(Some(()))
    }
}

fn dump_tile(map: &mut MapFile, tile: Tile) -> Result<(Vec<Feature>, (Tile, QueryReport)), Error> {
    let mut filter = CoastlineFilter::new(FeatureCollector::new(), map.header());
    let report = map.query_with_options(tile, &mut filter)?;
    let collector = filter.finish();

    let projection = TileProjection {
        tile_size: map.header().tile_size,
    };
    let features = ser::to_features(&collector, map.header(), &projection);
    Ok((features, (tile, report)))
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mapfile=info,coastline=info".into()),
        )
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let tiles: Vec<Tile> = args.tiles.iter().flat_map(|range| range.0.iter().copied()).collect();
    let options = match &args.config {
        Some(path) => MapFileOptions::from_json_file(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?,
        None => MapFileOptions::default(),
    };

    let map = MapFile::open_with(&args.map, options.clone())
        .wrap_err_with(|| format!("opening {}", args.map.display()))?;
    let header = map.header();
    tracing::info!(
        version = header.version,
        tile_size = header.tile_size,
        bbox = ?header.bounding_box,
        zoom = %format!("{}..={}", header.zoom_min, header.zoom_max),
        sub_files = header.sub_files.len(),
        poi_tags = header.point_of_interest_tags.len(),
        way_tags = header.way_tags.len(),
        comment = header.comment.as_deref().unwrap_or(""),
        "map header"
    );
    map.close();

    let results = tiles
        .par_iter()
        .map_init(
            || MapFile::open_with(&args.map, options.clone()),
            |map, &tile| {
                let map = map.as_mut().map_err(|e| Error::Worker(e.to_string()))?;
                dump_tile(map, tile)
            },
        )
        .collect::<Vec<_>>();

    let output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).wrap_err_with(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    let mut pipes = results.into_iter().producer().feed(
        TryCollector::new()
            .pipe(Unzip::new())
            .pipe(ConsumeLeft::new(ser::WriteGeojson::new(output)))
            .pipe(LogSummary),
    );

    std::iter::from_fn(|| pipes.produce()).try_for_each(|result| result.map(drop))?;
    Ok(())
}
