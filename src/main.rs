use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

use lidar_quadsort::codec::{CsvCodec, Format, LasCodec, PointCodec, RawCodec};
use lidar_quadsort::model::manifest::Manifest;
use lidar_quadsort::model::options::{Options, StoreMode};
use lidar_quadsort::writer::{write_manifest_json, write_tile_store};

/// Sort point cloud files into a quadtree tile store.
#[derive(Parser, Debug)]
#[command(name = "lidar-quadsort", version)]
struct Args {
	/// Input point files (las, laz, qsp or csv)
	inputs: Vec<PathBuf>,

	/// Text file listing more inputs, one path per line
	#[arg(long)]
	file_list: Option<PathBuf>,

	/// Tile store to create
	#[arg(short, long)]
	output: PathBuf,

	/// Directory for the temporary spill files
	#[arg(long)]
	tmp_dir: Option<PathBuf>,

	/// Points kept in a tile that gets split
	#[arg(long)]
	min_points: Option<u64>,

	/// Largest tile written without splitting
	#[arg(long)]
	max_points: Option<u64>,

	#[arg(long)]
	max_level: Option<u32>,

	#[arg(long, value_enum)]
	mode: Option<StoreMode>,

	/// Point stream for index-only stores. Defaults to the output path with
	/// the format's extension.
	#[arg(long)]
	stream: Option<PathBuf>,

	/// Input format, guessed from the first input's extension if not given
	#[arg(long, value_enum)]
	format: Option<Format>,

	/// Seed for the sampling, for repeatable output
	#[arg(long)]
	seed: Option<u64>,

	/// Dataset name written to the manifest
	#[arg(long)]
	name: Option<String>,

	/// JSON options file; flags given on the command line win
	#[arg(long)]
	config: Option<PathBuf>,

	/// Also write the manifest as JSON
	#[arg(long)]
	manifest_json: Option<PathBuf>,
}

fn main() -> Result<()> {
	env_logger::init();
	let args = Args::parse();

	let options = options(&args)?;
	let inputs = inputs(&args)?;
	let format = match args.format {
		Some(format) => format,
		None => match inputs.first().and_then(|path| Format::detect(path)) {
			Some(format) => format,
			None => bail!("unable to tell the input format, pass --format"),
		},
	};
	info!("Sorting {} {:?} files into {}", inputs.len(), format, args.output.display());

	let manifest = match format {
		Format::Las => run(&LasCodec, &inputs, &args.output, &options)?,
		Format::Raw => run(&RawCodec, &inputs, &args.output, &options)?,
		Format::Csv => run(&CsvCodec, &inputs, &args.output, &options)?,
	};

	if let Some(path) = &args.manifest_json {
		write_manifest_json(&manifest, path)?;
	}
	Ok(())
}

fn run<C: PointCodec>(codec: &C, inputs: &[PathBuf], output: &Path, options: &Options) -> Result<Manifest> {
	let rng = match options.seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_entropy(),
	};
	let manifest = write_tile_store(codec, inputs, output, options, rng)
		.with_context(|| format!("failed to write {}", output.display()))?;
	Ok(manifest)
}

fn options(args: &Args) -> Result<Options> {
	let mut options = match &args.config {
		Some(path) => Options::from_json(path)?,
		None => Options::default(),
	};
	if let Some(tmp_dir) = &args.tmp_dir {
		options.tmp_dir = tmp_dir.clone();
	}
	if let Some(min_points) = args.min_points {
		options.min_points = min_points;
	}
	if let Some(max_points) = args.max_points {
		options.max_points = max_points;
	}
	if let Some(max_level) = args.max_level {
		options.max_level = max_level;
	}
	if let Some(mode) = args.mode {
		options.mode = mode;
	}
	if args.stream.is_some() {
		options.stream = args.stream.clone();
	}
	if args.seed.is_some() {
		options.seed = args.seed;
	}
	if args.name.is_some() {
		options.name = args.name.clone();
	}
	options.validate()?;
	Ok(options)
}

fn inputs(args: &Args) -> Result<Vec<PathBuf>> {
	let mut inputs = args.inputs.clone();
	if let Some(list) = &args.file_list {
		let text = fs::read_to_string(list)
			.with_context(|| format!("unable to read file list {}", list.display()))?;
		inputs.extend(
			text.lines()
				.map(str::trim)
				.filter(|line| !line.is_empty() && !line.starts_with('#'))
				.map(PathBuf::from),
		);
	}
	if inputs.is_empty() {
		bail!("no input files given");
	}
	Ok(inputs)
}
