use log::{info, warn};
use rand::Rng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::codec::PointCodec;
use crate::error::{Error, Result};
use crate::model::manifest::Manifest;
use crate::model::options::{Options, StoreMode};
use crate::sorter::Sorter;
use crate::source::PointSource;
use crate::store::TileStore;

/// Sort `inputs` into a new tile store at `store_path`.
///
/// The inputs are checked against each other before the store file is
/// created, so a consistency failure leaves nothing behind.
pub fn write_tile_store<C: PointCodec, R: Rng>(
	codec: &C,
	inputs: &[PathBuf],
	store_path: &Path,
	options: &Options,
	rng: R,
) -> Result<Manifest> {
	options.validate()?;
	let mut options = options.clone();
	if options.mode == StoreMode::IndexOnly {
		let stream = options
			.stream
			.get_or_insert_with(|| store_path.with_extension(codec.extension()));
		check_stream_path(stream, inputs, store_path)?;
	}

	let source = PointSource::open(codec, inputs)?;
	prepare_tmp_dir(&options.tmp_dir)?;
	let run_dir = tempfile::Builder::new()
		.prefix(RUN_DIR_PREFIX)
		.tempdir_in(&options.tmp_dir)
		.map_err(|e| Error::io(&options.tmp_dir, e))?;
	options.tmp_dir = run_dir.path().to_path_buf();

	let mut store = TileStore::create(store_path, options.mode)?;
	let mut sorter = Sorter::new(codec, &options, rng)?;
	let manifest = sorter.process(source, &mut store)?;

	let leftovers = leftover_entries(run_dir.path())?;
	if leftovers > 0 {
		warn!(
			"{} spill files left in {}",
			leftovers,
			run_dir.path().display()
		);
	}
	let run_path = run_dir.path().to_path_buf();
	run_dir.close().map_err(|e| Error::io(&run_path, e))?;

	let state = sorter.state();
	info!(
		"Wrote {} points in {} tiles to {}",
		state.points_total,
		state.tiles_total,
		store_path.display()
	);
	Ok(manifest)
}

pub fn write_manifest_json(manifest: &Manifest, path: &Path) -> Result<()> {
	let file = File::create(path).map_err(|e| Error::io(path, e))?;
	let mut out = BufWriter::new(file);
	serde_json::to_writer_pretty(&mut out, manifest).map_err(|source| Error::Json {
		path: path.to_path_buf(),
		source,
	})?;
	out.flush().map_err(|e| Error::io(path, e))
}

const RUN_DIR_PREFIX: &str = "quadsort-";

/// The stream is truncated when the run starts, so it must not name an input
/// or the store itself.
fn check_stream_path(stream: &Path, inputs: &[PathBuf], store_path: &Path) -> Result<()> {
	let clash = inputs
		.iter()
		.map(PathBuf::as_path)
		.chain(std::iter::once(store_path))
		.find(|other| same_path(stream, other));
	match clash {
		Some(other) => Err(Error::Config(format!(
			"point stream {} would overwrite {}",
			stream.display(),
			other.display()
		))),
		None => Ok(()),
	}
}

fn same_path(a: &Path, b: &Path) -> bool {
	match (fs::canonicalize(a), fs::canonicalize(b)) {
		(Ok(a), Ok(b)) => a == b,
		_ => a == b,
	}
}

fn prepare_tmp_dir(dir: &Path) -> Result<()> {
	fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
	let leftovers = leftover_entries(dir)?;
	if leftovers > 0 {
		warn!(
			"Found {} spill entries in {}, from an aborted or concurrent run",
			leftovers,
			dir.display()
		);
	}
	Ok(())
}

/// Spill files and run directories directly inside `dir`.
fn leftover_entries(dir: &Path) -> Result<usize> {
	let mut count = 0;
	for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
		let entry = entry.map_err(|e| Error::io(dir, e))?;
		let name = entry.file_name();
		let name = name.to_string_lossy();
		if name.starts_with("src_") || name.starts_with(RUN_DIR_PREFIX) {
			count += 1;
		}
	}
	Ok(count)
}

#[cfg(test)]
mod tests {
	use super::{write_manifest_json, write_tile_store};
	use crate::codec::{PointCodec, PointReader, RawCodec};
	use crate::error::ErrorKind;
	use crate::fixtures::{header, random_points, write_raw};
	use crate::model::manifest::Manifest;
	use crate::model::options::{Options, StoreMode};
	use crate::model::vector3::Vector3;
	use crate::store::TileStore;
	use rand::rngs::StdRng;
	use rand::SeedableRng;
	use std::fs;

	#[test]
	fn mismatched_inputs_create_no_store() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let a = dir.path().join("a.qsp");
		let b = dir.path().join("b.qsp");
		let mut rng = StdRng::seed_from_u64(2);
		let mut other = header();
		other.scale = Vector3::splat(1.0 / 512.0);
		write_raw(&a, &header(), &random_points(&mut rng, 10))?;
		write_raw(&b, &other, &random_points(&mut rng, 10))?;

		let store_path = dir.path().join("tiles.db");
		let options = Options {
			tmp_dir: dir.path().join("tmp"),
			..Options::default()
		};
		let err = write_tile_store(&RawCodec, &[a, b], &store_path, &options, rng)
			.err()
			.unwrap();
		assert_eq!(err.kind(), ErrorKind::Consistency);
		assert!(!store_path.exists());
		Ok(())
	}

	#[test]
	fn sorts_two_files_into_a_store() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let mut rng = StdRng::seed_from_u64(4);
		let mut inputs = Vec::new();
		for name in ["a.qsp", "b.qsp"] {
			let path = dir.path().join(name);
			write_raw(&path, &header(), &random_points(&mut rng, 1500))?;
			inputs.push(path);
		}

		let store_path = dir.path().join("tiles.db");
		let tmp_dir = dir.path().join("tmp");
		let options = Options {
			min_points: 200,
			max_points: 400,
			tmp_dir: tmp_dir.clone(),
			name: Some("two files".to_string()),
			..Options::default()
		};
		let manifest = write_tile_store(&RawCodec, &inputs, &store_path, &options, rng)?;
		assert_eq!(manifest.name, "two files");
		assert_eq!(manifest.min_points, 200);
		assert_eq!(manifest.max_points, 400);
		assert!(manifest.max_level > 0);
		assert_eq!(fs::read_dir(&tmp_dir)?.count(), 0);

		let store = TileStore::open(&store_path)?;
		assert_eq!(store.mode(), StoreMode::FullData);
		assert_eq!(store.manifest()?, Some(manifest.clone()));

		let json_path = dir.path().join("manifest.json");
		write_manifest_json(&manifest, &json_path)?;
		let back: Manifest = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
		assert_eq!(back, manifest);
		Ok(())
	}

	#[test]
	fn index_only_stream_defaults_next_to_store() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let mut rng = StdRng::seed_from_u64(6);
		let input = dir.path().join("input.qsp");
		write_raw(&input, &header(), &random_points(&mut rng, 800))?;

		let store_path = dir.path().join("tiles.db");
		let options = Options {
			min_points: 100,
			max_points: 300,
			tmp_dir: dir.path().join("tmp"),
			mode: StoreMode::IndexOnly,
			..Options::default()
		};
		write_tile_store(&RawCodec, &[input], &store_path, &options, rng)?;

		let stream = dir.path().join("tiles.qsp");
		assert_eq!(RawCodec.open(&stream)?.header().point_count, 800);
		let store = TileStore::open(&store_path)?;
		let total: u64 = store.tile_addresses()?.iter().map(|a| a.count).sum();
		assert_eq!(total, 800);
		Ok(())
	}

	#[test]
	fn index_only_stream_must_not_replace_an_input() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let mut rng = StdRng::seed_from_u64(8);
		// the default stream for tiles.db is tiles.qsp, which is the input
		let input = dir.path().join("tiles.qsp");
		write_raw(&input, &header(), &random_points(&mut rng, 800))?;

		let store_path = dir.path().join("tiles.db");
		let options = Options {
			min_points: 100,
			max_points: 300,
			tmp_dir: dir.path().join("tmp"),
			mode: StoreMode::IndexOnly,
			..Options::default()
		};
		let err = write_tile_store(&RawCodec, &[input.clone()], &store_path, &options, rng)
			.err()
			.unwrap();
		assert_eq!(err.kind(), ErrorKind::Config);
		assert!(!store_path.exists());
		assert_eq!(RawCodec.open(&input)?.header().point_count, 800);

		let explicit = Options {
			stream: Some(dir.path().join(".").join("tiles.qsp")),
			..options
		};
		let rng = StdRng::seed_from_u64(9);
		let other_store = dir.path().join("other.db");
		let err = write_tile_store(&RawCodec, &[input.clone()], &other_store, &explicit, rng)
			.err()
			.unwrap();
		assert_eq!(err.kind(), ErrorKind::Config);
		assert_eq!(RawCodec.open(&input)?.header().point_count, 800);
		Ok(())
	}

	#[test]
	fn run_leaves_foreign_files_in_tmp_dir() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let mut rng = StdRng::seed_from_u64(10);
		let input = dir.path().join("input.qsp");
		write_raw(&input, &header(), &random_points(&mut rng, 3000))?;

		let tmp_dir = dir.path().join("tmp");
		fs::create_dir_all(&tmp_dir)?;
		// same name the run would give its first quadrant spill
		let stale = tmp_dir.join("src_0_0_1.qsp");
		fs::write(&stale, b"not ours")?;

		let options = Options {
			min_points: 200,
			max_points: 400,
			tmp_dir: tmp_dir.clone(),
			..Options::default()
		};
		let store_path = dir.path().join("tiles.db");
		let manifest = write_tile_store(&RawCodec, &[input], &store_path, &options, rng)?;
		assert!(manifest.max_level > 0);

		assert_eq!(fs::read(&stale)?, b"not ours");
		let names: Vec<_> = fs::read_dir(&tmp_dir)?
			.map(|entry| entry.map(|e| e.file_name()))
			.collect::<Result<_, _>>()?;
		assert_eq!(names, vec![stale.file_name().unwrap().to_os_string()]);
		Ok(())
	}
}
