//! Recursive quadtree sort.
//!
//! Each tile either keeps every point that reaches it, or keeps a random
//! sample of about `min_points` and spills the rest into one temporary file
//! per quadrant. The spill files are then sorted the same way one level down,
//! depth first.

use log::{debug, info};
use rand::Rng;
use std::path::PathBuf;

use crate::codec::{PointCodec, PointRecord, PointWriter, Sink};
use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::header::PointHeader;
use crate::model::manifest::Manifest;
use crate::model::options::{Options, StoreMode};
use crate::model::tile::TileIdent;
use crate::model::State;
use crate::source::{PointSource, TempFile};
use crate::store::TileStore;

/// Where the points kept by the tile being sorted go.
enum TileOutput<W> {
	/// A blob of its own, stored whole.
	Blob(W),
	/// A run of the shared point stream.
	Stream { start: u64, count: u64 },
}

/// Points routed to one quadrant, waiting to be sorted one level down.
struct Spill<W> {
	ident: TileIdent,
	// closed before the guard below deletes anything
	writer: W,
	file: TempFile,
}

impl<W: PointWriter> Spill<W> {
	fn close(self) -> Result<(TileIdent, TempFile)> {
		let Spill {
			ident,
			writer,
			file,
		} = self;
		writer.close()?;
		Ok((ident, file))
	}
}

pub struct Sorter<'c, C: PointCodec, R: Rng> {
	codec: &'c C,
	rng: R,
	min_points: u64,
	max_points: u64,
	max_level: u32,
	tmp_dir: PathBuf,
	stream_path: Option<PathBuf>,
	name: Option<String>,
	stream: Option<C::Writer>,
	track_color: bool,
	state: State,
}

impl<'c, C: PointCodec, R: Rng> Sorter<'c, C, R> {
	pub fn new(codec: &'c C, options: &Options, rng: R) -> Result<Sorter<'c, C, R>> {
		options.validate()?;
		Ok(Sorter {
			codec,
			rng,
			min_points: options.min_points,
			max_points: options.max_points,
			max_level: options.max_level,
			tmp_dir: options.tmp_dir.clone(),
			stream_path: options.stream.clone(),
			name: options.name.clone(),
			stream: None,
			track_color: false,
			state: State::default(),
		})
	}

	pub fn state(&self) -> &State {
		&self.state
	}

	/// Sort every point of `source` into `store`, then write the manifest.
	pub fn process(&mut self, source: PointSource<'c, C>, store: &mut TileStore) -> Result<Manifest> {
		let header = source.header().clone();
		self.state = State::default();
		self.track_color = header.has_color;
		let size = header.bounds.size();
		info!(
			"Sorting {} points over {:.2} x {:.2}",
			header.point_count, size.x, size.y
		);

		if store.mode() == StoreMode::IndexOnly {
			let path = self.stream_path.clone().ok_or_else(|| {
				Error::Config("index-only mode needs a point stream path".to_string())
			})?;
			self.stream = Some(self.codec.create(Sink::File(path), &header)?);
		}

		let result = self.process_tile(TileIdent::ROOT, source, &header.bounds, store);
		let stream = self.stream.take();
		result?;
		if let Some(stream) = stream {
			stream.close()?;
		}

		let mut manifest = Manifest::create(&header, &self.state, self.min_points, self.max_points);
		if let Some(name) = &self.name {
			manifest.name = name.clone();
		}
		store.set_header(&manifest)?;
		store.flush()?;

		info!(
			"Sorted {} points into {} tiles, {} levels deep",
			self.state.points_total, self.state.tiles_total, self.state.max_level
		);
		Ok(manifest)
	}

	fn process_tile(
		&mut self,
		ident: TileIdent,
		source: PointSource<'c, C>,
		root: &Bounds,
		store: &mut TileStore,
	) -> Result<()> {
		self.sort_tile(ident, source, root, store)
			.map_err(|e| e.in_tile(ident))
	}

	fn sort_tile(
		&mut self,
		ident: TileIdent,
		mut source: PointSource<'c, C>,
		root: &Bounds,
		store: &mut TileStore,
	) -> Result<()> {
		let header = source.header().clone();
		let total = header.point_count;
		let mut tile = self.open_tile(&header)?;
		let mut quadrants: [Option<Spill<C::Writer>>; 4] = Default::default();

		if total <= self.max_points || ident.level >= self.max_level {
			while source.has_next() {
				let point = source.next_point()?;
				self.keep(&mut tile, &point)?;
			}
		} else {
			let frac_to_keep = self.min_points as f64 / total as f64;
			let rect = ident.rect(root);
			while source.has_next() {
				let point = source.next_point()?;
				if self.rng.gen::<f64>() <= frac_to_keep {
					self.keep(&mut tile, &point)?;
					continue;
				}

				let position = point.position();
				let (dx, dy) = rect.quadrant(position.x, position.y);
				let slot = &mut quadrants[(dy * 2 + dx) as usize];
				if slot.is_none() {
					*slot = Some(self.create_spill(ident.child(dx, dy), &header)?);
				}
				if let Some(spill) = slot {
					spill.writer.write_point(&point)?;
				}
			}
		}

		let kept = self.commit(ident, tile, store)?;
		debug!(
			"{}Tile {} saved {} of {} points",
			"  ".repeat(ident.level as usize),
			ident,
			kept,
			total
		);
		source.remove_files()?;

		let children = quadrants
			.into_iter()
			.flatten()
			.map(Spill::close)
			.collect::<Result<Vec<_>>>()?;
		for (child, file) in children {
			let child_source = PointSource::from_spill(self.codec, file)?;
			self.process_tile(child, child_source, root, store)?;
		}
		Ok(())
	}

	fn open_tile(&self, header: &PointHeader<C::Native>) -> Result<TileOutput<C::Writer>> {
		match &self.stream {
			Some(stream) => Ok(TileOutput::Stream {
				start: stream.points_written(),
				count: 0,
			}),
			None => Ok(TileOutput::Blob(self.codec.create(Sink::Memory, header)?)),
		}
	}

	fn create_spill(&self, ident: TileIdent, header: &PointHeader<C::Native>) -> Result<Spill<C::Writer>> {
		let path = self.tmp_dir.join(format!(
			"src_{}_{}_{}.{}",
			ident.x,
			ident.y,
			ident.level,
			self.codec.extension()
		));
		let file = TempFile::new(path.clone());
		let writer = self.codec.create(Sink::File(path), header)?;
		Ok(Spill {
			ident,
			writer,
			file,
		})
	}

	fn keep(&mut self, tile: &mut TileOutput<C::Writer>, point: &C::Point) -> Result<()> {
		match tile {
			TileOutput::Blob(writer) => writer.write_point(point)?,
			TileOutput::Stream { count, .. } => {
				let stream = self
					.stream
					.as_mut()
					.ok_or_else(|| Error::Config("point stream is closed".to_string()))?;
				stream.write_point(point)?;
				*count += 1;
			}
		}

		if self.track_color {
			if let Some(color) = point.color() {
				self.state.max_color = color.iter().fold(self.state.max_color, |max, c| max.max(*c));
			}
		}
		Ok(())
	}

	fn commit(&mut self, ident: TileIdent, tile: TileOutput<C::Writer>, store: &mut TileStore) -> Result<u64> {
		let kept = match tile {
			TileOutput::Blob(writer) => {
				let kept = writer.points_written();
				let data = writer.close()?.unwrap_or_default();
				store.add_tile(&data, ident.x, ident.y, ident.level)?;
				kept
			}
			TileOutput::Stream { start, count } => {
				store.add_tile_offset(start, count, ident.x, ident.y, ident.level)?;
				count
			}
		};

		self.state.points_total += kept;
		self.state.tiles_total += 1;
		self.state.max_level = self.state.max_level.max(ident.level);
		Ok(kept)
	}
}
