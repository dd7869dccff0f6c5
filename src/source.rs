use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::codec::{PointCodec, PointReader};
use crate::error::{Error, Result};
use crate::model::header::PointHeader;

/// A file the run created for itself. Deleted when dropped.
#[derive(Debug)]
pub struct TempFile {
	path: PathBuf,
	removed: bool,
}

impl TempFile {
	pub fn new(path: PathBuf) -> TempFile {
		TempFile {
			path,
			removed: false,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Delete now and report failure instead of only logging it.
	pub fn remove(mut self) -> Result<()> {
		self.removed = true;
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(Error::io(&self.path, e)),
		}
	}
}

impl Drop for TempFile {
	fn drop(&mut self) {
		if self.removed {
			return;
		}
		if let Err(e) = fs::remove_file(&self.path) {
			if e.kind() != io::ErrorKind::NotFound {
				warn!("Unable to remove {}: {}", self.path.display(), e);
			}
		}
	}
}

/// One or more point files read back to back as a single stream.
///
/// Only one reader is open at a time; the next file is opened when the
/// current one runs dry.
pub struct PointSource<'c, C: PointCodec> {
	codec: &'c C,
	paths: Vec<PathBuf>,
	header: PointHeader<C::Native>,
	// must drop before `temp` so the file is closed when it is deleted
	reader: Option<C::Reader>,
	next_file: usize,
	points_read: u64,
	temp: Vec<TempFile>,
}

impl<'c, C: PointCodec> PointSource<'c, C> {
	/// Read and merge the headers of `paths`. Point data is not touched yet.
	pub fn open(codec: &'c C, paths: &[PathBuf]) -> Result<PointSource<'c, C>> {
		let (first, rest) = paths
			.split_first()
			.ok_or_else(|| Error::Config("no input files given".to_string()))?;

		let mut header = codec.open(first)?.header().clone();
		for path in rest {
			let reader = codec.open(path)?;
			header.merge(reader.header(), path)?;
		}
		info!(
			"Checked all {} files for {} points",
			paths.len(),
			header.point_count
		);

		Ok(PointSource {
			codec,
			paths: paths.to_vec(),
			header,
			reader: None,
			next_file: 0,
			points_read: 0,
			temp: Vec::new(),
		})
	}

	/// Reopen a spill file. The file is deleted by `remove_files` or when the
	/// source is dropped.
	pub fn from_spill(codec: &'c C, file: TempFile) -> Result<PointSource<'c, C>> {
		let reader = codec.open(file.path())?;
		let header = reader.header().clone();
		Ok(PointSource {
			codec,
			paths: vec![file.path().to_path_buf()],
			header,
			reader: Some(reader),
			next_file: 1,
			points_read: 0,
			temp: vec![file],
		})
	}

	pub fn header(&self) -> &PointHeader<C::Native> {
		&self.header
	}

	/// Whether points remain, going by the point counts the headers advertise.
	pub fn has_next(&self) -> bool {
		self.points_read < self.header.point_count
	}

	pub fn next_point(&mut self) -> Result<C::Point> {
		loop {
			if let Some(reader) = self.reader.as_mut() {
				if let Some(point) = reader.read_point()? {
					self.points_read += 1;
					return Ok(point);
				}
				self.reader = None;
			}

			let path = self.paths.get(self.next_file).ok_or_else(|| {
				Error::format(
					self.paths.last().map(PathBuf::as_path).unwrap_or(Path::new("")),
					format!(
						"inputs end after {} of {} points",
						self.points_read, self.header.point_count
					),
				)
			})?;
			self.reader = Some(self.codec.open(path)?);
			self.next_file += 1;
		}
	}

	/// Close the reader and delete the spill files behind this source. Inputs
	/// given to `open` are never deleted.
	pub fn remove_files(self) -> Result<()> {
		let PointSource { reader, temp, .. } = self;
		drop(reader);
		for file in temp {
			file.remove()?;
		}
		Ok(())
	}
}
