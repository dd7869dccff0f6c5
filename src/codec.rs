//! Point file formats behind one interface.
//!
//! The sorter only looks at a point's position and color; everything else a
//! format stores is carried through untouched by the format's own record type.

mod csv_codec;
mod las_codec;
mod raw_codec;

pub use csv_codec::CsvCodec;
pub use las_codec::LasCodec;
pub use raw_codec::{RawCodec, RawReader};

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::header::PointHeader;
use crate::model::point::Point;
use crate::model::vector3::Vector3;

pub trait PointRecord {
	fn position(&self) -> Vector3;
	/// red, green, blue, near infrared
	fn color(&self) -> Option<[u16; 4]>;
}

impl PointRecord for Point {
	fn position(&self) -> Vector3 {
		self.position
	}

	fn color(&self) -> Option<[u16; 4]> {
		self.color
	}
}

pub trait PointReader {
	type Point;
	type Native;

	fn header(&self) -> &PointHeader<Self::Native>;

	/// Next point, or `None` once the file is exhausted.
	fn read_point(&mut self) -> Result<Option<Self::Point>>;
}

pub trait PointWriter {
	type Point;

	fn write_point(&mut self, point: &Self::Point) -> Result<()>;

	fn points_written(&self) -> u64;

	/// Finish the file. A `Sink::Memory` writer hands back the serialized
	/// bytes; a file writer returns `None`.
	fn close(self) -> Result<Option<Vec<u8>>>;
}

pub trait PointCodec {
	type Point: PointRecord;
	type Native: Clone;
	type Reader: PointReader<Point = Self::Point, Native = Self::Native>;
	type Writer: PointWriter<Point = Self::Point>;

	/// File extension used for spill files.
	fn extension(&self) -> &'static str;

	fn open(&self, path: &Path) -> Result<Self::Reader>;

	/// Start a new point file laid out like `header`. Count and bounds are
	/// recomputed from the points written.
	fn create(&self, sink: Sink, header: &PointHeader<Self::Native>) -> Result<Self::Writer>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Sink {
	File(PathBuf),
	Memory,
}

impl Sink {
	/// Name used in error messages.
	pub fn name(&self) -> PathBuf {
		match self {
			Sink::File(path) => path.clone(),
			Sink::Memory => PathBuf::from("<tile>"),
		}
	}
}

/// Seekable destination shared by the format writers.
#[derive(Debug)]
pub enum Output {
	File { path: PathBuf, inner: BufWriter<File> },
	Memory(Cursor<Vec<u8>>),
}

impl Output {
	pub fn create(sink: &Sink) -> Result<Output> {
		match sink {
			Sink::File(path) => {
				let file = File::create(path).map_err(|e| Error::io(path, e))?;
				Ok(Output::File {
					path: path.clone(),
					inner: BufWriter::new(file),
				})
			}
			Sink::Memory => Ok(Output::Memory(Cursor::new(Vec::new()))),
		}
	}

	pub fn finish(self) -> Result<Option<Vec<u8>>> {
		match self {
			Output::File { path, mut inner } => {
				inner.flush().map_err(|e| Error::io(&path, e))?;
				Ok(None)
			}
			Output::Memory(cursor) => Ok(Some(cursor.into_inner())),
		}
	}
}

impl Write for Output {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self {
			Output::File { inner, .. } => inner.write(buf),
			Output::Memory(cursor) => cursor.write(buf),
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self {
			Output::File { inner, .. } => inner.flush(),
			Output::Memory(cursor) => cursor.flush(),
		}
	}
}

impl Seek for Output {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		match self {
			Output::File { inner, .. } => inner.seek(pos),
			Output::Memory(cursor) => cursor.seek(pos),
		}
	}
}

/// Supported input formats.
#[derive(clap::ValueEnum)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
	Las,
	Raw,
	Csv,
}

impl Format {
	/// Guess the format from a file extension.
	pub fn detect(path: &Path) -> Option<Format> {
		let extension = path.extension()?.to_str()?.to_ascii_lowercase();
		match extension.as_str() {
			"las" | "laz" => Some(Format::Las),
			"qsp" => Some(Format::Raw),
			"csv" => Some(Format::Csv),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::Format;
	use std::path::Path;

	#[test]
	fn detects_by_extension() {
		assert_eq!(Format::detect(Path::new("a/b/tile.LAZ")), Some(Format::Las));
		assert_eq!(Format::detect(Path::new("cloud.las")), Some(Format::Las));
		assert_eq!(Format::detect(Path::new("src_0_1_1.qsp")), Some(Format::Raw));
		assert_eq!(Format::detect(Path::new("points.csv")), Some(Format::Csv));
		assert_eq!(Format::detect(Path::new("points.pcd")), None);
		assert_eq!(Format::detect(Path::new("noextension")), None);
	}
}
