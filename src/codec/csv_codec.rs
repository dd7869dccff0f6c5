use csv::{DeserializeRecordsIntoIter, Reader, WriterBuilder};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::codec::{Output, PointCodec, PointReader, PointWriter, Sink};
use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::header::PointHeader;
use crate::model::point::Point;
use crate::model::vector3::Vector3;

const POSITION_COLUMNS: [&str; 3] = ["x", "y", "z"];
const COLOR_COLUMNS: [&str; 7] = ["x", "y", "z", "red", "green", "blue", "nir"];

#[derive(Debug, Deserialize)]
struct CsvRow {
	x: f64,
	y: f64,
	z: f64,
	#[serde(default)]
	red: Option<u16>,
	#[serde(default)]
	green: Option<u16>,
	#[serde(default)]
	blue: Option<u16>,
	#[serde(default)]
	nir: Option<u16>,
}

impl CsvRow {
	fn into_point(self, has_color: bool) -> Point {
		let point = Point::new(self.x, self.y, self.z);
		if has_color {
			point.with_color([
				self.red.unwrap_or(0),
				self.green.unwrap_or(0),
				self.blue.unwrap_or(0),
				self.nir.unwrap_or(0),
			])
		} else {
			point
		}
	}
}

/// Comma separated `x,y,z` with optional `red,green,blue,nir` columns.
///
/// A CSV file has no header block, so opening one scans it once for the
/// point count and bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvCodec;

impl PointCodec for CsvCodec {
	type Point = Point;
	type Native = ();
	type Reader = CsvReader;
	type Writer = CsvWriter;

	fn extension(&self) -> &'static str {
		"csv"
	}

	fn open(&self, path: &Path) -> Result<CsvReader> {
		let header = scan(path)?;
		let rows = Reader::from_path(path)
			.map_err(|e| Error::csv(path, e))?
			.into_deserialize();
		Ok(CsvReader {
			header,
			name: path.to_path_buf(),
			rows,
		})
	}

	fn create(&self, sink: Sink, header: &PointHeader) -> Result<CsvWriter> {
		let name = sink.name();
		let out = Output::create(&sink)?;
		let mut inner = WriterBuilder::new().has_headers(false).from_writer(out);
		let columns: &[&str] = if header.has_color {
			&COLOR_COLUMNS
		} else {
			&POSITION_COLUMNS
		};
		inner
			.write_record(columns)
			.map_err(|e| Error::csv(&name, e))?;
		Ok(CsvWriter {
			inner,
			name,
			has_color: header.has_color,
			count: 0,
		})
	}
}

fn scan(path: &Path) -> Result<PointHeader> {
	let mut rdr = Reader::from_path(path).map_err(|e| Error::csv(path, e))?;
	let has_color = rdr
		.headers()
		.map_err(|e| Error::csv(path, e))?
		.iter()
		.any(|column| column == "red");

	let mut bounds = Bounds::empty();
	let mut point_count = 0;
	for result in rdr.deserialize() {
		let row: CsvRow = result.map_err(|e| Error::csv(path, e))?;
		bounds.extend(&Vector3::new(row.x, row.y, row.z));
		point_count += 1;
	}
	if bounds.is_empty() {
		bounds = Bounds::new(Vector3::empty(), Vector3::empty());
	}

	Ok(PointHeader {
		point_count,
		bounds,
		scale: Vector3::splat(0.001),
		offset: Vector3::empty(),
		srs: String::new(),
		point_format: if has_color { 2 } else { 0 },
		has_color,
		name: None,
		native: (),
	})
}

pub struct CsvReader {
	header: PointHeader,
	name: PathBuf,
	rows: DeserializeRecordsIntoIter<File, CsvRow>,
}

impl PointReader for CsvReader {
	type Point = Point;
	type Native = ();

	fn header(&self) -> &PointHeader {
		&self.header
	}

	fn read_point(&mut self) -> Result<Option<Point>> {
		match self.rows.next() {
			None => Ok(None),
			Some(row) => {
				let row = row.map_err(|e| Error::csv(&self.name, e))?;
				Ok(Some(row.into_point(self.header.has_color)))
			}
		}
	}
}

pub struct CsvWriter {
	inner: csv::Writer<Output>,
	name: PathBuf,
	has_color: bool,
	count: u64,
}

impl PointWriter for CsvWriter {
	type Point = Point;

	fn write_point(&mut self, point: &Point) -> Result<()> {
		let Vector3 { x, y, z } = point.position;
		let result = match (self.has_color, point.color) {
			(true, Some([red, green, blue, nir])) => {
				self.inner.serialize((x, y, z, red, green, blue, nir))
			}
			(true, None) => self.inner.serialize((x, y, z, 0, 0, 0, 0)),
			(false, _) => self.inner.serialize((x, y, z)),
		};
		result.map_err(|e| Error::csv(&self.name, e))?;
		self.count += 1;
		Ok(())
	}

	fn points_written(&self) -> u64 {
		self.count
	}

	fn close(self) -> Result<Option<Vec<u8>>> {
		let name = self.name;
		let out = self
			.inner
			.into_inner()
			.map_err(|e| Error::io(&name, e.into_error()))?;
		out.finish()
	}
}
