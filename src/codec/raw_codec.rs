use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::{Output, PointCodec, PointReader, PointWriter, Sink};
use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::header::PointHeader;
use crate::model::point::Point;
use crate::model::vector3::Vector3;

const MAGIC: &[u8; 4] = b"QSPT";
const VERSION: u8 = 1;
const FLAG_COLOR: u8 = 1;

// magic, version, flags, point format, reserved
const COUNT_OFFSET: u64 = 8;
// count, scale, offset
const BOUNDS_OFFSET: u64 = COUNT_OFFSET + 8 + 24 + 24;

/// Little endian points quantised to i32 against the header scale and offset,
/// optionally followed by four u16 color channels.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCodec;

impl PointCodec for RawCodec {
	type Point = Point;
	type Native = ();
	type Reader = RawReader<BufReader<File>>;
	type Writer = RawWriter;

	fn extension(&self) -> &'static str {
		"qsp"
	}

	fn open(&self, path: &Path) -> Result<Self::Reader> {
		let file = File::open(path).map_err(|e| Error::io(path, e))?;
		RawReader::new(BufReader::new(file), path)
	}

	fn create(&self, sink: Sink, header: &PointHeader) -> Result<RawWriter> {
		RawWriter::new(sink, header)
	}
}

pub struct RawReader<R> {
	inner: R,
	name: PathBuf,
	header: PointHeader,
	remaining: u64,
}

impl<R: Read> RawReader<R> {
	/// Reads the header; points are read on demand.
	pub fn new(mut inner: R, name: &Path) -> Result<RawReader<R>> {
		let header = read_header(&mut inner).map_err(|e| read_error(name, e))?;
		Ok(RawReader {
			inner,
			name: name.to_path_buf(),
			remaining: header.point_count,
			header,
		})
	}

	fn read_record(&mut self) -> io::Result<Point> {
		let scale = &self.header.scale;
		let offset = &self.header.offset;
		let x = self.inner.read_i32::<LittleEndian>()? as f64 * scale.x + offset.x;
		let y = self.inner.read_i32::<LittleEndian>()? as f64 * scale.y + offset.y;
		let z = self.inner.read_i32::<LittleEndian>()? as f64 * scale.z + offset.z;
		let mut point = Point::new(x, y, z);
		if self.header.has_color {
			let mut color = [0u16; 4];
			self.inner.read_u16_into::<LittleEndian>(&mut color)?;
			point.color = Some(color);
		}
		Ok(point)
	}
}

impl<R: Read> PointReader for RawReader<R> {
	type Point = Point;
	type Native = ();

	fn header(&self) -> &PointHeader {
		&self.header
	}

	fn read_point(&mut self) -> Result<Option<Point>> {
		if self.remaining == 0 {
			return Ok(None);
		}
		let point = self.read_record().map_err(|e| read_error(&self.name, e))?;
		self.remaining -= 1;
		Ok(Some(point))
	}
}

pub struct RawWriter {
	out: Output,
	name: PathBuf,
	has_color: bool,
	scale: Vector3,
	offset: Vector3,
	template_bounds: Bounds,
	bounds: Bounds,
	count: u64,
}

impl RawWriter {
	fn new(sink: Sink, header: &PointHeader) -> Result<RawWriter> {
		let name = sink.name();
		let scale = header.scale;
		if [scale.x, scale.y, scale.z]
			.iter()
			.any(|s| *s == 0.0 || !s.is_finite())
		{
			return Err(Error::format(&name, "scale must be finite and non-zero"));
		}

		let mut out = Output::create(&sink)?;
		write_header(&mut out, header).map_err(|e| Error::io(&name, e))?;
		Ok(RawWriter {
			out,
			name,
			has_color: header.has_color,
			scale,
			offset: header.offset,
			template_bounds: header.bounds,
			bounds: Bounds::empty(),
			count: 0,
		})
	}

	fn quantise(&self, value: f64, scale: f64, offset: f64) -> Result<i32> {
		let q = ((value - offset) / scale).round();
		if q < i32::MIN as f64 || q > i32::MAX as f64 || q.is_nan() {
			return Err(Error::format(
				&self.name,
				format!("coordinate {} does not fit the header scale and offset", value),
			));
		}
		Ok(q as i32)
	}

	fn patch_header(&mut self) -> io::Result<()> {
		let bounds = if self.count == 0 {
			self.template_bounds
		} else {
			self.bounds
		};
		self.out.seek(SeekFrom::Start(COUNT_OFFSET))?;
		self.out.write_u64::<LittleEndian>(self.count)?;
		self.out.seek(SeekFrom::Start(BOUNDS_OFFSET))?;
		write_vector(&mut self.out, &bounds.min)?;
		write_vector(&mut self.out, &bounds.max)?;
		self.out.seek(SeekFrom::End(0))?;
		Ok(())
	}
}

impl PointWriter for RawWriter {
	type Point = Point;

	fn write_point(&mut self, point: &Point) -> Result<()> {
		let p = &point.position;
		let x = self.quantise(p.x, self.scale.x, self.offset.x)?;
		let y = self.quantise(p.y, self.scale.y, self.offset.y)?;
		let z = self.quantise(p.z, self.scale.z, self.offset.z)?;

		let color = if self.has_color {
			Some(point.color.unwrap_or([0; 4]))
		} else {
			None
		};
		write_record(&mut self.out, [x, y, z], color).map_err(|e| Error::io(&self.name, e))?;

		// bounds of what a reader will get back, not of the input value
		self.bounds.extend(&Vector3::new(
			x as f64 * self.scale.x + self.offset.x,
			y as f64 * self.scale.y + self.offset.y,
			z as f64 * self.scale.z + self.offset.z,
		));
		self.count += 1;
		Ok(())
	}

	fn points_written(&self) -> u64 {
		self.count
	}

	fn close(mut self) -> Result<Option<Vec<u8>>> {
		self.patch_header().map_err(|e| Error::io(&self.name, e))?;
		self.out.finish()
	}
}

fn read_error(name: &Path, err: io::Error) -> Error {
	match err.kind() {
		io::ErrorKind::UnexpectedEof => {
			Error::format(name, "file ends before its advertised point count")
		}
		io::ErrorKind::InvalidData => Error::format(name, err.to_string()),
		_ => Error::io(name, err),
	}
}

fn write_record<W: Write>(w: &mut W, xyz: [i32; 3], color: Option<[u16; 4]>) -> io::Result<()> {
	for value in xyz {
		w.write_i32::<LittleEndian>(value)?;
	}
	if let Some(color) = color {
		for channel in color {
			w.write_u16::<LittleEndian>(channel)?;
		}
	}
	Ok(())
}

fn write_vector<W: Write>(w: &mut W, v: &Vector3) -> io::Result<()> {
	w.write_f64::<LittleEndian>(v.x)?;
	w.write_f64::<LittleEndian>(v.y)?;
	w.write_f64::<LittleEndian>(v.z)
}

fn read_vector<R: Read>(r: &mut R) -> io::Result<Vector3> {
	let mut values = [0f64; 3];
	r.read_f64_into::<LittleEndian>(&mut values)?;
	Ok(Vector3::from_array(values))
}

fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
	let len = u16::try_from(s.len())
		.map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "header string too long"))?;
	w.write_u16::<LittleEndian>(len)?;
	w.write_all(s.as_bytes())
}

fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
	let len = r.read_u16::<LittleEndian>()? as usize;
	let mut bytes = vec![0u8; len];
	r.read_exact(&mut bytes)?;
	String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_header<W: Write>(w: &mut W, header: &PointHeader) -> io::Result<()> {
	w.write_all(MAGIC)?;
	w.write_u8(VERSION)?;
	w.write_u8(if header.has_color { FLAG_COLOR } else { 0 })?;
	w.write_u8(header.point_format)?;
	w.write_u8(0)?;
	w.write_u64::<LittleEndian>(0)?;
	write_vector(w, &header.scale)?;
	write_vector(w, &header.offset)?;
	write_vector(w, &header.bounds.min)?;
	write_vector(w, &header.bounds.max)?;
	write_string(w, &header.srs)?;
	write_string(w, header.name.as_deref().unwrap_or(""))
}

fn read_header<R: Read>(r: &mut R) -> io::Result<PointHeader> {
	let mut magic = [0u8; 4];
	r.read_exact(&mut magic)?;
	if &magic != MAGIC {
		return Err(io::Error::new(
			io::ErrorKind::InvalidData,
			"not a raw point file",
		));
	}
	let version = r.read_u8()?;
	if version != VERSION {
		return Err(io::Error::new(
			io::ErrorKind::InvalidData,
			format!("unsupported raw point file version {}", version),
		));
	}
	let flags = r.read_u8()?;
	let point_format = r.read_u8()?;
	r.read_u8()?;
	let point_count = r.read_u64::<LittleEndian>()?;
	let scale = read_vector(r)?;
	let offset = read_vector(r)?;
	let min = read_vector(r)?;
	let max = read_vector(r)?;
	let srs = read_string(r)?;
	let name = read_string(r)?;

	Ok(PointHeader {
		point_count,
		bounds: Bounds::new(min, max),
		scale,
		offset,
		srs,
		point_format,
		has_color: flags & FLAG_COLOR != 0,
		name: if name.is_empty() { None } else { Some(name) },
		native: (),
	})
}
