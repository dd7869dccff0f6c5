use byteorder::{LittleEndian, ReadBytesExt};
use las::{Read as _, Write as _};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::codec::{Output, PointCodec, PointReader, PointRecord, PointWriter, Sink};
use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::header::PointHeader;
use crate::model::vector3::Vector3;

const PROJECTION_USER_ID: &str = "LASF_Projection";
const WKT_RECORD_ID: u16 = 2112;
const GEO_KEY_DIRECTORY_RECORD_ID: u16 = 34735;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

impl PointRecord for las::Point {
	fn position(&self) -> Vector3 {
		Vector3::new(self.x, self.y, self.z)
	}

	fn color(&self) -> Option<[u16; 4]> {
		self.color
			.map(|c| [c.red, c.green, c.blue, self.nir.unwrap_or(0)])
	}
}

/// LAS and LAZ files. Points are passed through as full `las::Point` records
/// and every file written reuses the header of the input.
#[derive(Clone, Copy, Debug, Default)]
pub struct LasCodec;

impl PointCodec for LasCodec {
	type Point = las::Point;
	type Native = las::Header;
	type Reader = LasReader;
	type Writer = LasWriter;

	fn extension(&self) -> &'static str {
		"las"
	}

	fn open(&self, path: &Path) -> Result<LasReader> {
		let reader = las::Reader::from_path(path).map_err(|e| Error::las(path, e))?;
		let header = point_header(reader.header(), path)?;
		Ok(LasReader {
			reader,
			header,
			name: path.to_path_buf(),
		})
	}

	fn create(&self, sink: Sink, header: &PointHeader<las::Header>) -> Result<LasWriter> {
		let name = sink.name();
		let out = Output::create(&sink)?;
		let writer = las::Writer::new(out, header.native.clone()).map_err(|e| Error::las(&name, e))?;
		Ok(LasWriter {
			writer,
			name,
			count: 0,
		})
	}
}

pub struct LasReader {
	reader: las::Reader<'static>,
	header: PointHeader<las::Header>,
	name: PathBuf,
}

impl PointReader for LasReader {
	type Point = las::Point;
	type Native = las::Header;

	fn header(&self) -> &PointHeader<las::Header> {
		&self.header
	}

	fn read_point(&mut self) -> Result<Option<las::Point>> {
		self.reader
			.read()
			.transpose()
			.map_err(|e| Error::las(&self.name, e))
	}
}

pub struct LasWriter {
	writer: las::Writer<Output>,
	name: PathBuf,
	count: u64,
}

impl PointWriter for LasWriter {
	type Point = las::Point;

	fn write_point(&mut self, point: &las::Point) -> Result<()> {
		self.writer
			.write(point.clone())
			.map_err(|e| Error::las(&self.name, e))?;
		self.count += 1;
		Ok(())
	}

	fn points_written(&self) -> u64 {
		self.count
	}

	fn close(self) -> Result<Option<Vec<u8>>> {
		let name = self.name;
		let out = self.writer.into_inner().map_err(|e| Error::las(&name, e))?;
		out.finish()
	}
}

fn point_header(header: &las::Header, path: &Path) -> Result<PointHeader<las::Header>> {
	let bounds = header.bounds();
	let transforms = header.transforms();
	let format = header.point_format();
	let point_format = format.to_u8().map_err(|e| Error::las(path, e))?;
	let name = header.system_identifier().trim_end_matches('\0').trim();

	Ok(PointHeader {
		point_count: header.number_of_points(),
		bounds: Bounds::new(
			Vector3::new(bounds.min.x, bounds.min.y, bounds.min.z),
			Vector3::new(bounds.max.x, bounds.max.y, bounds.max.z),
		),
		scale: Vector3::new(transforms.x.scale, transforms.y.scale, transforms.z.scale),
		offset: Vector3::new(transforms.x.offset, transforms.y.offset, transforms.z.offset),
		srs: spatial_reference(header),
		point_format,
		has_color: format.has_color,
		name: if name.is_empty() {
			None
		} else {
			Some(name.to_string())
		},
		native: header.clone(),
	})
}

/// The OGC WKT record when there is one, else `EPSG:<code>` from the GeoTIFF
/// key directory, else empty.
fn spatial_reference(header: &las::Header) -> String {
	let projection = |record_id: u16| {
		header
			.vlrs()
			.iter()
			.chain(header.evlrs().iter())
			.find(|vlr| {
				vlr.user_id.trim_end_matches('\0') == PROJECTION_USER_ID
					&& vlr.record_id == record_id
			})
	};

	if let Some(wkt) = projection(WKT_RECORD_ID) {
		return String::from_utf8_lossy(&wkt.data)
			.trim_end_matches('\0')
			.trim()
			.to_string();
	}
	projection(GEO_KEY_DIRECTORY_RECORD_ID)
		.and_then(|keys| geo_key_epsg(&keys.data))
		.map(|code| format!("EPSG:{}", code))
		.unwrap_or_default()
}

/// EPSG code from a GeoKeyDirectoryTag, projected system first.
fn geo_key_epsg(data: &[u8]) -> Option<u16> {
	let mut cursor = Cursor::new(data);
	let mut directory = [0u16; 4];
	cursor.read_u16_into::<LittleEndian>(&mut directory).ok()?;
	let key_count = directory[3];

	let mut projected = None;
	let mut geographic = None;
	for _ in 0..key_count {
		let mut entry = [0u16; 4];
		cursor.read_u16_into::<LittleEndian>(&mut entry).ok()?;
		let [key_id, location, _count, value] = entry;
		// location 0 means the value is stored inline
		if location != 0 || value == 0 || value == USER_DEFINED {
			continue;
		}
		match key_id {
			PROJECTED_CS_TYPE_GEO_KEY => projected = Some(value),
			GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(value),
			_ => {}
		}
	}
	projected.or(geographic)
}

#[cfg(test)]
mod tests {
	use super::{geo_key_epsg, LasCodec};
	use crate::codec::{PointCodec, PointReader, PointRecord, PointWriter, Sink};
	use byteorder::{LittleEndian, WriteBytesExt};
	use las::Read as _;
	use las::Write as _;
	use std::io::Cursor;

	fn geo_keys(entries: &[[u16; 4]]) -> Vec<u8> {
		let mut data = Vec::new();
		for value in [1, 1, 0, entries.len() as u16] {
			data.write_u16::<LittleEndian>(value).unwrap();
		}
		for entry in entries {
			for value in entry {
				data.write_u16::<LittleEndian>(*value).unwrap();
			}
		}
		data
	}

	#[test]
	fn projected_code_wins() {
		let data = geo_keys(&[[1024, 0, 1, 1], [2048, 0, 1, 4326], [3072, 0, 1, 32610]]);
		assert_eq!(geo_key_epsg(&data), Some(32610));
	}

	#[test]
	fn geographic_code_and_user_defined() {
		let data = geo_keys(&[[2048, 0, 1, 4269], [3072, 0, 1, 32767]]);
		assert_eq!(geo_key_epsg(&data), Some(4269));
		assert_eq!(geo_key_epsg(&geo_keys(&[[3072, 34736, 1, 0]])), None);
		assert_eq!(geo_key_epsg(&[1, 0]), None);
	}

	#[test]
	fn reads_header_and_writes_tile_blob() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("input.las");

		let mut builder = las::Builder::from((1, 2));
		builder.point_format = las::point::Format::new(2)?;
		builder.transforms = las::Vector {
			x: las::Transform { scale: 0.01, offset: 0.0 },
			y: las::Transform { scale: 0.01, offset: 0.0 },
			z: las::Transform { scale: 0.01, offset: 0.0 },
		};
		builder.system_identifier = "quadsort test".to_string();
		builder.vlrs.push(las::Vlr {
			user_id: "LASF_Projection".to_string(),
			record_id: 2112,
			description: "OGC WKT".to_string(),
			data: b"PROJCS[\"test\"]\0".to_vec(),
		});
		let mut writer = las::Writer::from_path(&path, builder.into_header()?)?;
		for i in 0..5 {
			writer.write(las::Point {
				x: i as f64,
				y: 2.0 * i as f64,
				z: 1.0,
				color: Some(las::Color {
					red: 100 * i,
					green: 0,
					blue: 7,
				}),
				..Default::default()
			})?;
		}
		writer.close()?;

		let mut reader = LasCodec.open(&path)?;
		let header = reader.header().clone();
		assert_eq!(header.point_count, 5);
		assert_eq!(header.point_format, 2);
		assert!(header.has_color);
		assert_eq!(header.srs, "PROJCS[\"test\"]");
		assert_eq!(header.name.as_deref(), Some("quadsort test"));
		assert_eq!(header.scale.x, 0.01);
		assert_eq!(header.bounds.max.y, 8.0);

		let mut tile = LasCodec.create(Sink::Memory, &header)?;
		while let Some(point) = reader.read_point()? {
			if point.position().x >= 2.0 {
				tile.write_point(&point)?;
			}
		}
		assert_eq!(tile.points_written(), 3);
		let blob = tile.close()?.expect("memory sink returns bytes");

		let mut blob_reader = las::Reader::new(Cursor::new(blob))?;
		assert_eq!(blob_reader.header().number_of_points(), 3);
		let first = blob_reader.read().expect("one point")?;
		assert_eq!(first.color(), Some([200, 0, 7, 0]));
		Ok(())
	}
}
