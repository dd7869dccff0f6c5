//! Helpers shared by the unit tests.

use std::path::Path;

use rand::Rng;

use crate::codec::{PointCodec, PointWriter, RawCodec, Sink};
use crate::error::Result;
use crate::model::bounds::Bounds;
use crate::model::header::PointHeader;
use crate::model::point::Point;
use crate::model::vector3::Vector3;

/// Header with a power of two scale so test coordinates survive quantisation
/// exactly.
pub fn header() -> PointHeader {
	PointHeader {
		point_count: 0,
		bounds: Bounds::new(Vector3::empty(), Vector3::splat(100.0)),
		scale: Vector3::splat(1.0 / 1024.0),
		offset: Vector3::empty(),
		srs: "EPSG:32633".to_string(),
		point_format: 0,
		has_color: false,
		name: None,
		native: (),
	}
}

pub fn random_points<R: Rng>(rng: &mut R, count: usize) -> Vec<Point> {
	(0..count)
		.map(|_| {
			Point::new(
				rng.gen_range(0.0..100.0),
				rng.gen_range(0.0..100.0),
				rng.gen_range(0.0..10.0),
			)
			.with_color([
				rng.gen_range(0..256),
				rng.gen_range(0..256),
				rng.gen_range(0..256),
				0,
			])
		})
		.collect()
}

/// Write `points` as a raw point file and return how many were written.
pub fn write_raw(path: &Path, header: &PointHeader, points: &[Point]) -> Result<u64> {
	let mut writer = RawCodec.create(Sink::File(path.to_path_buf()), header)?;
	for point in points {
		writer.write_point(point)?;
	}
	let written = writer.points_written();
	writer.close()?;
	Ok(written)
}
