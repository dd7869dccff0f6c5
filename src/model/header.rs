use std::path::Path;

use crate::error::{Error, Result};
use crate::model::bounds::Bounds;
use crate::model::vector3::Vector3;

/// Header metadata of a point file, or of several merged into one logical
/// stream.
///
/// `native` carries whatever the codec needs to write a file of the same
/// layout (the full LAS header for LAS input, nothing for the simple formats).
#[derive(Clone, Debug)]
pub struct PointHeader<N = ()> {
	pub point_count: u64,
	pub bounds: Bounds,
	pub scale: Vector3,
	pub offset: Vector3,
	pub srs: String,
	pub point_format: u8,
	pub has_color: bool,
	pub name: Option<String>,
	pub native: N,
}

impl<N> PointHeader<N> {
	/// Fold `other` (read from `path`) into this header.
	///
	/// The spatial reference, offset, scale, point format and color flag must
	/// all match;
	/// bounds are unioned and point counts added.
	pub fn merge(&mut self, other: &PointHeader<N>, path: &Path) -> Result<()> {
		if self.srs != other.srs {
			return Err(Error::consistency(
				path,
				"projection doesn't match for all input files",
			));
		}
		if self.offset != other.offset {
			return Err(Error::consistency(
				path,
				"offset doesn't match for all input files",
			));
		}
		if self.scale != other.scale {
			return Err(Error::consistency(
				path,
				"scale doesn't match for all input files",
			));
		}
		if self.point_format != other.point_format {
			return Err(Error::consistency(
				path,
				format!(
					"point format {} doesn't match {}",
					other.point_format, self.point_format
				),
			));
		}
		if self.has_color != other.has_color {
			return Err(Error::consistency(
				path,
				"color channels don't match for all input files",
			));
		}

		self.bounds = self.bounds.union(&other.bounds);
		self.point_count += other.point_count;
		Ok(())
	}
}
