use std::fmt;

use crate::model::bounds::{Bounds, Rect};

/// Deepest level a tile may sit at. The key of the last tile at this level
/// still fits in a signed 64 bit SQLite INTEGER.
pub const MAX_LEVEL: u32 = 31;

/// One node of the quadtree. Level 0 is the single root tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIdent {
	pub level: u32,
	pub x: u32,
	pub y: u32,
}

impl TileIdent {
	pub const ROOT: TileIdent = TileIdent { level: 0, x: 0, y: 0 };

	pub fn new(level: u32, x: u32, y: u32) -> TileIdent {
		TileIdent { level, x, y }
	}

	pub fn key(&self) -> u64 {
		tile_key(self.level, self.x, self.y)
	}

	/// The child covering the (dx, dy) half of this tile, dx and dy in {0, 1}.
	pub fn child(&self, dx: u32, dy: u32) -> TileIdent {
		TileIdent {
			level: self.level + 1,
			x: 2 * self.x + dx,
			y: 2 * self.y + dy,
		}
	}

	/// Footprint of this tile when the root covers `root`.
	///
	/// Computed straight from the root extent rather than by halving the
	/// parent, so every tile at a level shares the same span.
	pub fn rect(&self, root: &Bounds) -> Rect {
		let full = Rect::from_bounds(root);
		let tiles = (1u64 << self.level) as f64;
		let span_x = (full.max_x - full.min_x) / tiles;
		let span_y = (full.max_y - full.min_y) / tiles;
		Rect {
			min_x: full.min_x + span_x * self.x as f64,
			min_y: full.min_y + span_y * self.y as f64,
			max_x: full.min_x + span_x * (self.x as f64 + 1.0),
			max_y: full.min_y + span_y * (self.y as f64 + 1.0),
		}
	}
}

impl fmt::Display for TileIdent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: ({},{})", self.level, self.x, self.y)
	}
}

/// Storage key of a tile: all tiles of the levels above, then row major
/// within the level.
pub fn tile_key(level: u32, x: u32, y: u32) -> u64 {
	let mut key: u64 = 0;
	for i in 0..level {
		key += 1u64 << (2 * i);
	}
	key + (y as u64) * (1u64 << level) + x as u64
}

#[cfg(test)]
mod tests {
	use super::{tile_key, TileIdent, MAX_LEVEL};
	use crate::model::bounds::Bounds;
	use crate::model::vector3::Vector3;
	use std::collections::HashSet;

	#[test]
	fn root_key_is_zero() {
		assert_eq!(tile_key(0, 0, 0), 0);
		assert_eq!(TileIdent::ROOT.key(), 0);
	}

	#[test]
	fn first_keys_of_each_level() {
		assert_eq!(tile_key(1, 0, 0), 1);
		assert_eq!(tile_key(1, 1, 0), 2);
		assert_eq!(tile_key(1, 0, 1), 3);
		assert_eq!(tile_key(1, 1, 1), 4);
		assert_eq!(tile_key(2, 0, 0), 5);
		assert_eq!(tile_key(2, 3, 3), 20);
		assert_eq!(tile_key(3, 0, 0), 21);
	}

	#[test]
	fn keys_are_unique_and_dense() {
		let mut seen = HashSet::new();
		for level in 0..6 {
			for y in 0..(1 << level) {
				for x in 0..(1 << level) {
					assert!(seen.insert(tile_key(level, x, y)));
				}
			}
		}
		let count = seen.len() as u64;
		assert!((0..count).all(|key| seen.contains(&key)));
	}

	#[test]
	fn deepest_key_fits_in_sqlite_integer() {
		let last = (1u32 << MAX_LEVEL) - 1;
		assert!(tile_key(MAX_LEVEL, last, last) <= i64::MAX as u64);
	}

	#[test]
	fn children_quarter_the_parent() {
		let root = Bounds::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(8.0, 4.0, 1.0));
		let parent = TileIdent::new(1, 1, 0);
		let parent_rect = parent.rect(&root);
		assert_eq!(parent_rect.min_x, 4.0);
		assert_eq!(parent_rect.max_y, 2.0);

		let child = parent.child(1, 1);
		assert_eq!(child, TileIdent::new(2, 3, 1));
		let rect = child.rect(&root);
		assert_eq!((rect.min_x, rect.max_x), (6.0, 8.0));
		assert_eq!((rect.min_y, rect.max_y), (1.0, 2.0));
	}

	#[test]
	fn displays_level_first() {
		assert_eq!(TileIdent::new(3, 1, 2).to_string(), "3: (1,2)");
	}
}
