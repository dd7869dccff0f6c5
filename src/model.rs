
pub mod bounds;
pub mod header;
pub mod manifest;
pub mod options;
pub mod point;
pub mod tile;
pub mod vector3;

/// Running totals gathered while the tree is walked.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct State {
	pub points_total: u64,
	pub tiles_total: u64,
	pub max_level: u32,
	pub max_color: u16,
}
