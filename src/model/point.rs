use crate::model::vector3::Vector3;

/// A point as produced by the formats that carry nothing beyond position and
/// color.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
	pub position: Vector3,
	/// red, green, blue and near infrared, when the format has color.
	pub color: Option<[u16; 4]>,
}

impl Point {
	pub fn new(x: f64, y: f64, z: f64) -> Point {
		Point {
			position: Vector3::new(x, y, z),
			color: None,
		}
	}

	pub fn with_color(mut self, color: [u16; 4]) -> Point {
		self.color = Some(color);
		self
	}
}
