use std::ops;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector3 {
	pub x: f64,
	pub y: f64,
	pub z: f64,
}

impl Vector3 {
	pub fn new(x: f64, y: f64, z: f64) -> Vector3 {
		Vector3 { x, y, z }
	}

	pub fn infinity() -> Vector3 {
		Vector3 {
			x: f64::INFINITY,
			y: f64::INFINITY,
			z: f64::INFINITY,
		}
	}

	pub fn empty() -> Vector3 {
		Vector3 {
			x: 0.0,
			y: 0.0,
			z: 0.0,
		}
	}

	pub fn splat(value: f64) -> Vector3 {
		Vector3 {
			x: value,
			y: value,
			z: value,
		}
	}

	pub fn from_array(values: [f64; 3]) -> Vector3 {
		Vector3 {
			x: values[0],
			y: values[1],
			z: values[2],
		}
	}

	pub fn to_array(&self) -> [f64; 3] {
		[self.x, self.y, self.z]
	}

	/// Component-wise minimum.
	pub fn min(&self, other: &Vector3) -> Vector3 {
		Vector3 {
			x: self.x.min(other.x),
			y: self.y.min(other.y),
			z: self.z.min(other.z),
		}
	}

	/// Component-wise maximum.
	pub fn max(&self, other: &Vector3) -> Vector3 {
		Vector3 {
			x: self.x.max(other.x),
			y: self.y.max(other.y),
			z: self.z.max(other.z),
		}
	}
}

impl ops::Mul<f64> for Vector3 {
	type Output = Vector3;

	fn mul(self, scalar: f64) -> Vector3 {
		Vector3 {
			x: self.x * scalar,
			y: self.y * scalar,
			z: self.z * scalar,
		}
	}
}

impl ops::Sub<&Vector3> for &Vector3 {
	type Output = Vector3;

	fn sub(self, rhs: &Vector3) -> Vector3 {
		Vector3 {
			x: self.x - rhs.x,
			y: self.y - rhs.y,
			z: self.z - rhs.z,
		}
	}
}
