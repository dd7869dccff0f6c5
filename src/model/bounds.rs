use crate::model::vector3::Vector3;

/// Axis aligned 3D box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vector3,
    pub max: Vector3,
}

impl Bounds {
    pub fn new(min: Vector3, max: Vector3) -> Bounds {
        Bounds { min, max }
    }

    /// A box containing nothing; extending it with a point yields that point.
    pub fn empty() -> Bounds {
        Bounds {
            min: Vector3::infinity(),
            max: Vector3::infinity() * -1.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn size(&self) -> Vector3 {
        &self.max - &self.min
    }

    pub fn extend(&mut self, point: &Vector3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(&other.min),
            max: self.max.max(&other.max),
        }
    }
}

/// The XY footprint of one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn from_bounds(bounds: &Bounds) -> Rect {
        Rect {
            min_x: bounds.min.x,
            min_y: bounds.min.y,
            max_x: bounds.max.x,
            max_y: bounds.max.y,
        }
    }

    /// Which half along x and y the point falls in, each clamped into {0, 1}.
    ///
    /// A point exactly on the midpoint goes to the upper half. Points slightly
    /// outside the rectangle (rounding in the quantised coordinates) land in the
    /// nearest edge quadrant. A zero-width axis sends everything to 0 or 1 but
    /// never outside.
    pub fn quadrant(&self, x: f64, y: f64) -> (u32, u32) {
        let half_x = (self.max_x - self.min_x) / 2.0;
        let half_y = (self.max_y - self.min_y) / 2.0;
        let which_x = ((x - self.min_x) / half_x) as i64;
        let which_y = ((y - self.min_y) / half_y) as i64;
        (which_x.clamp(0, 1) as u32, which_y.clamp(0, 1) as u32)
    }
}
