use crate::model::header::PointHeader;
use crate::model::State;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BoundingBox {
	pub min: [f64; 3],
	pub max: [f64; 3],
}

/// Summary row describing a finished tile store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
	pub bounding_box: BoundingBox,
	pub min_level: u32,
	pub max_level: u32,
	pub srs: String,
	pub min_points: u64,
	pub max_points: u64,
	pub point_type: u8,
	pub name: String,
	pub max_color: u16,
}

impl Manifest {
	pub fn create<N>(
		header: &PointHeader<N>,
		state: &State,
		min_points: u64,
		max_points: u64,
	) -> Manifest {
		let min = &header.bounds.min;
		let max = &header.bounds.max;
		Manifest {
			bounding_box: BoundingBox {
				min: min.to_array(),
				max: max.to_array(),
			},
			min_level: 0,
			max_level: state.max_level,
			srs: header.srs.to_string(),
			min_points,
			max_points,
			point_type: header.point_format,
			name: header.name.clone().unwrap_or_default(),
			max_color: state.max_color,
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::model::bounds::Bounds;
	use crate::model::header::PointHeader;
	use crate::model::manifest::Manifest;
	use crate::model::vector3::Vector3;
	use crate::model::State;

	#[test]
	fn it_serializes() -> Result<(), Box<dyn std::error::Error>> {
		let header = PointHeader {
			point_count: 10,
			bounds: Bounds::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)),
			scale: Vector3::splat(0.01),
			offset: Vector3::empty(),
			srs: "EPSG:2193".to_string(),
			point_format: 2,
			has_color: true,
			name: Some("harbour".to_string()),
			native: (),
		};
		let state = State {
			points_total: 10,
			tiles_total: 3,
			max_level: 2,
			max_color: 65535,
		};
		let manifest = Manifest::create(&header, &state, 1000, 1500);

		let json = serde_json::to_value(&manifest)?;
		assert_eq!(json["boundingBox"]["max"][2], 6.0);
		assert_eq!(json["maxLevel"], 2);
		assert_eq!(json["pointType"], 2);
		assert_eq!(json["maxColor"], 65535);
		assert_eq!(json["name"], "harbour");

		let back: Manifest = serde_json::from_value(json)?;
		assert_eq!(back, manifest);
		Ok(())
	}
}
