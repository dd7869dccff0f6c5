use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::tile::MAX_LEVEL;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
	/// Points kept in a tile that gets split.
	pub min_points: u64,
	/// Largest bucket written whole, without splitting.
	pub max_points: u64,
	/// Where the per-quadrant spill files go.
	pub tmp_dir: PathBuf,
	pub mode: StoreMode,
	/// Point stream written in index-only mode.
	pub stream: Option<PathBuf>,
	pub max_level: u32,
	pub seed: Option<u64>,
	pub name: Option<String>,
}

impl Default for Options {
	fn default() -> Options {
		Options {
			min_points: 1000,
			max_points: 1500,
			tmp_dir: std::env::temp_dir().join("lidar-quadsort"),
			mode: StoreMode::FullData,
			stream: None,
			max_level: MAX_LEVEL,
			seed: None,
			name: None,
		}
	}
}

impl Options {
	pub fn from_json(path: &Path) -> Result<Options> {
		let file = File::open(path).map_err(|e| Error::io(path, e))?;
		serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
			path: path.to_path_buf(),
			source,
		})
	}

	pub fn validate(&self) -> Result<()> {
		if self.min_points < 1 || self.max_points < 1 {
			return Err(Error::Config(
				"point limits must be at least 1".to_string(),
			));
		}
		if self.min_points > self.max_points {
			return Err(Error::Config(format!(
				"minimum point limit {} is above the maximum {}",
				self.min_points, self.max_points
			)));
		}
		if self.max_level > MAX_LEVEL {
			return Err(Error::Config(format!(
				"maximum level {} is deeper than {}",
				self.max_level, MAX_LEVEL
			)));
		}
		Ok(())
	}
}

/// What the store keeps per tile.
#[derive(Serialize, Deserialize, clap::ValueEnum)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StoreMode {
	/// A self-contained point blob per tile.
	FullData,
	/// A (start, count) range into one external point stream.
	IndexOnly,
}

#[cfg(test)]
mod tests {
	use super::{Options, StoreMode};
	use crate::error::ErrorKind;
	use std::io::Write;

	#[test]
	fn defaults_are_valid() {
		let options = Options::default();
		assert_eq!(options.min_points, 1000);
		assert_eq!(options.max_points, 1500);
		assert_eq!(options.mode, StoreMode::FullData);
		options.validate().unwrap();
	}

	#[test]
	fn rejects_inverted_limits() {
		let options = Options {
			min_points: 2000,
			..Options::default()
		};
		assert_eq!(options.validate().unwrap_err().kind(), ErrorKind::Config);
	}

	#[test]
	fn rejects_zero_limits() {
		let options = Options {
			min_points: 0,
			..Options::default()
		};
		assert_eq!(options.validate().unwrap_err().kind(), ErrorKind::Config);
	}

	#[test]
	fn reads_partial_json() -> Result<(), Box<dyn std::error::Error>> {
		let mut file = tempfile::NamedTempFile::new()?;
		write!(
			file,
			r#"{{ "minPoints": 10, "maxPoints": 20, "mode": "index-only", "seed": 4 }}"#
		)?;
		let options = Options::from_json(file.path())?;
		assert_eq!(options.min_points, 10);
		assert_eq!(options.max_points, 20);
		assert_eq!(options.mode, StoreMode::IndexOnly);
		assert_eq!(options.seed, Some(4));
		assert_eq!(options.max_level, Options::default().max_level);
		Ok(())
	}

	#[test]
	fn bad_json_is_a_config_error() -> Result<(), Box<dyn std::error::Error>> {
		let mut file = tempfile::NamedTempFile::new()?;
		write!(file, "{{ \"minPoints\": \"many\" }}")?;
		let err = Options::from_json(file.path()).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Config);
		Ok(())
	}
}
