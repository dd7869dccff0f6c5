use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::tile::TileIdent;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad class of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	/// Input files disagree on spatial reference, scale, offset or format.
	Consistency,
	/// Reading or writing a point file or the tile store failed.
	Io,
	/// The tile store tables could not be created.
	Schema,
	/// Options are unusable.
	Config,
}

#[derive(Error, Debug)]
pub enum Error {
	#[error("{}: {}", .path.display(), .reason)]
	Consistency { path: PathBuf, reason: String },

	#[error("{}: {}", .path.display(), .source)]
	Io { path: PathBuf, source: io::Error },

	#[error("{}: {}", .path.display(), .source)]
	Las { path: PathBuf, source: las::Error },

	#[error("{}: {}", .path.display(), .source)]
	Csv { path: PathBuf, source: csv::Error },

	/// Point data that is malformed or shorter than its header says.
	#[error("{}: {}", .path.display(), .reason)]
	Format { path: PathBuf, reason: String },

	#[error("unable to create tile store tables: {0}")]
	Schema(#[source] rusqlite::Error),

	#[error("tile store: {0}")]
	Store(#[from] rusqlite::Error),

	#[error("{}: {}", .path.display(), .source)]
	Json { path: PathBuf, source: serde_json::Error },

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to write tile {ident}: {source}")]
	Tile { ident: TileIdent, source: Box<Error> },
}

impl Error {
	pub fn io(path: &Path, source: io::Error) -> Error {
		Error::Io {
			path: path.to_path_buf(),
			source,
		}
	}

	pub fn las(path: &Path, source: las::Error) -> Error {
		Error::Las {
			path: path.to_path_buf(),
			source,
		}
	}

	pub fn csv(path: &Path, source: csv::Error) -> Error {
		Error::Csv {
			path: path.to_path_buf(),
			source,
		}
	}

	pub fn format(path: &Path, reason: impl Into<String>) -> Error {
		Error::Format {
			path: path.to_path_buf(),
			reason: reason.into(),
		}
	}

	pub fn consistency(path: &Path, reason: impl Into<String>) -> Error {
		Error::Consistency {
			path: path.to_path_buf(),
			reason: reason.into(),
		}
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Consistency { .. } => ErrorKind::Consistency,
			Error::Io { .. }
			| Error::Las { .. }
			| Error::Csv { .. }
			| Error::Format { .. }
			| Error::Store(_) => ErrorKind::Io,
			Error::Schema(_) => ErrorKind::Schema,
			Error::Json { .. } | Error::Config(_) => ErrorKind::Config,
			Error::Tile { source, .. } => source.kind(),
		}
	}

	/// Attach the tile being written. Only the innermost tile is kept.
	pub fn in_tile(self, ident: TileIdent) -> Error {
		match self {
			Error::Tile { .. } => self,
			other => Error::Tile {
				ident,
				source: Box::new(other),
			},
		}
	}
}
