use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::manifest::{BoundingBox, Manifest};
use crate::model::options::StoreMode;
use crate::model::tile::{tile_key, TileIdent};

const MANIFEST_TABLE: &str = "CREATE TABLE manifest (
	minx REAL, miny REAL, minz REAL,
	maxx REAL, maxy REAL, maxz REAL,
	minlevel INTEGER, maxlevel INTEGER,
	srs TEXT,
	minpoints INTEGER, maxpoints INTEGER,
	pointtype INTEGER,
	name TEXT,
	maxcolor INTEGER
);";

const TILE_TABLE: &str = "CREATE TABLE lidartiles (
	data BLOB,
	level INTEGER, x INTEGER, y INTEGER,
	quadindex INTEGER PRIMARY KEY
);";

const ADDRESS_TABLE: &str = "CREATE TABLE tileaddress (
	start BIGINT, count INTEGER,
	level INTEGER, x INTEGER, y INTEGER,
	quadindex INTEGER PRIMARY KEY
);";

/// Range of the external point stream holding one tile, in points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileAddress {
	pub ident: TileIdent,
	pub start: u64,
	pub count: u64,
}

/// SQLite file holding the sorted tiles and one manifest row.
pub struct TileStore {
	conn: Connection,
	mode: StoreMode,
}

impl TileStore {
	/// Create a new store at `path`. Fails with a schema error if the file
	/// already holds a store.
	pub fn create(path: &Path, mode: StoreMode) -> Result<TileStore> {
		TileStore::new(Connection::open(path)?, mode)
	}

	pub fn new(conn: Connection, mode: StoreMode) -> Result<TileStore> {
		let tiles = match mode {
			StoreMode::FullData => TILE_TABLE,
			StoreMode::IndexOnly => ADDRESS_TABLE,
		};
		conn.execute_batch(&format!("{}\n{}", MANIFEST_TABLE, tiles))
			.map_err(Error::Schema)?;
		Ok(TileStore { conn, mode })
	}

	/// Open a finished store for reading.
	pub fn open(path: &Path) -> Result<TileStore> {
		let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
		let mode = {
			let mut stmt = conn.prepare(
				"SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('lidartiles', 'tileaddress')",
			)?;
			let names = stmt
				.query_map([], |row| row.get::<_, String>(0))?
				.collect::<rusqlite::Result<Vec<_>>>()?;
			match names.as_slice() {
				[name] if name == "lidartiles" => StoreMode::FullData,
				[name] if name == "tileaddress" => StoreMode::IndexOnly,
				_ => {
					return Err(Error::Config(format!(
						"{} is not a tile store",
						path.display()
					)))
				}
			}
		};
		Ok(TileStore { conn, mode })
	}

	pub fn mode(&self) -> StoreMode {
		self.mode
	}

	fn require(&self, mode: StoreMode) -> Result<()> {
		if self.mode == mode {
			Ok(())
		} else {
			Err(Error::Config(format!(
				"store keeps {:?} tiles, not {:?}",
				self.mode, mode
			)))
		}
	}

	/// Store the serialized points of one tile, replacing any earlier copy.
	pub fn add_tile(&mut self, data: &[u8], x: u32, y: u32, level: u32) -> Result<()> {
		self.require(StoreMode::FullData)?;
		let mut stmt = self.conn.prepare_cached(
			"INSERT OR REPLACE INTO lidartiles (data, level, x, y, quadindex) VALUES (?1, ?2, ?3, ?4, ?5)",
		)?;
		stmt.execute(params![data, level, x, y, tile_key(level, x, y) as i64])?;
		Ok(())
	}

	pub fn add_tile_offset(&mut self, start: u64, count: u64, x: u32, y: u32, level: u32) -> Result<()> {
		self.require(StoreMode::IndexOnly)?;
		let mut stmt = self.conn.prepare_cached(
			"INSERT OR REPLACE INTO tileaddress (start, count, level, x, y, quadindex) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
		)?;
		stmt.execute(params![
			start as i64,
			count as i64,
			level,
			x,
			y,
			tile_key(level, x, y) as i64
		])?;
		Ok(())
	}

	/// Write the manifest. The table only ever holds the latest one.
	pub fn set_header(&mut self, manifest: &Manifest) -> Result<()> {
		let min = &manifest.bounding_box.min;
		let max = &manifest.bounding_box.max;
		self.conn.execute("DELETE FROM manifest", [])?;
		self.conn.execute(
			"INSERT INTO manifest (minx, miny, minz, maxx, maxy, maxz, minlevel, maxlevel, srs, minpoints, maxpoints, pointtype, name, maxcolor)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
			params![
				min[0],
				min[1],
				min[2],
				max[0],
				max[1],
				max[2],
				manifest.min_level,
				manifest.max_level,
				manifest.srs,
				manifest.min_points as i64,
				manifest.max_points as i64,
				manifest.point_type,
				manifest.name,
				manifest.max_color
			],
		)?;
		Ok(())
	}

	/// Release the cached insert statements.
	pub fn flush(&mut self) -> Result<()> {
		self.conn.flush_prepared_statement_cache();
		Ok(())
	}

	pub fn manifest(&self) -> Result<Option<Manifest>> {
		let manifest = self
			.conn
			.query_row(
				"SELECT minx, miny, minz, maxx, maxy, maxz, minlevel, maxlevel, srs, minpoints, maxpoints, pointtype, name, maxcolor FROM manifest",
				[],
				|row| {
					Ok(Manifest {
						bounding_box: BoundingBox {
							min: [row.get(0)?, row.get(1)?, row.get(2)?],
							max: [row.get(3)?, row.get(4)?, row.get(5)?],
						},
						min_level: row.get(6)?,
						max_level: row.get(7)?,
						srs: row.get(8)?,
						min_points: row.get::<_, i64>(9)? as u64,
						max_points: row.get::<_, i64>(10)? as u64,
						point_type: row.get(11)?,
						name: row.get(12)?,
						max_color: row.get(13)?,
					})
				},
			)
			.optional()?;
		Ok(manifest)
	}

	/// Serialized points of a tile in a full-data store.
	pub fn tile(&self, ident: TileIdent) -> Result<Option<Vec<u8>>> {
		self.require(StoreMode::FullData)?;
		let data = self
			.conn
			.query_row(
				"SELECT data FROM lidartiles WHERE quadindex = ?1",
				[ident.key() as i64],
				|row| row.get(0),
			)
			.optional()?;
		Ok(data)
	}

	/// Every stored tile, in key order.
	pub fn tile_idents(&self) -> Result<Vec<TileIdent>> {
		let sql = match self.mode {
			StoreMode::FullData => "SELECT level, x, y FROM lidartiles ORDER BY quadindex",
			StoreMode::IndexOnly => "SELECT level, x, y FROM tileaddress ORDER BY quadindex",
		};
		let mut stmt = self.conn.prepare(sql)?;
		let idents = stmt
			.query_map([], |row| {
				Ok(TileIdent::new(row.get(0)?, row.get(1)?, row.get(2)?))
			})?
			.collect::<rusqlite::Result<Vec<_>>>()?;
		Ok(idents)
	}

	/// Stream ranges of an index-only store, in key order.
	pub fn tile_addresses(&self) -> Result<Vec<TileAddress>> {
		self.require(StoreMode::IndexOnly)?;
		let mut stmt = self
			.conn
			.prepare("SELECT level, x, y, start, count FROM tileaddress ORDER BY quadindex")?;
		let addresses = stmt
			.query_map([], |row| {
				Ok(TileAddress {
					ident: TileIdent::new(row.get(0)?, row.get(1)?, row.get(2)?),
					start: row.get::<_, i64>(3)? as u64,
					count: row.get::<_, i64>(4)? as u64,
				})
			})?
			.collect::<rusqlite::Result<Vec<_>>>()?;
		Ok(addresses)
	}
}
