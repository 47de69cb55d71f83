//! Row types mirroring the entities in spec.md §3. Kept intentionally
//! dumb (no behavior) — the algorithms that interpret them live in
//! `dl_store`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
	pub id: i64,
	pub latest_version: i64,
	pub pack_patterns: Vec<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ObjectRow {
	pub id: i64,
	pub project: i64,
	pub path: String,
	pub start_version: i64,
	/// `None` means "still open" (stop = infinity), i.e. the object is live
	/// as of every version >= start_version until a later row closes it.
	pub stop_version: Option<i64>,
	pub mode: i32,
	pub size: i64,
	pub deleted: bool,
	pub hash: Option<Vec<u8>>,
	pub packed: bool,
	pub pack_path: Option<String>,
}

impl ObjectRow {
	pub fn is_live_at(&self, version: i64) -> bool {
		self.start_version <= version
			&& self.stop_version.map(|stop| stop > version).unwrap_or(true)
	}
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentRow {
	pub hash: Vec<u8>,
	pub bytes: Vec<u8>,
	pub ref_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CacheVersionRow {
	pub id: i64,
	pub pack_hashes: Vec<Vec<u8>>,
}
