//! `Get` and the diff half of `GetCompress` (spec §4.1): resolves
//! `(project, from?, to?, queries)` into an ordered stream of live
//! objects or changes, with pack-aware suppression of individually
//! addressable member paths once a pack has been materialized for their
//! root (spec §8 scenario 4, §9 "packs vs. loose objects").

use std::collections::BTreeMap;

use dl_db::model::ObjectRow;
use dl_db::queries;
use dl_util::error::Error;

use crate::pattern::PackPatterns;
use crate::types::{matches_any, Object, ObjectQuery};
use crate::Store;

impl Store {
	/// Resolve `to` against the project's current `latest_version` when
	/// absent, the way every read operation in §4.1 does.
	pub async fn resolve_to_version(&self, project: i64, to: Option<i64>) -> Result<i64, Error> {
		match to {
			Some(v) => Ok(v),
			None => {
				let row = queries::get_project(&self.db.pool, project)
					.await?
					.ok_or_else(|| Error::NotFound(format!("project {}", project)))?;
				Ok(row.latest_version)
			}
		}
	}

	/// `Get`: every live object at `to` matching some query and no
	/// ignore, or — when `from` is given — the diff between `from` and
	/// `to` including tombstones for paths removed in that range.
	pub async fn get(
		&self,
		project: i64,
		from: Option<i64>,
		to: Option<i64>,
		queries_in: &[ObjectQuery],
	) -> Result<(i64, Vec<Object>), Error> {
		let to_version = self.resolve_to_version(project, to).await?;
		let project_row = queries::get_project(&self.db.pool, project)
			.await?
			.ok_or_else(|| Error::NotFound(format!("project {}", project)))?;
		let patterns = PackPatterns::compile(&project_row.pack_patterns)?;

		let rows = match from {
			None => self.rows_live_at(project, to_version, queries_in).await?,
			Some(from_version) => {
				self.rows_diff(project, from_version, to_version, queries_in).await?
			}
		};

		let suppressed = suppress_packed_members(rows, &patterns);
		let mut objects = Vec::with_capacity(suppressed.len());
		for row in suppressed {
			let with_content = queries_in
				.iter()
				.find(|q| q.matches(&row.path))
				.map(|q| q.with_content)
				.unwrap_or(false);
			objects.push(self.row_to_object(row, with_content).await?);
		}
		objects.sort_by(|a, b| a.path.cmp(&b.path));
		Ok((to_version, objects))
	}

	async fn rows_live_at(
		&self,
		project: i64,
		version: i64,
		queries_in: &[ObjectQuery],
	) -> Result<Vec<ObjectRow>, Error> {
		let mut seen = BTreeMap::new();
		for q in queries_in {
			let rows = queries::live_objects_at(&self.db.pool, project, version, &q.prefix).await?;
			for row in rows {
				if matches_any(queries_in, &row.path) {
					seen.insert(row.path.clone(), row);
				}
			}
		}
		Ok(seen.into_values().collect())
	}

	async fn rows_diff(
		&self,
		project: i64,
		from: i64,
		to: i64,
		queries_in: &[ObjectQuery],
	) -> Result<Vec<ObjectRow>, Error> {
		let mut changed = BTreeMap::new();
		let mut tombstoned = BTreeMap::new();

		for q in queries_in {
			let rows = queries::objects_started_in_range(&self.db.pool, project, from, to, &q.prefix)
				.await?;
			for row in rows {
				if matches_any(queries_in, &row.path) {
					changed.insert(row.path.clone(), row);
				}
			}
			let paths =
				queries::tombstoned_paths_in_range(&self.db.pool, project, from, to, &q.prefix).await?;
			for path in paths {
				if matches_any(queries_in, &path) && !changed.contains_key(&path) {
					tombstoned.insert(path.clone(), tombstone_row(project, path, to));
				}
			}
		}

		let mut rows: Vec<ObjectRow> = changed.into_values().collect();
		rows.extend(tombstoned.into_values());
		Ok(rows)
	}

	async fn row_to_object(&self, row: ObjectRow, with_content: bool) -> Result<Object, Error> {
		let content = if with_content && !row.deleted {
			match &row.hash {
				Some(hash) => {
					let content_row = queries::get_content(&self.db.pool, hash)
						.await?
						.ok_or_else(|| Error::CorruptData(row.path.clone()))?;
					Some(content_row.bytes)
				}
				None => None,
			}
		} else {
			None
		};

		Ok(Object {
			path: row.path,
			mode: row.mode as u32,
			size: row.size,
			deleted: row.deleted,
			content,
			pack_path: row.pack_path,
		})
	}
}

fn tombstone_row(project: i64, path: String, at: i64) -> ObjectRow {
	ObjectRow {
		id: 0,
		project,
		path,
		start_version: at,
		stop_version: Some(at),
		mode: 0,
		size: 0,
		deleted: true,
		hash: None,
		packed: false,
		pack_path: None,
	}
}

/// Drop any row whose path falls strictly inside a pack root that has a
/// live aggregate row (`packed = true`) in this same result set — the
/// aggregate row represents the whole subtree, so its individually
/// addressable members must not also appear (spec §8 scenario 4).
/// Patterns alone are not enough here: invariant 4 says membership is
/// fixed at the version a pack was written, so suppression must be
/// driven by which aggregate rows are actually present, not by
/// re-evaluating current patterns against historical data.
fn suppress_packed_members(rows: Vec<ObjectRow>, _patterns: &PackPatterns) -> Vec<ObjectRow> {
	let roots: Vec<&str> = rows
		.iter()
		.filter(|r| r.packed)
		.filter_map(|r| r.pack_path.as_deref())
		.collect();
	if roots.is_empty() {
		return rows;
	}
	rows.into_iter()
		.filter(|r| {
			!roots
				.iter()
				.any(|root| r.path.starts_with(root) && r.path != *root)
		})
		.collect()
}
