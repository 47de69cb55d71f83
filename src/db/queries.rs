//! Every SQL statement in the workspace lives here. `dl_store` calls these
//! typed methods and never sees a query string, mirroring the separation
//! the teacher draws between `garage_model` (policy) and `garage_db`
//! (storage engine).

use sqlx::{postgres::Postgres, Executor, PgPool, Postgres as Pg, Row, Transaction};

use dl_util::error::{Error, ErrContext};

use crate::model::{CacheVersionRow, ContentRow, ObjectRow, ProjectRow};

/// Half-open interval helper: a `stop_version` of `None` means "open",
/// i.e. the row is live at every version >= `start_version` until some
/// later row closes it off. Postgres has no infinite bigint so `NULL`
/// plays that role throughout the schema.
pub const OPEN: Option<i64> = None;

// ---------------------------------------------------------------- projects

pub async fn create_project(
	pool: &PgPool,
	id: i64,
	pack_patterns: &[String],
) -> Result<(), Error> {
	sqlx::query("INSERT INTO projects (id, latest_version, pack_patterns) VALUES ($1, 0, $2)")
		.bind(id)
		.bind(pack_patterns)
		.execute(pool)
		.await
		.err_context("unable to create project")?;
	Ok(())
}

pub async fn get_project(pool: &PgPool, id: i64) -> Result<Option<ProjectRow>, Error> {
	sqlx::query_as::<_, ProjectRow>(
		"SELECT id, latest_version, pack_patterns FROM projects WHERE id = $1",
	)
	.bind(id)
	.fetch_optional(pool)
	.await
	.err_context("unable to load project")
}

pub async fn delete_project(pool: &PgPool, id: i64) -> Result<(), Error> {
	let mut tx = pool.begin().await.err_context("unable to start transaction")?;

	// Invariant 2: ref_count must only count *live* references. Decrement
	// every content this project's currently-live objects still hold,
	// once per referencing object (not once per distinct hash — two live
	// objects sharing one hash must release two references), before the
	// cascade delete removes the object rows that were counting them.
	sqlx::query(
		"UPDATE contents c SET ref_count = c.ref_count - t.cnt
		 FROM (
		     SELECT hash, COUNT(*) AS cnt FROM objects
		     WHERE project = $1 AND stop_version IS NULL AND hash IS NOT NULL
		     GROUP BY hash
		 ) t
		 WHERE c.hash = t.hash",
	)
	.bind(id)
	.execute(&mut *tx)
	.await
	.err_context("unable to release project's content references")?;

	sqlx::query("DELETE FROM projects WHERE id = $1")
		.bind(id)
		.execute(&mut *tx)
		.await
		.err_context("unable to delete project")?;

	tx.commit().await.err_context("unable to commit project deletion")
}

pub async fn snapshot(pool: &PgPool) -> Result<Vec<(i64, i64)>, Error> {
	let rows = sqlx::query("SELECT id, latest_version FROM projects ORDER BY id")
		.fetch_all(pool)
		.await
		.err_context("unable to snapshot projects")?;
	Ok(rows
		.into_iter()
		.map(|r| (r.get::<i64, _>(0), r.get::<i64, _>(1)))
		.collect())
}

/// Roll a project's temporal table back to `version`: re-open any row
/// closed after `version` and drop any row that started after it. Used by
/// the `Reset` RPC, typically to fast-revert a database between test runs.
/// Idempotent: calling it twice with the same `(project, version)` is a
/// no-op the second time.
pub async fn reset_project(pool: &PgPool, id: i64, version: i64) -> Result<(), Error> {
	let mut tx = pool.begin().await.err_context("unable to start transaction")?;

	sqlx::query("DELETE FROM objects WHERE project = $1 AND start_version > $2")
		.bind(id)
		.bind(version)
		.execute(&mut *tx)
		.await
		.err_context("unable to drop objects ahead of reset target")?;

	sqlx::query(
		"UPDATE objects SET stop_version = NULL
		 WHERE project = $1 AND stop_version IS NOT NULL AND stop_version > $2",
	)
	.bind(id)
	.bind(version)
	.execute(&mut *tx)
	.await
	.err_context("unable to reopen objects ahead of reset target")?;

	sqlx::query("UPDATE projects SET latest_version = $2 WHERE id = $1")
		.bind(id)
		.bind(version)
		.execute(&mut *tx)
		.await
		.err_context("unable to rewind project latest_version")?;

	tx.commit().await.err_context("unable to commit reset")
}

// ----------------------------------------------------------------- update

/// Take the per-project exclusion described in spec §5: a Postgres
/// transaction-scoped advisory lock keyed on the project id. Unlike an
/// in-process mutex this survives multiple server processes talking to
/// the same database, which is the guarantee Update's single-writer rule
/// actually needs. Returns `Ok(false)` (never blocks) so the caller can
/// fail fast per spec §4.1.
pub async fn try_lock_project_for_update(
	tx: &mut Transaction<'_, Postgres>,
	project: i64,
) -> Result<bool, Error> {
	let row = sqlx::query("SELECT pg_try_advisory_xact_lock($1)")
		.bind(project)
		.fetch_one(&mut **tx)
		.await
		.err_context("unable to acquire project update lock")?;
	Ok(row.get::<bool, _>(0))
}

/// Reserve the next version for `project`, returning it. Must be called
/// after the advisory lock in the same transaction.
pub async fn reserve_next_version(
	tx: &mut Transaction<'_, Postgres>,
	project: i64,
) -> Result<i64, Error> {
	let row = sqlx::query(
		"UPDATE projects SET latest_version = latest_version + 1
		 WHERE id = $1 RETURNING latest_version",
	)
	.bind(project)
	.fetch_optional(&mut **tx)
	.await
	.err_context("unable to reserve next version")?
	.ok_or_else(|| Error::NotFound(format!("project {}", project)))?;
	Ok(row.get::<i64, _>(0))
}

/// Close out the live row (if any) for `(project, path)` by setting its
/// `stop_version` to `new_version`, returning the row that was closed.
pub async fn close_live_object(
	tx: &mut Transaction<'_, Postgres>,
	project: i64,
	path: &str,
	new_version: i64,
) -> Result<Option<ObjectRow>, Error> {
	let row = sqlx::query_as::<_, ObjectRow>(
		"UPDATE objects SET stop_version = $3
		 WHERE project = $1 AND path = $2 AND stop_version IS NULL
		 RETURNING id, project, path, start_version, stop_version, mode, size, deleted, hash, packed, pack_path",
	)
	.bind(project)
	.bind(path)
	.bind(new_version)
	.fetch_optional(&mut **tx)
	.await
	.err_context("unable to close previous object version")?;
	Ok(row)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_object(
	tx: &mut Transaction<'_, Postgres>,
	project: i64,
	path: &str,
	start_version: i64,
	mode: i32,
	size: i64,
	deleted: bool,
	hash: Option<&[u8]>,
	packed: bool,
	pack_path: Option<&str>,
) -> Result<(), Error> {
	sqlx::query(
		"INSERT INTO objects (project, path, start_version, stop_version, mode, size, deleted, hash, packed, pack_path)
		 VALUES ($1, $2, $3, NULL, $4, $5, $6, $7, $8, $9)",
	)
	.bind(project)
	.bind(path)
	.bind(start_version)
	.bind(mode)
	.bind(size)
	.bind(deleted)
	.bind(hash)
	.bind(packed)
	.bind(pack_path)
	.execute(&mut **tx)
	.await
	.err_context("unable to insert object")?;
	Ok(())
}

// ---------------------------------------------------------------- content

/// Insert the content if no row with this hash exists yet. Returns
/// `true` if this call actually inserted a new row. Relies on the
/// primary key uniqueness constraint to serialize concurrent inserts of
/// the same hash: on conflict the insert is a no-op and the caller still
/// proceeds to bump `ref_count`, per spec §5.
pub async fn insert_content_if_absent(
	tx: &mut Transaction<'_, Postgres>,
	hash: &[u8],
	bytes: &[u8],
) -> Result<bool, Error> {
	let result = sqlx::query(
		"INSERT INTO contents (hash, bytes, ref_count) VALUES ($1, $2, 0)
		 ON CONFLICT (hash) DO NOTHING",
	)
	.bind(hash)
	.bind(bytes)
	.execute(&mut **tx)
	.await
	.err_context("unable to insert content")?;
	Ok(result.rows_affected() > 0)
}

pub async fn incr_content_ref(
	tx: &mut Transaction<'_, Postgres>,
	hash: &[u8],
	delta: i64,
) -> Result<(), Error> {
	sqlx::query("UPDATE contents SET ref_count = ref_count + $2 WHERE hash = $1")
		.bind(hash)
		.bind(delta)
		.execute(&mut **tx)
		.await
		.err_context("unable to update content reference count")?;
	Ok(())
}

pub async fn get_content<'e, E>(executor: E, hash: &[u8]) -> Result<Option<ContentRow>, Error>
where
	E: Executor<'e, Database = Pg>,
{
	sqlx::query_as::<_, ContentRow>("SELECT hash, bytes, ref_count FROM contents WHERE hash = $1")
		.bind(hash)
		.fetch_optional(executor)
		.await
		.err_context("unable to load content")
}

pub async fn content_exists(pool: &PgPool, hash: &[u8]) -> Result<bool, Error> {
	let row = sqlx::query("SELECT 1 FROM contents WHERE hash = $1")
		.bind(hash)
		.fetch_optional(pool)
		.await
		.err_context("unable to check content existence")?;
	Ok(row.is_some())
}

// ------------------------------------------------------------- temporal

/// All objects live at `version` (or, if `None`, the project's latest),
/// restricted by prefix match. Callers apply ignore-glob filtering
/// themselves since that logic is path-shape, not SQL-shape.
pub async fn live_objects_at<'e, E>(
	executor: E,
	project: i64,
	version: i64,
	prefix: &str,
) -> Result<Vec<ObjectRow>, Error>
where
	E: Executor<'e, Database = Pg>,
{
	sqlx::query_as::<_, ObjectRow>(
		"SELECT id, project, path, start_version, stop_version, mode, size, deleted, hash, packed, pack_path
		 FROM objects
		 WHERE project = $1 AND start_version <= $2 AND (stop_version IS NULL OR stop_version > $2)
		   AND path LIKE $3 || '%' AND deleted = FALSE
		 ORDER BY path ASC",
	)
	.bind(project)
	.bind(version)
	.bind(prefix)
	.fetch_all(executor)
	.await
	.err_context("unable to list live objects")
}

/// New-or-changed objects: every row whose lifespan opened in `(from, to]`.
pub async fn objects_started_in_range(
	pool: &PgPool,
	project: i64,
	from: i64,
	to: i64,
	prefix: &str,
) -> Result<Vec<ObjectRow>, Error> {
	sqlx::query_as::<_, ObjectRow>(
		"SELECT id, project, path, start_version, stop_version, mode, size, deleted, hash, packed, pack_path
		 FROM objects
		 WHERE project = $1 AND start_version > $2 AND start_version <= $3
		   AND path LIKE $4 || '%'
		 ORDER BY path ASC",
	)
	.bind(project)
	.bind(from)
	.bind(to)
	.bind(prefix)
	.fetch_all(pool)
	.await
	.err_context("unable to list new-or-changed objects")
}

/// Paths whose lifespan closed in `(from, to]` and which have no row
/// live at `to` — i.e. genuine removals, emitted by the diff algorithm as
/// tombstones. Excludes paths that were merely superseded (those already
/// show up via `objects_started_in_range`).
pub async fn tombstoned_paths_in_range(
	pool: &PgPool,
	project: i64,
	from: i64,
	to: i64,
	prefix: &str,
) -> Result<Vec<String>, Error> {
	let rows = sqlx::query(
		"SELECT DISTINCT o.path FROM objects o
		 WHERE o.project = $1 AND o.stop_version > $2 AND o.stop_version <= $3
		   AND o.path LIKE $4 || '%'
		   AND NOT EXISTS (
		       SELECT 1 FROM objects o2
		       WHERE o2.project = o.project AND o2.path = o.path
		         AND o2.start_version <= $3 AND (o2.stop_version IS NULL OR o2.stop_version > $3)
		   )
		 ORDER BY o.path ASC",
	)
	.bind(project)
	.bind(from)
	.bind(to)
	.bind(prefix)
	.fetch_all(pool)
	.await
	.err_context("unable to list tombstoned paths")?;
	Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
}

// ------------------------------------------------------------------ gc

pub async fn gc_contents(pool: &PgPool, sample: f64) -> Result<i64, Error> {
	let rows = sqlx::query(
		"DELETE FROM contents WHERE hash IN (
		     SELECT hash FROM contents WHERE ref_count <= 0 AND random() < $1
		 )",
	)
	.bind(sample)
	.execute(pool)
	.await
	.err_context("unable to gc contents")?;
	Ok(rows.rows_affected() as i64)
}

/// Coalesce a single project's history: keep the newest `keep` versions
/// (and everything at or after `from`, if given), dropping every row
/// whose lifespan closed at or before the oldest version retained. This
/// does not touch `ref_count` bookkeeping for any content still
/// referenced by a surviving row; contents that end up with no surviving
/// reference are reclaimed by a later `gc_contents` pass.
pub async fn gc_project(
	pool: &PgPool,
	project: i64,
	keep: i64,
	from: Option<i64>,
) -> Result<i64, Error> {
	let latest: i64 = sqlx::query("SELECT latest_version FROM projects WHERE id = $1")
		.bind(project)
		.fetch_optional(pool)
		.await
		.err_context("unable to load project")?
		.ok_or_else(|| Error::NotFound(format!("project {}", project)))?
		.get(0);

	let oldest_kept = match from {
		Some(f) => f.min((latest - keep + 1).max(1)),
		None => (latest - keep + 1).max(1),
	};

	let mut tx = pool.begin().await.err_context("unable to start transaction")?;

	// Release references held only by rows about to be coalesced away, once
	// per coalesced row — several closed rows in this window can share one
	// hash (e.g. a path overwritten with the same content twice).
	sqlx::query(
		"UPDATE contents c SET ref_count = c.ref_count - t.cnt
		 FROM (
		     SELECT hash, COUNT(*) AS cnt FROM objects
		     WHERE project = $1 AND stop_version IS NOT NULL AND stop_version <= $2 AND hash IS NOT NULL
		     GROUP BY hash
		 ) t
		 WHERE c.hash = t.hash",
	)
	.bind(project)
	.bind(oldest_kept)
	.execute(&mut *tx)
	.await
	.err_context("unable to release coalesced content references")?;

	let result = sqlx::query(
		"DELETE FROM objects WHERE project = $1 AND stop_version IS NOT NULL AND stop_version <= $2",
	)
	.bind(project)
	.bind(oldest_kept)
	.execute(&mut *tx)
	.await
	.err_context("unable to coalesce project history")?;

	tx.commit().await.err_context("unable to commit gc")?;
	Ok(result.rows_affected() as i64)
}

pub async fn sample_project_ids(pool: &PgPool, sample: f64) -> Result<Vec<i64>, Error> {
	let rows = sqlx::query("SELECT id FROM projects WHERE random() < $1")
		.bind(sample)
		.fetch_all(pool)
		.await
		.err_context("unable to sample projects")?;
	Ok(rows.into_iter().map(|r| r.get::<i64, _>(0)).collect())
}

// --------------------------------------------------------------- caches

/// Top-`count` distinct packed content hashes under `prefix`, by
/// reference count descending, ties broken by hash for determinism, per
/// spec §4.2 and §9's open question on cache-version policy.
pub async fn top_packs_under_prefix(
	pool: &PgPool,
	prefix: &str,
	count: i64,
) -> Result<Vec<Vec<u8>>, Error> {
	let rows = sqlx::query(
		"SELECT c.hash FROM contents c
		 JOIN objects o ON o.hash = c.hash
		 WHERE o.packed = TRUE AND o.pack_path LIKE $1 || '%'
		 GROUP BY c.hash, c.ref_count
		 ORDER BY c.ref_count DESC, c.hash ASC
		 LIMIT $2",
	)
	.bind(prefix)
	.bind(count)
	.fetch_all(pool)
	.await
	.err_context("unable to select top packs")?;
	Ok(rows.into_iter().map(|r| r.get::<Vec<u8>, _>(0)).collect())
}

pub async fn create_cache_version(
	pool: &PgPool,
	pack_hashes: &[Vec<u8>],
) -> Result<i64, Error> {
	let row = sqlx::query("INSERT INTO cache_versions (pack_hashes) VALUES ($1) RETURNING id")
		.bind(pack_hashes)
		.fetch_one(pool)
		.await
		.err_context("unable to create cache version")?;
	Ok(row.get::<i64, _>(0))
}

pub async fn get_cache_version(pool: &PgPool, id: i64) -> Result<Option<CacheVersionRow>, Error> {
	sqlx::query_as::<_, CacheVersionRow>(
		"SELECT id, pack_hashes FROM cache_versions WHERE id = $1",
	)
	.bind(id)
	.fetch_optional(pool)
	.await
	.err_context("unable to load cache version")
}

pub async fn latest_cache_version(pool: &PgPool) -> Result<Option<CacheVersionRow>, Error> {
	sqlx::query_as::<_, CacheVersionRow>(
		"SELECT id, pack_hashes FROM cache_versions ORDER BY id DESC LIMIT 1",
	)
	.fetch_optional(pool)
	.await
	.err_context("unable to load latest cache version")
}

// --------------------------------------------------------------- inspect

pub struct InspectCounts {
	pub latest_version: i64,
	pub live_objects_count: i64,
	pub total_objects_count: i64,
}

pub async fn inspect_project(pool: &PgPool, project: i64) -> Result<InspectCounts, Error> {
	let project_row = get_project(pool, project)
		.await?
		.ok_or_else(|| Error::NotFound(format!("project {}", project)))?;

	let live: i64 = sqlx::query(
		"SELECT COUNT(*) FROM objects WHERE project = $1 AND stop_version IS NULL AND deleted = FALSE",
	)
	.bind(project)
	.fetch_one(pool)
	.await
	.err_context("unable to count live objects")?
	.get(0);

	let total: i64 = sqlx::query("SELECT COUNT(*) FROM objects WHERE project = $1")
		.bind(project)
		.fetch_one(pool)
		.await
		.err_context("unable to count total objects")?
		.get(0);

	Ok(InspectCounts {
		latest_version: project_row.latest_version,
		live_objects_count: live,
		total_objects_count: total,
	})
}

// --------------------------------------------------------------- clone

/// Used by `NewProjectRequest{template}` and `CloneToProject`: copy every
/// object live at `(source, version)` into `target` as a fresh version-1
/// history, bumping each referenced content's `ref_count` accordingly. No
/// bytes move — only index rows and reference counts.
pub async fn clone_project_objects(
	tx: &mut Transaction<'_, Postgres>,
	source: i64,
	version: i64,
	target: i64,
) -> Result<i64, Error> {
	sqlx::query(
		"INSERT INTO objects (project, path, start_version, stop_version, mode, size, deleted, hash, packed, pack_path)
		 SELECT $3, path, 1, NULL, mode, size, deleted, hash, packed, pack_path
		 FROM objects
		 WHERE project = $1 AND start_version <= $2 AND (stop_version IS NULL OR stop_version > $2) AND deleted = FALSE",
	)
	.bind(source)
	.bind(version)
	.bind(target)
	.execute(&mut **tx)
	.await
	.err_context("unable to clone project objects")?;

	// Bump each referenced content once per cloned object, not once per
	// distinct hash — two cloned paths sharing one hash (e.g. two
	// identical files in the template) must each count as a live
	// reference, matching the per-object increment the normal Update
	// path performs (see `store/update.rs`).
	sqlx::query(
		"UPDATE contents c SET ref_count = c.ref_count + t.cnt
		 FROM (
		     SELECT hash, COUNT(*) AS cnt FROM objects
		     WHERE project = $1 AND start_version = 1 AND hash IS NOT NULL
		     GROUP BY hash
		 ) t
		 WHERE c.hash = t.hash",
	)
	.bind(target)
	.execute(&mut **tx)
	.await
	.err_context("unable to bump cloned content references")?;

	sqlx::query("UPDATE projects SET latest_version = 1 WHERE id = $1")
		.bind(target)
		.execute(&mut **tx)
		.await
		.err_context("unable to set cloned project version")?;

	Ok(1)
}

/// Helper used by callers that only have a bare `Executor`, e.g. the
/// health check in the server binary.
pub async fn ping(executor: impl Executor<'_, Database = Pg>) -> Result<(), Error> {
	sqlx::query("SELECT 1").execute(executor).await.err_context("database ping failed")?;
	Ok(())
}
