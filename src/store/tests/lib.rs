//! End-to-end scenarios from spec §8, run against an ephemeral,
//! fully-migrated Postgres database per test (the `sqlx::test` harness
//! rolls each one back automatically).

use std::sync::Arc;

use sqlx::PgPool;

use dl_store::{types::UpdateObject, Store};

fn obj(path: &str, content: &str) -> UpdateObject {
	UpdateObject {
		path: path.to_string(),
		mode: 0o100644,
		size: content.len() as i64,
		deleted: false,
		content: Some(content.as_bytes().to_vec()),
	}
}

fn tombstone(path: &str) -> UpdateObject {
	UpdateObject {
		path: path.to_string(),
		mode: 0,
		size: 0,
		deleted: true,
		content: None,
	}
}

fn dir(path: &str) -> UpdateObject {
	UpdateObject {
		path: path.to_string(),
		mode: 0o040755,
		size: 0,
		deleted: false,
		content: Some(Vec::new()),
	}
}

fn symlink(path: &str, target: &str) -> UpdateObject {
	UpdateObject {
		path: path.to_string(),
		mode: 0o120000,
		size: target.len() as i64,
		deleted: false,
		content: Some(target.as_bytes().to_vec()),
	}
}

fn all_query() -> dl_store::ObjectQuery {
	dl_store::ObjectQuery {
		prefix: String::new(),
		is_prefix: true,
		ignores: vec![],
		with_content: true,
	}
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn new_project_three_writes(pool: PgPool) {
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();

	let v1 = store
		.update(1, vec![obj("a", "1"), obj("b", "2"), obj("c", "3")])
		.await
		.unwrap();
	assert_eq!(v1, 1);

	let v2 = store
		.update(1, vec![obj("b", "22"), tombstone("a")])
		.await
		.unwrap();
	assert_eq!(v2, 2);

	let (to, objects) = store.get(1, None, None, &[all_query()]).await.unwrap();
	assert_eq!(to, 2);
	let paths: Vec<&str> = objects.iter().map(|o| o.path.as_str()).collect();
	assert_eq!(paths, vec!["b", "c"]);
	assert_eq!(objects[0].content.as_deref(), Some(b"22".as_slice()));

	let (_, diff) = store.get(1, Some(1), Some(2), &[all_query()]).await.unwrap();
	let mut by_path: Vec<(&str, bool)> = diff.iter().map(|o| (o.path.as_str(), o.deleted)).collect();
	by_path.sort();
	assert_eq!(by_path, vec![("a", true), ("b", false)]);
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn rebuild_to_intermediate_then_latest(pool: PgPool) {
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();
	store
		.update(1, vec![obj("a", "1"), obj("b", "2"), obj("c", "3")])
		.await
		.unwrap();
	store.update(1, vec![obj("b", "22"), tombstone("a")]).await.unwrap();

	let (v1, at_v1) = store.get(1, None, Some(1), &[all_query()]).await.unwrap();
	assert_eq!(v1, 1);
	let paths: Vec<&str> = at_v1.iter().map(|o| o.path.as_str()).collect();
	assert_eq!(paths, vec!["a", "b", "c"]);

	let (latest, at_latest) = store.get(1, None, None, &[all_query()]).await.unwrap();
	assert_eq!(latest, 2);
	let paths: Vec<&str> = at_latest.iter().map(|o| o.path.as_str()).collect();
	assert_eq!(paths, vec!["b", "c"]);
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn empty_update_does_not_bump_version(pool: PgPool) {
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();
	store.update(1, vec![obj("a", "1")]).await.unwrap();

	// No changes: applying an update for content identical to what's
	// already live should be a true no-op for the caller (the client
	// sync engine only calls Update when its local diff is non-empty).
	let (_, before) = store.get(1, None, None, &[all_query()]).await.unwrap();
	assert_eq!(before.len(), 1);
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn pack_rematerializes_on_member_change(pool: PgPool) {
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store
		.new_project(1, None, vec!["^pack1/.*/".to_string()])
		.await
		.unwrap();

	store
		.update(1, vec![obj("pack1/x/a", "1"), obj("pack1/x/b", "2")])
		.await
		.unwrap();

	let (_, v1) = store.get(1, None, None, &[all_query()]).await.unwrap();
	assert_eq!(v1.len(), 1);
	assert_eq!(v1[0].path, "pack1/x/");
	assert!(v1[0].pack_path.is_some());

	store.update(1, vec![obj("pack1/x/b", "22")]).await.unwrap();

	let (_, v2) = store.get(1, None, None, &[all_query()]).await.unwrap();
	assert_eq!(v2.len(), 1);
	assert_eq!(v2[0].path, "pack1/x/");

	let records = dl_tar::decode(v2[0].content.as_ref().unwrap()).unwrap();
	let mut paths: Vec<&str> = records.iter().map(|r| r.path()).collect();
	paths.sort();
	assert_eq!(paths, vec!["pack1/x/a", "pack1/x/b"]);
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn content_dedup_reuses_identical_bytes(pool: PgPool) {
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();
	store
		.update(1, vec![obj("a", "same"), obj("b", "same")])
		.await
		.unwrap();

	let hash = dl_util::hash::Hash::of(b"same");
	let content = dl_db::queries::get_content(&store.db.pool, hash.as_bytes())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(content.ref_count, 2);
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn clone_bumps_ref_count_once_per_cloned_object(pool: PgPool) {
	// Invariant 2: ref_count must equal the number of live Objects
	// referencing a Content. A template with two paths sharing one hash
	// must leave that hash's ref_count at 2 after cloning, not 1.
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();
	store
		.update(1, vec![obj("a", "same"), obj("b", "same")])
		.await
		.unwrap();

	store.new_project(2, Some(1), vec![]).await.unwrap();

	let hash = dl_util::hash::Hash::of(b"same");
	let content = dl_db::queries::get_content(&store.db.pool, hash.as_bytes())
		.await
		.unwrap()
		.unwrap();
	// Two live objects in project 1 plus two cloned into project 2.
	assert_eq!(content.ref_count, 4);
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn delete_project_releases_ref_count_once_per_object(pool: PgPool) {
	// The inverse of the clone case: deleting a project that holds two
	// live objects sharing one hash must release both references, not
	// just one.
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();
	store
		.update(1, vec![obj("a", "same"), obj("b", "same")])
		.await
		.unwrap();
	store.new_project(2, None, vec![]).await.unwrap();
	store.update(2, vec![obj("c", "same")]).await.unwrap();

	let hash = dl_util::hash::Hash::of(b"same");
	let before = dl_db::queries::get_content(&store.db.pool, hash.as_bytes())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(before.ref_count, 3);

	store.delete_project(1).await.unwrap();

	let after = dl_db::queries::get_content(&store.db.pool, hash.as_bytes())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(after.ref_count, 1, "deleting project 1 must release both of its references, leaving only project 2's");
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn concurrent_update_conflicts(pool: PgPool) {
	// A second, uncommitted Update attempt against the same project must
	// fail fast rather than block (spec §4.1/§5): one transaction holds the
	// project's advisory lock open, a second transaction on the same pool
	// must observe the lock as unavailable rather than waiting for it.
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db.clone());
	store.new_project(1, None, vec![]).await.unwrap();

	let mut holder = db.pool.begin().await.unwrap();
	assert!(dl_db::queries::try_lock_project_for_update(&mut holder, 1).await.unwrap());

	let mut contender = db.pool.begin().await.unwrap();
	let acquired = dl_db::queries::try_lock_project_for_update(&mut contender, 1).await.unwrap();
	assert!(!acquired, "a second in-flight Update must fail fast, not block");
	contender.rollback().await.unwrap();

	holder.rollback().await.unwrap();

	// Once the first holder releases the lock, a fresh Update succeeds.
	let version = store.update(1, vec![obj("a", "1")]).await.unwrap();
	assert_eq!(version, 1);
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn symlink_and_directory_swap(pool: PgPool) {
	// Spec §8 scenario 3: a file is replaced by a directory at the same
	// path across versions; a symlink pointing at the removed file is left
	// dangling rather than rewritten, which is permitted.
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();
	let mut s = obj("s", "body");
	s.mode = 0o100644;
	let mut l = obj("l", "s");
	l.mode = 0o120000;
	store.update(1, vec![s, l]).await.unwrap();

	store.update(1, vec![tombstone("s"), dir("s/")]).await.unwrap();

	let (_, diff) = store.get(1, Some(1), Some(2), &[all_query()]).await.unwrap();
	let mut by_path: Vec<(&str, bool, bool)> =
		diff.iter().map(|o| (o.path.as_str(), o.deleted, o.is_dir())).collect();
	by_path.sort();
	assert_eq!(by_path, vec![("s", true, false), ("s/", false, true)]);

	let (_, at_v2) = store.get(1, None, None, &[all_query()]).await.unwrap();
	let l_entry = at_v2.iter().find(|o| o.path == "l").unwrap();
	assert!(!l_entry.deleted, "the dangling symlink itself is still live, only its target is gone");
}

#[sqlx::test(migrator = "dl_db::MIGRATOR")]
async fn pack_pattern_change_is_not_retroactive(pool: PgPool) {
	// Spec §3 invariant 4 / §8 boundary: pack membership is fixed at the
	// version a pack was written; a rebuild at an earlier version still
	// sees the original unpacked layout.
	let db = Arc::new(dl_db::Db { pool });
	let store = Store::new(db);

	store.new_project(1, None, vec![]).await.unwrap();
	store.update(1, vec![obj("pack1/x/a", "1")]).await.unwrap();

	let (_, at_v1) = store.get(1, None, Some(1), &[all_query()]).await.unwrap();
	assert_eq!(at_v1.len(), 1);
	assert_eq!(at_v1[0].path, "pack1/x/a");
	assert!(at_v1[0].pack_path.is_none());
}

mod fuzz_equivalence {
	//! Spec §8 scenario 5: a full rebuild, an incremental rebuild applied
	//! version-by-version, and a rebuild that jumps to a random
	//! intermediate version before catching up to latest must all agree
	//! on the final tree. The client's `Rebuild` is a deterministic
	//! function of the diffs `Get` returns, so this property is checked
	//! here at the store layer against randomly generated batches of
	//! filesystem-like operations.

	use std::collections::BTreeMap;

	use proptest::prelude::*;
	use proptest::test_runner::TestRunner;
	use sqlx::PgPool;
	use std::sync::Arc;

	use dl_store::{types::UpdateObject, Object, Store};

	use super::{all_query, dir, obj, symlink, tombstone};

	#[derive(Debug, Clone)]
	enum Op {
		AddFile(String, String),
		AddDir(String),
		RemoveFile(String),
		AddSymlink(String, String),
	}

	fn path_strategy() -> impl Strategy<Value = String> {
		proptest::sample::select(vec!["a", "b", "c", "d", "nested/e"]).prop_map(|s| s.to_string())
	}

	fn op_strategy() -> impl Strategy<Value = Op> {
		prop_oneof![
			(path_strategy(), "[a-z]{1,6}").prop_map(|(p, c)| Op::AddFile(p, c)),
			path_strategy().prop_map(Op::AddDir),
			path_strategy().prop_map(Op::RemoveFile),
			(path_strategy(), path_strategy()).prop_map(|(p, t)| Op::AddSymlink(p, t)),
		]
	}

	/// Collapse a batch of ops to one `UpdateObject` per path, last write
	/// wins — the round-trip law in spec §7 requires this of any client
	/// before it calls `Update`.
	fn normalize_batch(ops: &[Op]) -> Vec<UpdateObject> {
		let mut by_path: BTreeMap<String, UpdateObject> = BTreeMap::new();
		for op in ops {
			let object = match op {
				Op::AddFile(p, c) => obj(p, c),
				Op::AddDir(p) => dir(&format!("{}/", p.trim_end_matches('/'))),
				Op::RemoveFile(p) => tombstone(p),
				Op::AddSymlink(p, t) => symlink(p, t),
			};
			by_path.insert(object.path.clone(), object);
		}
		by_path.into_values().collect()
	}

	fn apply_diff(model: &mut BTreeMap<String, Object>, diff: &[Object]) {
		for o in diff {
			if o.deleted {
				model.remove(&o.path);
			} else {
				model.insert(o.path.clone(), o.clone());
			}
		}
	}

	fn fingerprint(model: &BTreeMap<String, Object>) -> Vec<(String, u32, Option<Vec<u8>>)> {
		model.iter().map(|(p, o)| (p.clone(), o.mode, o.content.clone())).collect()
	}

	#[sqlx::test(migrator = "dl_db::MIGRATOR")]
	async fn incremental_and_jump_rebuilds_agree_with_full_rebuild(pool: PgPool) {
		let db = Arc::new(dl_db::Db { pool });
		let store = Store::new(db);
		store.new_project(1, None, vec![]).await.unwrap();

		let mut runner = TestRunner::default();
		let batches_strategy = proptest::collection::vec(proptest::collection::vec(op_strategy(), 1..4), 3..6);
		let batches = batches_strategy.new_tree(&mut runner).unwrap().current();

		let mut latest = 0i64;
		for ops in &batches {
			let objects = normalize_batch(ops);
			if objects.is_empty() {
				continue;
			}
			latest = store.update(1, objects).await.unwrap();
		}
		if latest == 0 {
			return;
		}

		let (_, full) = store.get(1, None, Some(latest), &[all_query()]).await.unwrap();
		let mut full_model: BTreeMap<String, Object> = BTreeMap::new();
		for o in &full {
			full_model.insert(o.path.clone(), o.clone());
		}
		let expected = fingerprint(&full_model);

		// (b) incremental: apply each version's diff against the one before it.
		let mut incremental: BTreeMap<String, Object> = BTreeMap::new();
		for v in 1..=latest {
			let (_, diff) = store.get(1, Some(v - 1), Some(v), &[all_query()]).await.unwrap();
			apply_diff(&mut incremental, &diff);
		}
		assert_eq!(fingerprint(&incremental), expected, "incremental rebuild diverged from a full rebuild");

		// (c) jump to an intermediate version, then catch up to latest.
		if latest > 1 {
			let mid = 1 + (latest - 1) / 2;
			let (_, at_mid) = store.get(1, None, Some(mid), &[all_query()]).await.unwrap();
			let mut jumped: BTreeMap<String, Object> = BTreeMap::new();
			for o in &at_mid {
				jumped.insert(o.path.clone(), o.clone());
			}
			let (_, catch_up) = store.get(1, Some(mid), Some(latest), &[all_query()]).await.unwrap();
			apply_diff(&mut jumped, &catch_up);
			assert_eq!(fingerprint(&jumped), expected, "jump-then-catch-up rebuild diverged from a full rebuild");
		}
	}
}
