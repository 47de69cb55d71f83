//! `Update` (spec §4.1): append a new version from a client-side diff
//! inside a single exclusive, all-or-nothing transaction.

use std::collections::BTreeSet;

use dl_db::queries;
use dl_tar::TarRecord;
use dl_util::error::{Error, ErrContext};
use dl_util::hash::Hash;

use crate::pattern::PackPatterns;
use crate::types::{UpdateObject, S_IFDIR, S_IFLNK, S_IFMT};
use crate::Store;

impl Store {
	/// Apply a batch of objects as one new version. Fails fast with
	/// `Error::Conflict` if another Update is already in flight for this
	/// project (spec §4.1: "one uncommitted Update per project at a
	/// time; further attempts fail fast").
	pub async fn update(&self, project: i64, objects: Vec<UpdateObject>) -> Result<i64, Error> {
		for obj in &objects {
			if !obj.deleted {
				if let Some(content) = &obj.content {
					if content.len() as i64 != obj.size {
						return Err(Error::Message(format!(
							"declared size {} does not match content length {} for {}",
							obj.size,
							content.len(),
							obj.path
						)));
					}
				}
			}
		}

		let project_row = queries::get_project(&self.db.pool, project)
			.await?
			.ok_or_else(|| Error::NotFound(format!("project {}", project)))?;
		let patterns = PackPatterns::compile(&project_row.pack_patterns)?;

		let mut tx = self
			.db
			.pool
			.begin()
			.await
			.err_context("unable to start transaction")?;

		if !queries::try_lock_project_for_update(&mut tx, project).await? {
			warn!("Update on project {} rejected: another update is already in flight", project);
			return Err(Error::Conflict(project));
		}
		let new_version = queries::reserve_next_version(&mut tx, project).await?;

		let mut touched_roots: BTreeSet<String> = BTreeSet::new();

		for obj in &objects {
			let hash = obj.content_hash();

			if let Some(prior) = queries::close_live_object(&mut tx, project, &obj.path, new_version).await? {
				if let Some(prior_hash) = &prior.hash {
					queries::incr_content_ref(&mut tx, prior_hash, -1).await?;
				}
			}

			if !obj.deleted {
				if let (Some(h), Some(content)) = (&hash, &obj.content) {
					let inserted = queries::insert_content_if_absent(&mut tx, h.as_bytes(), content).await?;
					let _ = inserted;
					queries::incr_content_ref(&mut tx, h.as_bytes(), 1).await?;
				}
			}

			queries::insert_object(
				&mut tx,
				project,
				&obj.path,
				new_version,
				obj.mode as i32,
				obj.size,
				obj.deleted,
				hash.as_ref().map(|h| h.as_bytes().as_slice()),
				false,
				None,
			)
			.await?;

			if let Some(root) = patterns.root_for(&obj.path) {
				touched_roots.insert(root);
			}
		}

		for root in touched_roots {
			self.rematerialize_pack(&mut tx, project, new_version, &root).await?;
		}

		tx.commit().await.err_context("unable to commit update")?;
		debug!("Update committed: project {} now at version {}", project, new_version);
		Ok(new_version)
	}

	/// Re-tar every live file under `root` at `new_version` and publish
	/// it as a single packed Object, superseding any previous pack at the
	/// same root (spec §4.1: "re-materializes that pack from the union
	/// of the new version's contents at the pattern prefix").
	async fn rematerialize_pack(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
		project: i64,
		new_version: i64,
		root: &str,
	) -> Result<(), Error> {
		let members = queries::live_objects_at(&mut **tx, project, new_version, root).await?;

		let mut records = Vec::new();
		let mut total_size: i64 = 0;
		for row in &members {
			if row.path == root || row.deleted {
				continue;
			}
			let rel = row.path.clone();
			let content = match &row.hash {
				Some(hash) => queries::get_content(&mut **tx, hash)
					.await?
					.map(|c| c.bytes)
					.unwrap_or_default(),
				None => Vec::new(),
			};
			total_size += row.size;
			let mode = row.mode as u32;
			let record = if mode & S_IFMT == S_IFDIR {
				TarRecord::Directory { path: rel, mode }
			} else if mode & S_IFMT == S_IFLNK {
				let target = String::from_utf8_lossy(&content).to_string();
				TarRecord::Symlink { path: rel, mode, target }
			} else {
				TarRecord::Regular { path: rel, mode, content }
			};
			records.push(record);
		}

		// Member rows stay live: they still represent real paths in the
		// tree, and the next pack rematerialization (whichever future
		// version next touches this root) needs to see every untouched
		// member here, not just the ones this update happened to change.
		// A plain prefix `Get` never shows a member next to its pack root
		// because `suppress_packed_members` (spec §4.1, §9) drops member
		// rows at read time whenever the aggregate row is also present in
		// the result set — that is where "don't show both" is enforced,
		// not here.
		let prior = queries::close_live_object(tx, project, root, new_version).await?;
		if let Some(prior) = &prior {
			if let Some(prior_hash) = &prior.hash {
				queries::incr_content_ref(tx, prior_hash, -1).await?;
			}
		}

		if records.is_empty() {
			// Every member under this root was removed: the whole pack is
			// gone, so its root is simply tombstoned rather than
			// re-published as an empty tarball.
			return Ok(());
		}

		let pack_bytes = dl_tar::write_pack(records.iter())?;
		let pack_hash = Hash::of(&pack_bytes);

		queries::insert_content_if_absent(tx, pack_hash.as_bytes(), &pack_bytes).await?;
		queries::incr_content_ref(tx, pack_hash.as_bytes(), 1).await?;

		queries::insert_object(
			tx,
			project,
			root,
			new_version,
			(S_IFDIR | 0o755) as i32,
			total_size,
			false,
			Some(pack_hash.as_bytes().as_slice()),
			true,
			Some(root),
		)
		.await?;

		Ok(())
	}
}
