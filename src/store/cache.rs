//! `GetCompress` framing and the cache-distribution path (spec §4.1's
//! pack-frame/suppression rules, §4.2 cache version creation, §6
//! `GetCacheRequest`).

use std::collections::HashSet;

use dl_db::queries;
use dl_tar::TarRecord;
use dl_util::error::Error;
use dl_util::hash::Hash;

use crate::types::{Frame, ObjectQuery};
use crate::Store;

/// Frames never exceed this many bytes (spec §4.3: `MAX_MESSAGE_SIZE`,
/// approximately 300 MiB).
pub const MAX_MESSAGE_SIZE: usize = 300 * 1024 * 1024;

impl Store {
	/// Stream a diff between two versions as framed TAR chunks. Packs
	/// whose hash is already in one of `available_cache_versions` are
	/// suppressed and replaced by a single pack-reference record so the
	/// client materializes from its local cache instead of re-downloading
	/// the tarball.
	pub async fn get_compress(
		&self,
		project: i64,
		from: Option<i64>,
		to: Option<i64>,
		queries_in: &[ObjectQuery],
		available_cache_versions: &[i64],
		max_frame_size: usize,
	) -> Result<Vec<Frame>, Error> {
		let (resolved_to, objects) = self.get(project, from, to, queries_in).await?;
		let known_hashes = self.known_pack_hashes(available_cache_versions).await?;

		let mut loose_records = Vec::new();
		let mut frames = Vec::new();

		for object in objects {
			if object.pack_path.is_some() && !object.deleted {
				let pack_path = object.pack_path.clone().unwrap();
				let (pack_bytes, pack_hash) = self.load_pack(project, &pack_path, resolved_to).await?;

				if known_hashes.contains(&pack_hash) {
					loose_records.push(TarRecord::PackRef {
						path: pack_path,
						hash: pack_hash,
					});
				} else {
					frames.push(Frame {
						version: resolved_to,
						bytes: pack_bytes,
						pack_path: Some(pack_path),
					});
				}
			} else if object.deleted {
				loose_records.push(TarRecord::Tombstone { path: object.path });
			} else {
				let mode = object.mode;
				let content = object.content.unwrap_or_default();
				let record = if object.is_dir() {
					TarRecord::Directory { path: object.path, mode }
				} else if object.is_symlink() {
					let target = String::from_utf8_lossy(&content).to_string();
					TarRecord::Symlink { path: object.path, mode, target }
				} else {
					TarRecord::Regular { path: object.path, mode, content }
				};
				loose_records.push(record);
			}
		}

		let loose_frames = dl_tar::frame_records(&loose_records, max_frame_size)?;
		let mut all_frames: Vec<Frame> = loose_frames
			.into_iter()
			.map(|bytes| Frame {
				version: resolved_to,
				bytes,
				pack_path: None,
			})
			.collect();
		all_frames.extend(frames);

		Ok(all_frames)
	}

	async fn load_pack(
		&self,
		project: i64,
		pack_path: &str,
		version: i64,
	) -> Result<(Vec<u8>, Hash), Error> {
		let rows = queries::live_objects_at(&self.db.pool, project, version, pack_path).await?;
		let row = rows
			.into_iter()
			.find(|r| r.path == pack_path && r.packed)
			.ok_or_else(|| Error::NotFound(format!("pack {}", pack_path)))?;
		let hash = row
			.hash
			.as_deref()
			.ok_or_else(|| Error::CorruptData(pack_path.to_string()))?;
		let content = queries::get_content(&self.db.pool, hash)
			.await?
			.ok_or_else(|| Error::CorruptData(pack_path.to_string()))?;
		let pack_hash = Hash::try_from(hash)?;
		Ok((content.bytes, pack_hash))
	}

	async fn known_pack_hashes(&self, cache_version_ids: &[i64]) -> Result<HashSet<Hash>, Error> {
		let mut out = HashSet::new();
		for id in cache_version_ids {
			if let Some(row) = self.cache_version_by_id(*id).await? {
				for hash in row.pack_hashes {
					out.insert(Hash::try_from(hash.as_slice())?);
				}
			}
		}
		Ok(out)
	}

	async fn cache_version_by_id(
		&self,
		id: i64,
	) -> Result<Option<dl_db::model::CacheVersionRow>, Error> {
		queries::get_cache_version(&self.db.pool, id).await
	}

	/// Create a new cache version from the most-referenced packs under
	/// `prefix` (spec §4.2). No bytes move; only the index entry is
	/// created.
	pub async fn create_cache_version(&self, prefix: &str, count: i64) -> Result<i64, Error> {
		let hashes = queries::top_packs_under_prefix(&self.db.pool, prefix, count).await?;
		queries::create_cache_version(&self.db.pool, &hashes).await
	}

	/// `GetCache`: the current cache version id, followed by each of its
	/// packs in a deterministic order.
	pub async fn get_cache(&self) -> Result<(i64, Vec<(Hash, Vec<u8>)>), Error> {
		let version = queries::latest_cache_version(&self.db.pool)
			.await?
			.ok_or_else(|| Error::NotFound("no cache version has been published yet".into()))?;

		let mut packs = Vec::with_capacity(version.pack_hashes.len());
		for hash in &version.pack_hashes {
			let content = queries::get_content(&self.db.pool, hash)
				.await?
				.ok_or_else(|| Error::CorruptData(hex::encode(hash)))?;
			packs.push((Hash::try_from(hash.as_slice())?, content.bytes));
		}
		Ok((version.id, packs))
	}
}
