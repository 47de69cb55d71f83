//! On-disk cache directory management (spec §4.5): the client-side and
//! server-side home for exploded, content-addressed pack trees shared
//! across many projects and nodes.

#[macro_use]
extern crate tracing;

pub mod layout;
pub mod lock;
pub mod materialize;

use std::fs;
use std::path::{Path, PathBuf};

use dl_util::error::{Error, ErrContext};
use dl_util::hash::Hash;

pub use lock::CacheLock;

#[derive(Clone)]
pub struct CacheDir {
	root: PathBuf,
}

impl CacheDir {
	/// Opens (creating if absent) the cache directory's fixed skeleton:
	/// `objects/` and `tmp/` always exist, `versions` is created empty on
	/// first use.
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
		let root = root.into();
		fs::create_dir_all(layout::objects_dir(&root))
			.err_context("unable to create cache objects directory")?;
		fs::create_dir_all(layout::tmp_dir(&root)).err_context("unable to create cache tmp directory")?;
		let cache = Self { root };
		if !layout::versions_file(&cache.root).exists() {
			fs::write(layout::versions_file(&cache.root), b"").err_context("unable to create versions file")?;
		}
		Ok(cache)
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Acquire the cache directory's exclusive advisory lock, required for
	/// any mutating operation (spec §4.5 invariant b).
	pub fn lock(&self) -> Result<CacheLock, Error> {
		CacheLock::acquire(&self.root)
	}

	pub fn has_pack(&self, hash: &Hash) -> bool {
		layout::pack_dir(&self.root, &hash.to_hex()).is_dir()
	}

	/// Explode a pack tarball under `objects/<hex-hash>/`, atomically:
	/// fully written under `tmp/` first, then renamed into place (spec
	/// §4.5 invariant a). Callers must already hold the cache lock.
	pub fn extract_pack(&self, hash: &Hash, tar_bytes: &[u8]) -> Result<(), Error> {
		let hex = hash.to_hex();
		let final_dir = layout::pack_dir(&self.root, &hex);
		if final_dir.is_dir() {
			debug!("Pack {} already extracted, skipping", hex);
			return Ok(());
		}
		info!("Extracting pack {} ({} bytes)", hex, tar_bytes.len());

		let staging = layout::tmp_dir(&self.root).join(&hex);
		if staging.exists() {
			fs::remove_dir_all(&staging).err_context("unable to clear stale extraction staging directory")?;
		}
		fs::create_dir_all(&staging).err_context("unable to create extraction staging directory")?;

		let mut archive = tar::Archive::new(tar_bytes);
		archive
			.unpack(&staging)
			.err_context(format!("unable to extract pack {} into staging", hex))?;

		match fs::rename(&staging, &final_dir) {
			Ok(()) => Ok(()),
			Err(e) if final_dir.is_dir() => {
				// Another writer raced us and won; our staging copy is
				// redundant now.
				debug!("Lost extraction race for pack {}, discarding staging copy", hex);
				let _ = fs::remove_dir_all(&staging);
				let _ = e;
				Ok(())
			}
			Err(e) => Err(e).err_context(format!("unable to publish extracted pack {}", hex)),
		}
	}

	/// Link a path inside a cached pack's exploded tree into `target`,
	/// preferring reflink, then hardlink, then a recursive copy.
	pub fn materialize(&self, hash: &Hash, rel_path: &str, target: &Path) -> Result<(), Error> {
		let src = layout::pack_dir(&self.root, &hash.to_hex()).join(rel_path);
		if let Some(parent) = target.parent() {
			fs::create_dir_all(parent).err_context("unable to create parent directory for cache materialization")?;
		}
		materialize::link_tree(&src, target)
	}

	pub fn local_versions(&self) -> Result<Vec<i64>, Error> {
		let contents = fs::read_to_string(layout::versions_file(&self.root))
			.err_context("unable to read cache versions file")?;
		Ok(contents.lines().filter_map(|l| l.trim().parse().ok()).collect())
	}

	pub fn has_version(&self, id: i64) -> Result<bool, Error> {
		Ok(self.local_versions()?.contains(&id))
	}

	/// Record that `id` is now held locally. Callers must hold the cache
	/// lock; additive only, per spec §4.5 ("the cache is additive only").
	pub fn add_version(&self, id: i64) -> Result<(), Error> {
		if self.has_version(id)? {
			return Ok(());
		}
		let mut versions = self.local_versions()?;
		versions.push(id);
		let contents = versions.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\n");
		fs::write(layout::versions_file(&self.root), contents + "\n")
			.err_context("unable to update cache versions file")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extract_pack_is_idempotent_and_atomic() {
		let dir = tempfile::tempdir().unwrap();
		let cache = CacheDir::open(dir.path()).unwrap();
		let _lock = cache.lock().unwrap();

		let bytes = dl_tar::write_pack(
			[dl_tar::TarRecord::Regular {
				path: "a.txt".into(),
				mode: 0o644,
				content: b"hello".to_vec(),
			}]
			.iter(),
		)
		.unwrap();
		let hash = Hash::of(&bytes);

		assert!(!cache.has_pack(&hash));
		cache.extract_pack(&hash, &bytes).unwrap();
		assert!(cache.has_pack(&hash));
		// Idempotent: extracting again must not error.
		cache.extract_pack(&hash, &bytes).unwrap();

		assert!(!layout::tmp_dir(cache.root()).join(hash.to_hex()).exists());
	}

	#[test]
	fn versions_file_is_additive() {
		let dir = tempfile::tempdir().unwrap();
		let cache = CacheDir::open(dir.path()).unwrap();
		let _lock = cache.lock().unwrap();

		cache.add_version(1).unwrap();
		cache.add_version(2).unwrap();
		cache.add_version(1).unwrap();

		let mut versions = cache.local_versions().unwrap();
		versions.sort();
		assert_eq!(versions, vec![1, 2]);
	}

	#[test]
	fn materialize_copies_file_contents() {
		let dir = tempfile::tempdir().unwrap();
		let cache = CacheDir::open(dir.path()).unwrap();
		let _lock = cache.lock().unwrap();

		let bytes = dl_tar::write_pack(
			[dl_tar::TarRecord::Regular {
				path: "sub/a.txt".into(),
				mode: 0o644,
				content: b"hello".to_vec(),
			}]
			.iter(),
		)
		.unwrap();
		let hash = Hash::of(&bytes);
		cache.extract_pack(&hash, &bytes).unwrap();

		let target = dir.path().join("materialized");
		cache.materialize(&hash, "", &target).unwrap();
		assert_eq!(fs::read_to_string(target.join("sub/a.txt")).unwrap(), "hello");
	}
}
