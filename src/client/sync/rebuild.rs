//! `Rebuild` (spec §4.4): fan received `GetCompress` frames out to a
//! worker pool, apply each to the filesystem, and only advance the
//! `.dl/version` file once every frame has landed.

use std::path::{Path, PathBuf};

use futures::{Stream, TryStreamExt};

use dl_tar::TarRecord;
use dl_util::error::{Error, ErrContext};
use dl_util::hash::Hash;

use dl_cache::CacheDir;
use dl_rpc::pb;

/// Worker pool size: "about half the available CPUs" (spec §4.4), never
/// less than one.
pub fn default_worker_count() -> usize {
	(num_cpus::get() / 2).max(1)
}

pub struct RebuildPlan<'a> {
	pub root: &'a Path,
	pub cache: &'a CacheDir,
	pub worker_count: usize,
}

/// Apply every frame of a `GetCompress` response stream to `plan.root`.
/// A failing worker propagates its error immediately; the caller must
/// not advance `.dl/version` if this returns `Err`.
pub async fn apply_stream<S>(plan: &RebuildPlan<'_>, stream: S) -> Result<(), Error>
where
	S: Stream<Item = Result<pb::GetCompressResponse, tonic::Status>> + Unpin,
{
	let root = plan.root.to_path_buf();
	let cache = plan.cache.clone();

	stream
		.map_err(Error::from)
		.try_for_each_concurrent(Some(plan.worker_count), move |frame| {
			let root = root.clone();
			let cache = cache.clone();
			async move { apply_frame(&root, &cache, frame).await }
		})
		.await
}

async fn apply_frame(root: &Path, cache: &CacheDir, frame: pb::GetCompressResponse) -> Result<(), Error> {
	let root = root.to_path_buf();
	let cache = cache.clone();
	tokio::task::spawn_blocking(move || apply_frame_blocking(&root, &cache, frame))
		.await
		.err_context("rebuild worker task panicked")?
}

fn apply_frame_blocking(root: &Path, cache: &CacheDir, frame: pb::GetCompressResponse) -> Result<(), Error> {
	if let Some(pack_path) = &frame.pack_path {
		let hash = Hash::of(&frame.bytes);
		let _lock = cache.lock()?;
		cache.extract_pack(&hash, &frame.bytes)?;
		let target = root.join(pack_path);
		cache.materialize(&hash, "", &target)?;
		return Ok(());
	}

	for record in dl_tar::decode(&frame.bytes)? {
		apply_record(root, cache, record)?;
	}
	Ok(())
}

fn apply_record(root: &Path, cache: &CacheDir, record: TarRecord) -> Result<(), Error> {
	match record {
		TarRecord::Regular { path, mode, content } => {
			let target = root.join(&path);
			if let Some(parent) = target.parent() {
				std::fs::create_dir_all(parent).err_context(format!("unable to create parent directory for {}", path))?;
			}
			std::fs::write(&target, &content).err_context(format!("unable to write {}", path))?;
			set_mode(&target, mode)?;
			Ok(())
		}
		TarRecord::Symlink { path, target: link_target, .. } => {
			let target = root.join(&path);
			if let Some(parent) = target.parent() {
				std::fs::create_dir_all(parent).err_context(format!("unable to create parent directory for {}", path))?;
			}
			let _ = std::fs::remove_file(&target);
			#[cfg(unix)]
			std::os::unix::fs::symlink(&link_target, &target)
				.err_context(format!("unable to create symlink {}", path))?;
			Ok(())
		}
		TarRecord::Directory { path, mode } => {
			let target = root.join(&path);
			std::fs::create_dir_all(&target).err_context(format!("unable to create directory {}", path))?;
			set_mode(&target, mode)?;
			Ok(())
		}
		TarRecord::Tombstone { path } => remove_path(&root.join(&path)),
		TarRecord::PackRef { path, hash } => {
			let target = root.join(&path);
			cache.materialize(&hash, "", &target)
		}
	}
}

fn set_mode(path: &Path, mode: u32) -> Result<(), Error> {
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
			.err_context(format!("unable to set mode on {}", path.display()))?;
	}
	#[cfg(not(unix))]
	let _ = mode;
	Ok(())
}

fn remove_path(path: &Path) -> Result<(), Error> {
	match std::fs::symlink_metadata(path) {
		Ok(meta) if meta.is_dir() => {
			std::fs::remove_dir_all(path).err_context(format!("unable to remove directory {}", path.display()))
		}
		Ok(_) => std::fs::remove_file(path).err_context(format!("unable to remove {}", path.display())),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e).err_context(format!("unable to stat {} for removal", path.display())),
	}
}

pub fn target_path(root: &Path, rel: &str) -> PathBuf {
	root.join(rel)
}
