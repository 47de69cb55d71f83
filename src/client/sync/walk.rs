//! Directory walk + diff computation (spec §4.4): rebuilds the summary
//! while emitting adds/modifies/removes against the old one. Modify
//! detection uses `(mode, size)` plus mtime-or-hash; ambiguous cases
//! (size unchanged but mtime drifted, as under copy-on-write clones) are
//! resolved by rehashing.

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use dl_util::error::{Error, ErrContext};

use super::diff::DiffEntry;
use super::metadata::DL_DIR;
use super::summary::{Entry, Fingerprint, Summary};

pub struct WalkOutcome {
	pub summary: Summary,
	pub diff: Vec<DiffEntry>,
	/// Content bytes for every added/modified path, keyed by path, ready
	/// to hand to the update producer without rereading the filesystem.
	pub bodies: std::collections::HashMap<String, Vec<u8>>,
}

/// Walk `root`, excluding `.dl/` and any path matching a prefix in
/// `ignores`, diffing against `old_summary`.
pub fn walk_and_diff(root: &Path, old_summary: &Summary, ignores: &[String]) -> Result<WalkOutcome, Error> {
	let mut summary = Summary::default();
	let mut diff = Vec::new();
	let mut bodies = std::collections::HashMap::new();
	let mut seen: BTreeSet<String> = BTreeSet::new();

	visit(root, root, ignores, &mut |rel, path, meta| {
		if is_ignored(rel, ignores) {
			return Ok(());
		}
		seen.insert(rel.to_string());

		let mode = unix_mode(&meta);
		if meta.is_dir() {
			let entry = Entry { mode, size: 0, fingerprint: Fingerprint::Mtime(0) };
			let changed = old_summary.get(rel).map(|e| e.mode != mode).unwrap_or(true);
			if changed {
				diff.push(if old_summary.get(rel).is_some() {
					DiffEntry::Modified { path: rel.to_string(), mode }
				} else {
					DiffEntry::Added { path: rel.to_string(), mode }
				});
			}
			summary.insert(rel.to_string(), entry);
			return Ok(());
		}

		if meta.file_type().is_symlink() {
			let target = fs::read_link(path).err_context(format!("unable to read symlink {}", path.display()))?;
			let target_bytes = target.to_string_lossy().as_bytes().to_vec();
			let fingerprint = Fingerprint::content(&target_bytes);
			let size = target_bytes.len() as i64;
			let changed = !old_summary.unchanged(rel, mode, size, &fingerprint);
			if changed {
				diff.push(if old_summary.get(rel).is_some() {
					DiffEntry::Modified { path: rel.to_string(), mode }
				} else {
					DiffEntry::Added { path: rel.to_string(), mode }
				});
				bodies.insert(rel.to_string(), target_bytes);
			}
			summary.insert(rel.to_string(), Entry { mode, size, fingerprint });
			return Ok(());
		}

		let size = meta.len() as i64;
		let mtime_ns = meta.mtime() * 1_000_000_000 + meta.mtime_nsec();
		let mtime_fp = Fingerprint::Mtime(mtime_ns);

		let old_entry = old_summary.get(rel);
		let likely_unchanged = old_entry
			.map(|e| e.mode == mode && e.size == size && e.fingerprint == mtime_fp)
			.unwrap_or(false);

		if likely_unchanged {
			summary.insert(rel.to_string(), old_entry.cloned().unwrap());
			return Ok(());
		}

		// Either new, or (mode, size) match but mtime drifted, or mode/size
		// genuinely differ: read the content once, both to decide and
		// (if changed) to hand the bytes to the caller.
		let content = fs::read(path).err_context(format!("unable to read {}", path.display()))?;
		let content_fp = Fingerprint::content(&content);

		let ambiguous_but_same = old_entry
			.map(|e| e.mode == mode && e.size == size && e.fingerprint == content_fp)
			.unwrap_or(false);

		if ambiguous_but_same {
			summary.insert(rel.to_string(), Entry { mode, size, fingerprint: content_fp });
			return Ok(());
		}

		diff.push(if old_entry.is_some() {
			DiffEntry::Modified { path: rel.to_string(), mode }
		} else {
			DiffEntry::Added { path: rel.to_string(), mode }
		});
		bodies.insert(rel.to_string(), content);
		summary.insert(rel.to_string(), Entry { mode, size, fingerprint: content_fp });
		Ok(())
	})?;

	for path in old_summary.entries.keys() {
		if !seen.contains(path) && !is_ignored(path, ignores) {
			diff.push(DiffEntry::Removed { path: path.clone() });
		}
	}

	diff.sort_by(|a, b| a.path().cmp(b.path()));
	Ok(WalkOutcome { summary, diff, bodies })
}

fn is_ignored(path: &str, ignores: &[String]) -> bool {
	ignores.iter().any(|ignore| path.starts_with(ignore.as_str()))
}

fn unix_mode(meta: &fs::Metadata) -> u32 {
	meta.permissions().mode()
}

fn visit(
	root: &Path,
	dir: &Path,
	ignores: &[String],
	visitor: &mut dyn FnMut(&str, &Path, fs::Metadata) -> Result<(), Error>,
) -> Result<(), Error> {
	let mut entries: Vec<_> = fs::read_dir(dir)
		.err_context(format!("unable to list directory {}", dir.display()))?
		.collect::<Result<Vec<_>, _>>()
		.err_context(format!("unable to read directory entry under {}", dir.display()))?;
	entries.sort_by_key(|e| e.file_name());

	for entry in entries {
		let path = entry.path();
		let name = entry.file_name();
		if dir == root && name == DL_DIR {
			continue;
		}

		let rel = path_relative_to(root, &path);
		let meta = fs::symlink_metadata(&path).err_context(format!("unable to stat {}", path.display()))?;

		if meta.is_dir() && !meta.file_type().is_symlink() {
			visitor(&rel, &path, meta)?;
			if !is_ignored(&rel, ignores) {
				visit(root, &path, ignores, visitor)?;
			}
		} else {
			visitor(&rel, &path, meta)?;
		}
	}
	Ok(())
}

fn path_relative_to(root: &Path, path: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.to_string_lossy()
		.replace(std::path::MAIN_SEPARATOR, "/")
}

pub fn working_dir_canonical(path: &Path) -> PathBuf {
	path.to_path_buf()
}
