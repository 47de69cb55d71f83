//! Linking a cached pack's exploded contents into a target path,
//! preferring reflink, falling back to hardlink, falling back to a
//! recursive copy (spec §4.4 step 4: "Prefer reflink on filesystems that
//! support it; fall back to hardlink; fall back to recursive copy").

use std::fs;
use std::path::Path;

use dl_util::error::{Error, ErrContext};

/// Recursively link `src` (a file or directory) into `dst`, trying each
/// strategy in turn per entry so a filesystem that only supports some of
/// them (e.g. no reflink on ext4, no hardlinks across devices) still
/// succeeds via the next fallback.
pub fn link_tree(src: &Path, dst: &Path) -> Result<(), Error> {
	let metadata = fs::symlink_metadata(src).err_context(format!("unable to stat {}", src.display()))?;

	if metadata.is_dir() {
		fs::create_dir_all(dst).err_context(format!("unable to create directory {}", dst.display()))?;
		for entry in fs::read_dir(src).err_context(format!("unable to list {}", src.display()))? {
			let entry = entry.err_context(format!("unable to read directory entry under {}", src.display()))?;
			link_tree(&entry.path(), &dst.join(entry.file_name()))?;
		}
		Ok(())
	} else if metadata.file_type().is_symlink() {
		let target = fs::read_link(src).err_context(format!("unable to read symlink {}", src.display()))?;
		let _ = fs::remove_file(dst);
		#[cfg(unix)]
		std::os::unix::fs::symlink(&target, dst)
			.err_context(format!("unable to recreate symlink {}", dst.display()))?;
		Ok(())
	} else {
		link_file(src, dst)
	}
}

fn link_file(src: &Path, dst: &Path) -> Result<(), Error> {
	let _ = fs::remove_file(dst);

	if reflink_copy::reflink(src, dst).is_ok() {
		return Ok(());
	}
	if fs::hard_link(src, dst).is_ok() {
		return Ok(());
	}
	fs::copy(src, dst).err_context(format!("unable to copy {} to {}", src.display(), dst.display()))?;
	Ok(())
}
