//! The cache directory's exclusive advisory lock (spec §4.5 invariant b,
//! §9 "acquire on first cache operation, release on process exit or
//! abort"). Implemented as a flock'd file so it's released automatically
//! if the holding process dies, rather than needing explicit cleanup on
//! every termination path.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use dl_util::error::{Error, ErrContext};

use crate::layout;

/// RAII guard: holding one means exclusive access to the cache
/// directory's mutating operations. Dropping it (including on panic
/// unwind) releases the OS-level flock.
pub struct CacheLock {
	_file: File,
}

impl CacheLock {
	pub fn acquire(root: &Path) -> Result<Self, Error> {
		let path = layout::lock_file(root);
		let file = OpenOptions::new()
			.create(true)
			.write(true)
			.open(&path)
			.err_context(format!("unable to open cache lock file {}", path.display()))?;
		file
			.lock_exclusive()
			.err_context(format!("unable to acquire cache lock {}", path.display()))?;
		Ok(Self { _file: file })
	}
}

impl Drop for CacheLock {
	fn drop(&mut self) {
		let _ = FileExt::unlock(&self._file);
	}
}
