//! The on-disk shape from spec §4.5:
//!
//! ```text
//! <cache_root>/
//!   versions                # newline-separated list of cache-version ids held locally
//!   .lock                   # exclusive lock file
//!   objects/<hex-hash>/...  # exploded pack contents, one directory per pack
//!   tmp/                    # in-flight extractions, renamed atomically into objects/
//! ```

use std::path::{Path, PathBuf};

pub fn versions_file(root: &Path) -> PathBuf {
	root.join("versions")
}

pub fn lock_file(root: &Path) -> PathBuf {
	root.join(".lock")
}

pub fn objects_dir(root: &Path) -> PathBuf {
	root.join("objects")
}

pub fn tmp_dir(root: &Path) -> PathBuf {
	root.join("tmp")
}

pub fn pack_dir(root: &Path, hex_hash: &str) -> PathBuf {
	objects_dir(root).join(hex_hash)
}
