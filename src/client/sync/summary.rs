//! The per-path fingerprint kept in `sum.s2` (spec §4.4): a compact
//! mapping from path to `(mode, size, hash-or-mtime-fingerprint)`,
//! sufficient to compute a correct diff on the next update without
//! rereading every file's contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use dl_util::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fingerprint {
	/// Modification time in nanoseconds since the epoch. Cheap to compute
	/// but unreliable across copy-on-write clones (spec §9 open
	/// question), so callers fall back to `Content` when in doubt.
	Mtime(i64),
	Content([u8; 32]),
}

impl Fingerprint {
	pub fn content(bytes: &[u8]) -> Self {
		Fingerprint::Content(*Hash::of(bytes).as_bytes())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
	pub mode: u32,
	pub size: i64,
	pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
	pub entries: BTreeMap<String, Entry>,
}

impl Summary {
	pub fn get(&self, path: &str) -> Option<&Entry> {
		self.entries.get(path)
	}

	pub fn insert(&mut self, path: String, entry: Entry) {
		self.entries.insert(path, entry);
	}

	pub fn remove(&mut self, path: &str) -> Option<Entry> {
		self.entries.remove(path)
	}

	/// Whether `candidate` is unambiguously the same content as what the
	/// summary last recorded for `path`. `(mode, size)` agreeing plus a
	/// matching fingerprint is treated as "unchanged"; anything else
	/// (including a `Mtime` fingerprint that merely looks plausible) is
	/// left for the caller to resolve by rehashing, per spec §4.4
	/// "ambiguous cases are resolved by rehashing".
	pub fn unchanged(&self, path: &str, mode: u32, size: i64, fingerprint: &Fingerprint) -> bool {
		match self.get(path) {
			Some(prev) => prev.mode == mode && prev.size == size && &prev.fingerprint == fingerprint,
			None => false,
		}
	}
}
