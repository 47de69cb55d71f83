//! The local diff computed against the stored summary on `Update` (spec
//! §4.4): adds, modifies and removes, ready to be encoded into
//! `UpdateRequest`s.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffEntry {
	Added { path: String, mode: u32 },
	Modified { path: String, mode: u32 },
	Removed { path: String },
}

impl DiffEntry {
	pub fn path(&self) -> &str {
		match self {
			DiffEntry::Added { path, .. } | DiffEntry::Modified { path, .. } | DiffEntry::Removed { path } => path,
		}
	}
}
