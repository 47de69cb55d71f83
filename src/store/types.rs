//! Wire-agnostic value types shared by every operation in this crate.
//! `dl_rpc` converts to/from the protobuf shapes at the service boundary;
//! nothing in here knows about tonic.

use dl_util::hash::Hash;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;

/// One `(prefix, ignores)` clause of a `Get`/`GetCompress` request. A path
/// is matched if its query's prefix is itself a prefix of the path (or
/// equals it, when `is_prefix` is false) and no entry in `ignores` is
/// also a prefix of the path — ignores are evaluated after the prefix
/// match, per spec §4.1.
#[derive(Debug, Clone)]
pub struct ObjectQuery {
	pub prefix: String,
	pub is_prefix: bool,
	pub ignores: Vec<String>,
	pub with_content: bool,
}

impl ObjectQuery {
	pub fn matches(&self, path: &str) -> bool {
		let prefix_ok = if self.is_prefix {
			path.starts_with(&self.prefix)
		} else {
			path == self.prefix
		};
		if !prefix_ok {
			return false;
		}
		!self.ignores.iter().any(|ignore| path.starts_with(ignore))
	}
}

pub fn matches_any(queries: &[ObjectQuery], path: &str) -> bool {
	queries.iter().any(|q| q.matches(path))
}

/// A materialized object as returned by `Get`, or one diff entry as
/// returned by `GetCompress`'s underlying algorithm before TAR framing.
#[derive(Debug, Clone)]
pub struct Object {
	pub path: String,
	pub mode: u32,
	pub size: i64,
	pub deleted: bool,
	pub content: Option<Vec<u8>>,
	pub pack_path: Option<String>,
}

impl Object {
	pub fn tombstone(path: String) -> Self {
		Object {
			path,
			mode: 0,
			size: 0,
			deleted: true,
			content: None,
			pack_path: None,
		}
	}

	pub fn is_dir(&self) -> bool {
		self.mode & S_IFMT == S_IFDIR
	}

	pub fn is_symlink(&self) -> bool {
		self.mode & S_IFMT == S_IFLNK
	}
}

/// One framed chunk of a `GetCompress` response: either a loose TAR of
/// several diff records, or a single verbatim pack tarball (in which
/// case `pack_path` names the root it should be extracted under).
#[derive(Debug, Clone)]
pub struct Frame {
	pub version: i64,
	pub bytes: Vec<u8>,
	pub pack_path: Option<String>,
}

/// One object the client wants to write, as sent over the `Update`
/// stream.
#[derive(Debug, Clone)]
pub struct UpdateObject {
	pub path: String,
	pub mode: u32,
	pub size: i64,
	pub deleted: bool,
	pub content: Option<Vec<u8>>,
}

impl UpdateObject {
	pub fn content_hash(&self) -> Option<Hash> {
		self.content.as_deref().map(Hash::of)
	}
}
