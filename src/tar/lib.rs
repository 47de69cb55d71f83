//! TAR record encode/decode for the wire format described in spec §6.
//!
//! Every `Get`/`GetCompress`/`Update` record is a standard TAR header plus
//! two extensions: a reserved tombstone type byte (`'D'`) whose header
//! name is the deleted path, and a reserved pack-reference type byte
//! (`'R'`) whose header name is the pack's root path and whose body is
//! the hex-encoded content hash, letting the client recognize either
//! without any out-of-band signaling.

use std::io::{Cursor, Read, Write};

use tar::{Builder, EntryType, Header};

use dl_util::error::Error;
use dl_util::hash::Hash;

/// Reserved TAR type byte for a tombstone record (spec §6: "TAR record
/// conventions").
pub const TOMBSTONE_TYPE: u8 = b'D';

/// Reserved TAR type byte for a pack-reference record: tells the client
/// "materialize the pack at this path from your local cache, named by
/// this hash" instead of re-sending the pack's bytes.
pub const PACK_REF_TYPE: u8 = b'R';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TarRecord {
	Regular {
		path: String,
		mode: u32,
		content: Vec<u8>,
	},
	Symlink {
		path: String,
		mode: u32,
		target: String,
	},
	Directory {
		path: String,
		mode: u32,
	},
	Tombstone {
		path: String,
	},
	PackRef {
		path: String,
		hash: Hash,
	},
}

impl TarRecord {
	pub fn path(&self) -> &str {
		match self {
			TarRecord::Regular { path, .. }
			| TarRecord::Symlink { path, .. }
			| TarRecord::Directory { path, .. }
			| TarRecord::Tombstone { path }
			| TarRecord::PackRef { path, .. } => path,
		}
	}
}

/// Incrementally builds a TAR byte stream, used both for loose diff
/// frames and for re-materializing a pack's bytes.
pub struct TarWriter {
	builder: Builder<Vec<u8>>,
}

impl Default for TarWriter {
	fn default() -> Self {
		Self::new()
	}
}

impl TarWriter {
	pub fn new() -> Self {
		Self {
			builder: Builder::new(Vec::new()),
		}
	}

	pub fn append_regular(&mut self, path: &str, mode: u32, content: &[u8]) -> Result<(), Error> {
		let mut header = Header::new_gnu();
		header.set_entry_type(EntryType::Regular);
		header.set_path(path).map_err(|e| Error::TarDecode(e.to_string()))?;
		header.set_size(content.len() as u64);
		header.set_mode(mode);
		header.set_cksum();
		self.builder
			.append(&header, content)
			.map_err(|e| Error::TarDecode(e.to_string()))
	}

	pub fn append_symlink(&mut self, path: &str, mode: u32, target: &str) -> Result<(), Error> {
		let mut header = Header::new_gnu();
		header.set_entry_type(EntryType::Symlink);
		header.set_path(path).map_err(|e| Error::TarDecode(e.to_string()))?;
		header
			.set_link_name(target)
			.map_err(|e| Error::TarDecode(e.to_string()))?;
		header.set_size(0);
		header.set_mode(mode);
		header.set_cksum();
		self.builder
			.append(&header, std::io::empty())
			.map_err(|e| Error::TarDecode(e.to_string()))
	}

	pub fn append_directory(&mut self, path: &str, mode: u32) -> Result<(), Error> {
		let mut header = Header::new_gnu();
		header.set_entry_type(EntryType::Directory);
		header.set_path(path).map_err(|e| Error::TarDecode(e.to_string()))?;
		header.set_size(0);
		header.set_mode(mode);
		header.set_cksum();
		self.builder
			.append(&header, std::io::empty())
			.map_err(|e| Error::TarDecode(e.to_string()))
	}

	pub fn append_tombstone(&mut self, path: &str) -> Result<(), Error> {
		let mut header = Header::new_gnu();
		header.set_entry_type(EntryType::new(TOMBSTONE_TYPE));
		header.set_path(path).map_err(|e| Error::TarDecode(e.to_string()))?;
		header.set_size(0);
		header.set_mode(0);
		header.set_cksum();
		self.builder
			.append(&header, std::io::empty())
			.map_err(|e| Error::TarDecode(e.to_string()))
	}

	pub fn append_pack_ref(&mut self, pack_root: &str, hash: &Hash) -> Result<(), Error> {
		let hex = hash.to_hex();
		let mut header = Header::new_gnu();
		header.set_entry_type(EntryType::new(PACK_REF_TYPE));
		header
			.set_path(pack_root)
			.map_err(|e| Error::TarDecode(e.to_string()))?;
		header.set_size(hex.len() as u64);
		header.set_mode(0);
		header.set_cksum();
		self.builder
			.append(&header, hex.as_bytes())
			.map_err(|e| Error::TarDecode(e.to_string()))
	}

	/// Number of bytes written so far, used to decide frame boundaries
	/// against `MAX_MESSAGE_SIZE` without finishing the archive early.
	pub fn len(&self) -> usize {
		self.builder.get_ref().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Finish the archive (writes the two 512-byte zero-block trailer)
	/// and return the raw bytes.
	pub fn finish(mut self) -> Result<Vec<u8>, Error> {
		self.builder
			.finish()
			.map_err(|e| Error::TarDecode(e.to_string()))?;
		self.builder
			.into_inner()
			.map_err(|e| Error::TarDecode(e.to_string()))
	}
}

/// Decode a TAR byte stream into its records, in the order they appear.
pub fn decode(bytes: &[u8]) -> Result<Vec<TarRecord>, Error> {
	let mut archive = tar::Archive::new(Cursor::new(bytes));
	let mut out = Vec::new();

	for entry in archive
		.entries()
		.map_err(|e| Error::TarDecode(e.to_string()))?
	{
		let mut entry = entry.map_err(|e| Error::TarDecode(e.to_string()))?;
		let header = entry.header().clone();
		let path = entry
			.path()
			.map_err(|e| Error::TarDecode(e.to_string()))?
			.to_string_lossy()
			.to_string();
		let mode = header.mode().unwrap_or(0);
		let entry_type = header.entry_type();

		let record = match entry_type.as_byte() {
			TOMBSTONE_TYPE => TarRecord::Tombstone { path },
			PACK_REF_TYPE => {
				let mut hex_buf = String::new();
				entry
					.read_to_string(&mut hex_buf)
					.map_err(|e| Error::TarDecode(e.to_string()))?;
				let hash = Hash::from_hex(hex_buf.trim())
					.ok_or_else(|| Error::TarDecode(format!("bad pack reference hash for {}", path)))?;
				TarRecord::PackRef { path, hash }
			}
			_ if entry_type.is_dir() => TarRecord::Directory { path, mode },
			_ if entry_type.is_symlink() => {
				let target = entry
					.link_name()
					.map_err(|e| Error::TarDecode(e.to_string()))?
					.ok_or_else(|| Error::TarDecode(format!("symlink {} missing target", path)))?
					.to_string_lossy()
					.to_string();
				TarRecord::Symlink { path, mode, target }
			}
			_ => {
				let mut content = Vec::new();
				entry
					.read_to_end(&mut content)
					.map_err(|e| Error::TarDecode(e.to_string()))?;
				TarRecord::Regular { path, mode, content }
			}
		};
		out.push(record);
	}
	Ok(out)
}

/// Write a single finished pack tarball into a fresh in-memory buffer,
/// used by pack re-materialization (spec §4.1) and cache version
/// creation (spec §4.2): both need to build a standalone TAR whose
/// records all share a root path.
pub fn write_pack<'a>(
	entries: impl IntoIterator<Item = &'a TarRecord>,
) -> Result<Vec<u8>, Error> {
	let mut writer = TarWriter::new();
	for record in entries {
		match record {
			TarRecord::Regular { path, mode, content } => {
				writer.append_regular(path, *mode, content)?
			}
			TarRecord::Symlink { path, mode, target } => {
				writer.append_symlink(path, *mode, target)?
			}
			TarRecord::Directory { path, mode } => writer.append_directory(path, *mode)?,
			TarRecord::Tombstone { path } => writer.append_tombstone(path)?,
			TarRecord::PackRef { path, hash } => writer.append_pack_ref(path, hash)?,
		}
	}
	writer.finish()
}

/// Split an ordered list of records into framed TAR byte-chunks, each
/// at most `max_size` bytes, never splitting a record across a frame
/// boundary (spec §4.3: "producers split object streams at frame
/// boundaries, never inside a TAR record").
pub fn frame_records(records: &[TarRecord], max_size: usize) -> Result<Vec<Vec<u8>>, Error> {
	let mut frames = Vec::new();
	let mut current = TarWriter::new();

	for record in records {
		append_record(&mut current, record)?;
		if current.len() >= max_size {
			frames.push(std::mem::replace(&mut current, TarWriter::new()).finish()?);
		}
	}
	if !current.is_empty() {
		frames.push(current.finish()?);
	}
	Ok(frames)
}

fn append_record(writer: &mut TarWriter, record: &TarRecord) -> Result<(), Error> {
	match record {
		TarRecord::Regular { path, mode, content } => writer.append_regular(path, *mode, content),
		TarRecord::Symlink { path, mode, target } => writer.append_symlink(path, *mode, target),
		TarRecord::Directory { path, mode } => writer.append_directory(path, *mode),
		TarRecord::Tombstone { path } => writer.append_tombstone(path),
		TarRecord::PackRef { path, hash } => writer.append_pack_ref(path, hash),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roundtrips_regular_file() {
		let mut w = TarWriter::new();
		w.append_regular("a/b.txt", 0o644, b"hello").unwrap();
		let bytes = w.finish().unwrap();
		let records = decode(&bytes).unwrap();
		assert_eq!(records.len(), 1);
		match &records[0] {
			TarRecord::Regular { path, mode, content } => {
				assert_eq!(path, "a/b.txt");
				assert_eq!(*mode, 0o644);
				assert_eq!(content, b"hello");
			}
			_ => panic!("expected regular file"),
		}
	}

	#[test]
	fn roundtrips_tombstone() {
		let mut w = TarWriter::new();
		w.append_tombstone("deleted/path").unwrap();
		let bytes = w.finish().unwrap();
		let records = decode(&bytes).unwrap();
		assert_eq!(records, vec![TarRecord::Tombstone { path: "deleted/path".into() }]);
	}

	#[test]
	fn roundtrips_pack_reference() {
		let hash = Hash::of(b"pack contents");
		let mut w = TarWriter::new();
		w.append_pack_ref("pack1/x/", &hash).unwrap();
		let bytes = w.finish().unwrap();
		let records = decode(&bytes).unwrap();
		match &records[0] {
			TarRecord::PackRef { path, hash: h } => {
				assert_eq!(path, "pack1/x/");
				assert_eq!(h, &hash);
			}
			_ => panic!("expected pack reference"),
		}
	}

	#[test]
	fn roundtrips_symlink() {
		let mut w = TarWriter::new();
		w.append_symlink("l", 0o777, "s").unwrap();
		let bytes = w.finish().unwrap();
		let records = decode(&bytes).unwrap();
		assert_eq!(
			records,
			vec![TarRecord::Symlink {
				path: "l".into(),
				mode: 0o777,
				target: "s".into(),
			}]
		);
	}

	#[test]
	fn frames_split_at_boundary() {
		let records: Vec<TarRecord> = (0..50)
			.map(|i| TarRecord::Regular {
				path: format!("f{}", i),
				mode: 0o644,
				content: vec![0u8; 1024],
			})
			.collect();
		let frames = frame_records(&records, 4096).unwrap();
		assert!(frames.len() > 1);
		for frame in &frames {
			assert!(decode(frame).unwrap().len() >= 1);
		}
	}
}
