//! The `.dl/` metadata directory kept next to every materialized tree
//! (spec §4.4): `version`, the compressed `sum.s2` summary, and an
//! optional `diff.s2` debug copy of the last computed diff.

use std::path::{Path, PathBuf};

use dl_util::error::{Error, ErrContext};

use super::diff::DiffEntry;
use super::summary::Summary;

pub const DL_DIR: &str = ".dl";
const VERSION_FILE: &str = "version";
const SUMMARY_FILE: &str = "sum.s2";
const DIFF_FILE: &str = "diff.s2";

pub struct Metadata {
	dir: PathBuf,
}

impl Metadata {
	pub fn open(working_dir: &Path) -> Self {
		Self { dir: working_dir.join(DL_DIR) }
	}

	pub fn dl_dir(&self) -> &Path {
		&self.dir
	}

	pub fn ensure_dir(&self) -> Result<(), Error> {
		std::fs::create_dir_all(&self.dir).err_context("unable to create .dl metadata directory")
	}

	/// The version last fully materialized, or `0` for a tree that has
	/// never been synced.
	pub fn read_version(&self) -> Result<i64, Error> {
		let path = self.dir.join(VERSION_FILE);
		if !path.exists() {
			return Ok(0);
		}
		let raw = std::fs::read_to_string(&path).err_context("unable to read .dl/version")?;
		raw.trim().parse().err_context("corrupt .dl/version contents")
	}

	/// Write the new version atomically (temp file + rename), only called
	/// after every frame of a rebuild has been applied (spec §4.4 step 5).
	pub fn write_version(&self, version: i64) -> Result<(), Error> {
		self.ensure_dir()?;
		let tmp = self.dir.join(format!("{}.tmp", VERSION_FILE));
		std::fs::write(&tmp, version.to_string()).err_context("unable to write temporary version file")?;
		std::fs::rename(&tmp, self.dir.join(VERSION_FILE)).err_context("unable to publish new version file")
	}

	pub fn read_summary(&self) -> Result<Summary, Error> {
		let path = self.dir.join(SUMMARY_FILE);
		if !path.exists() {
			return Ok(Summary::default());
		}
		let compressed = std::fs::read(&path).err_context("unable to read .dl/sum.s2")?;
		let raw = zstd::decode_all(compressed.as_slice()).err_context("unable to decompress .dl/sum.s2")?;
		serde_json::from_slice(&raw).err_context("corrupt .dl/sum.s2 contents")
	}

	pub fn write_summary(&self, summary: &Summary) -> Result<(), Error> {
		self.ensure_dir()?;
		let raw = serde_json::to_vec(summary).err_context("unable to serialize summary")?;
		let compressed = zstd::encode_all(raw.as_slice(), 0).err_context("unable to compress summary")?;
		let tmp = self.dir.join(format!("{}.tmp", SUMMARY_FILE));
		std::fs::write(&tmp, &compressed).err_context("unable to write temporary summary file")?;
		std::fs::rename(&tmp, self.dir.join(SUMMARY_FILE)).err_context("unable to publish summary file")
	}

	/// Debug copy of the last computed diff; best-effort, never fatal to
	/// the surrounding operation if it fails to write.
	pub fn write_diff_debug(&self, diff: &[DiffEntry]) {
		let _ = self.try_write_diff_debug(diff);
	}

	fn try_write_diff_debug(&self, diff: &[DiffEntry]) -> Result<(), Error> {
		self.ensure_dir()?;
		let raw = serde_json::to_vec(diff).err_context("unable to serialize diff")?;
		let compressed = zstd::encode_all(raw.as_slice(), 0).err_context("unable to compress diff")?;
		std::fs::write(self.dir.join(DIFF_FILE), &compressed).err_context("unable to write .dl/diff.s2")
	}
}
