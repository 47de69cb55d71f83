//! Versioned object store (spec §4.1), content/pack index (§4.2) and GC
//! policies, built on top of `dl_db`'s typed repository methods. Contains
//! zero raw SQL — every statement lives in `dl_db::queries`, mirroring
//! the separation the teacher draws between `garage_model` and
//! `garage_db`.

#[macro_use]
extern crate tracing;

pub mod cache;
pub mod gc;
pub mod pattern;
pub mod project;
pub mod read;
pub mod types;
pub mod update;

use std::sync::Arc;

pub use cache::MAX_MESSAGE_SIZE;
pub use pattern::PackPatterns;
pub use types::{Frame, Object, ObjectQuery, UpdateObject};

/// The store handle, cheap to clone (wraps an `Arc<dl_db::Db>`), handed
/// out to every RPC handler that needs it.
#[derive(Clone)]
pub struct Store {
	pub db: Arc<dl_db::Db>,
}

impl Store {
	pub fn new(db: Arc<dl_db::Db>) -> Self {
		Self { db }
	}
}
