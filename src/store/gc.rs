//! The three GC policies from spec §4.2: a deliberately non-exhaustive
//! content sweep, and two flavors of temporal-history coalescing scoped
//! to one or many projects.

use dl_db::queries;
use dl_util::error::Error;

use crate::Store;

impl Store {
	/// Sample a fraction of zero-referenced contents and delete them.
	/// Intentionally non-exhaustive to bound cost; callers run it
	/// periodically rather than expecting full reclamation in one pass.
	pub async fn gc_contents(&self, sample: f64) -> Result<i64, Error> {
		let deleted = queries::gc_contents(&self.db.pool, sample).await?;
		info!("GC contents: sampled {:.2}%, deleted {} unreferenced rows", sample * 100.0, deleted);
		Ok(deleted)
	}

	/// Keep the newest `keep` versions of `project` (and everything at or
	/// after `from`, if given); coalesce everything older by dropping
	/// rows whose lifespan closed before the oldest version retained.
	pub async fn gc_project(&self, project: i64, keep: i64, from: Option<i64>) -> Result<i64, Error> {
		let deleted = queries::gc_project(&self.db.pool, project, keep, from).await?;
		debug!("GC project {}: keep={}, from={:?}, coalesced {} rows", project, keep, from, deleted);
		Ok(deleted)
	}

	/// Apply `gc_project` to a uniformly sampled fraction of all
	/// projects.
	pub async fn gc_random_projects(
		&self,
		sample: f64,
		keep: i64,
		from: Option<i64>,
	) -> Result<i64, Error> {
		let ids = queries::sample_project_ids(&self.db.pool, sample).await?;
		info!("GC random projects: sampled {} of {:.2}%", ids.len(), sample * 100.0);
		let mut total = 0;
		for id in ids {
			total += queries::gc_project(&self.db.pool, id, keep, from).await?;
		}
		Ok(total)
	}
}
