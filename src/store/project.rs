//! Project lifecycle: creation (optionally cloned from a template),
//! deletion, snapshot/reset, and explicit cloning (spec §6
//! `NewProjectRequest`, `DeleteProjectRequest`, `SnapshotRequest`,
//! `ResetRequest`, `CloneToProject`).

use dl_db::queries;
use dl_util::error::{Error, ErrContext};

use crate::Store;

impl Store {
	pub async fn new_project(
		&self,
		id: i64,
		template: Option<i64>,
		pack_patterns: Vec<String>,
	) -> Result<(), Error> {
		queries::create_project(&self.db.pool, id, &pack_patterns).await?;
		if let Some(source) = template {
			let source_row = queries::get_project(&self.db.pool, source)
				.await?
				.ok_or_else(|| Error::NotFound(format!("template project {}", source)))?;
			let mut tx = self
				.db
				.pool
				.begin()
				.await
				.err_context("unable to start transaction")?;
			queries::clone_project_objects(&mut tx, source, source_row.latest_version, id).await?;
			tx.commit().await.err_context("unable to commit project clone")?;
		}
		Ok(())
	}

	pub async fn delete_project(&self, id: i64) -> Result<(), Error> {
		queries::delete_project(&self.db.pool, id).await
	}

	pub async fn snapshot(&self) -> Result<Vec<(i64, i64)>, Error> {
		queries::snapshot(&self.db.pool).await
	}

	pub async fn reset(&self, projects: Vec<(i64, i64)>) -> Result<(), Error> {
		for (id, version) in projects {
			queries::reset_project(&self.db.pool, id, version).await?;
		}
		Ok(())
	}

	pub async fn clone_to_project(
		&self,
		source: i64,
		target: i64,
		version: i64,
	) -> Result<i64, Error> {
		if queries::get_project(&self.db.pool, target).await?.is_none() {
			queries::create_project(&self.db.pool, target, &[]).await?;
		}
		let mut tx = self
			.db
			.pool
			.begin()
			.await
			.err_context("unable to start transaction")?;
		let latest = queries::clone_project_objects(&mut tx, source, version, target).await?;
		tx.commit().await.err_context("unable to commit clone")?;
		Ok(latest)
	}

	pub async fn inspect(&self, project: i64) -> Result<queries::InspectCounts, Error> {
		queries::inspect_project(&self.db.pool, project).await
	}
}
