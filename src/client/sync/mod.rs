//! The client sync engine (spec §4.4): `Rebuild` materializes a tree from
//! scratch (or catches it up after a version mismatch), `Update` diffs a
//! working tree against its last-known summary and streams the result to
//! the server.

pub mod diff;
pub mod metadata;
pub mod rebuild;
pub mod summary;
pub mod update;
pub mod walk;

use std::path::Path;

use dl_cache::CacheDir;
use dl_rpc::pb;
use dl_util::error::Error;

use crate::grpc::Client;
use metadata::Metadata;
use rebuild::RebuildPlan;

/// Materialize `root` up to `to_version` (or the latest, if `None`),
/// using whatever the cache already holds to avoid re-downloading packs
/// the client has seen before (spec §4.4 step 1 "available_cache_versions").
pub async fn rebuild_tree(
	client: &mut Client,
	cache: &CacheDir,
	root: &Path,
	project: i64,
	to_version: Option<i64>,
	ignores: Vec<String>,
) -> Result<i64, Error> {
	let meta = Metadata::open(root);
	let local_version = meta.read_version()?;

	// Spec §4.4 step 2: a rebuild that's already at the requested version
	// is a no-op, not a re-fetch.
	if let Some(to) = to_version {
		if to == local_version {
			return Ok(local_version);
		}
	}

	let available_cache_versions = cache.local_versions()?;

	let request = pb::GetCompressRequest {
		project,
		from_version: Some(local_version),
		to_version,
		queries: vec![pb::ObjectQuery {
			path: String::new(),
			is_prefix: true,
			ignores: ignores.clone(),
			with_content: true,
		}],
		available_cache_versions,
	};

	let mut stream = client.get_compress(request).await.map_err(Error::from)?.into_inner();

	// The server's very first frame carries the version this rebuild is
	// materializing to; every subsequent frame carries the same value.
	let first = match stream.message().await.map_err(Error::from)? {
		Some(frame) => frame,
		None => return Err(Error::Message(format!("project {} has no committed version", project))),
	};
	let version = first.version;

	info!("Rebuilding project {} at {} (local version {})", project, root.display(), local_version);
	let plan = RebuildPlan { root, cache, worker_count: rebuild::default_worker_count() };
	rebuild::apply_stream(&plan, SingleFrameThenStream { first: Some(first), rest: stream }).await?;

	meta.write_version(version)?;
	meta.write_summary(&walk::walk_and_diff(root, &summary::Summary::default(), &ignores)?.summary)?;

	let _lock = cache.lock()?;
	cache.add_version(version)?;

	Ok(version)
}

/// Diff `root` against its recorded summary and send the result as one
/// `Update` call. Returns `(new_version, rebuilt)`: `rebuilt` is true if
/// the server's version didn't match `local_version + 1` and this
/// function had to fall back to a full `Rebuild` to reconcile.
pub async fn update_tree(
	client: &mut Client,
	cache: &CacheDir,
	root: &Path,
	project: i64,
	ignores: Vec<String>,
) -> Result<(i64, bool), Error> {
	let meta = Metadata::open(root);
	let local_version = meta.read_version()?;
	let old_summary = meta.read_summary()?;

	let outcome = walk::walk_and_diff(root, &old_summary, &ignores)?;
	if outcome.diff.is_empty() {
		debug!("Update on project {}: working tree unchanged, nothing to send", project);
		return Ok((local_version, false));
	}
	meta.write_diff_debug(&outcome.diff);

	info!("Updating project {}: {} changed paths", project, outcome.diff.len());
	let new_version = update::run(client, project, outcome.diff, outcome.bodies, update::default_worker_count()).await?;

	if new_version != local_version + 1 {
		// Another writer landed an update we hadn't pulled in yet; our
		// diff was computed against a stale base. Fall back to a full
		// rebuild against the version the server just accepted rather
		// than risk silently dropping the interleaved writer's changes.
		warn!(
			"Update on project {} landed at version {} (expected {}); falling back to rebuild",
			project,
			new_version,
			local_version + 1
		);
		let rebuilt = rebuild_tree(client, cache, root, project, Some(new_version), ignores).await?;
		return Ok((rebuilt, true));
	}

	meta.write_version(new_version)?;
	meta.write_summary(&outcome.summary)?;
	Ok((new_version, false))
}

/// Adapts a stream whose first item has already been consumed back into
/// something `apply_stream` can drain uniformly.
struct SingleFrameThenStream<S> {
	first: Option<pb::GetCompressResponse>,
	rest: S,
}

impl<S> futures::Stream for SingleFrameThenStream<S>
where
	S: futures::Stream<Item = Result<pb::GetCompressResponse, tonic::Status>> + Unpin,
{
	type Item = Result<pb::GetCompressResponse, tonic::Status>;

	fn poll_next(
		mut self: std::pin::Pin<&mut Self>,
		cx: &mut std::task::Context<'_>,
	) -> std::task::Poll<Option<Self::Item>> {
		if let Some(frame) = self.first.take() {
			return std::task::Poll::Ready(Some(Ok(frame)));
		}
		std::pin::Pin::new(&mut self.rest).poll_next(cx)
	}
}
