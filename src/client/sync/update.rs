//! Parallel `Update` (spec §4.4): an update-producer hands out diff
//! entries, object-workers package each into a wire `Object` (reading its
//! body from the in-memory cache `walk_and_diff` already populated), and a
//! single stream-sender forwards them to the server in arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use dl_rpc::pb;
use dl_util::error::Error;

use crate::grpc::Client;

use super::diff::DiffEntry;

const CHANNEL_BUFFER: usize = 64;

/// Worker pool size: "about half the available CPUs" (spec §4.4), never
/// less than one.
pub fn default_worker_count() -> usize {
	(num_cpus::get() / 2).max(1)
}

/// Stream `diff` to the server as one `Update` call, returning the new
/// version. If the server's returned version isn't exactly
/// `local_version + 1`, the caller must re-run `Rebuild` against the new
/// version (spec §4.4: another writer interleaved with this one).
pub async fn run(
	client: &mut Client,
	project: i64,
	diff: Vec<DiffEntry>,
	bodies: HashMap<String, Vec<u8>>,
	worker_count: usize,
) -> Result<i64, Error> {
	if diff.is_empty() {
		return Err(Error::Message("no-op update: empty diff".into()));
	}

	let (tx, rx) = mpsc::channel::<pb::UpdateRequest>(CHANNEL_BUFFER);
	let queue = Arc::new(Mutex::new(diff.into_iter()));
	let bodies = Arc::new(bodies);

	let mut workers = Vec::with_capacity(worker_count);
	for _ in 0..worker_count {
		let queue = queue.clone();
		let bodies = bodies.clone();
		let tx = tx.clone();
		workers.push(tokio::spawn(async move {
			loop {
				let entry = {
					let mut guard = queue.lock().await;
					guard.next()
				};
				let Some(entry) = entry else { break };
				let request = encode(project, entry, &bodies);
				if tx.send(request).await.is_err() {
					break;
				}
			}
		}));
	}
	drop(tx);

	let response = client
		.update(tonic::Request::new(ReceiverStream::new(rx)))
		.await
		.map_err(Error::from)?;

	for worker in workers {
		let _ = worker.await;
	}

	Ok(response.into_inner().version)
}

fn encode(project: i64, entry: DiffEntry, bodies: &HashMap<String, Vec<u8>>) -> pb::UpdateRequest {
	let object = match entry {
		DiffEntry::Removed { path } => {
			pb::Object { path, mode: 0, size: 0, deleted: true, content: None, pack_path: None }
		}
		DiffEntry::Added { path, mode } | DiffEntry::Modified { path, mode } => {
			let content = bodies.get(&path).cloned().unwrap_or_default();
			let size = content.len() as i64;
			pb::Object { path, mode, size, deleted: false, content: Some(content), pack_path: None }
		}
	};
	pb::UpdateRequest { project, object: Some(object) }
}
