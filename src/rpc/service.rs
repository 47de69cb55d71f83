//! The generated `Fs` service trait, implemented directly against
//! `dl_store::Store`. This is the one place in the workspace that knows
//! both the wire shapes and the store API; everything else sees one side
//! or the other.

use std::pin::Pin;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use dl_store::types::UpdateObject;
use dl_store::Store;

use crate::conv;
use crate::pb;
use crate::pb::fs_server::Fs;

pub struct FsService {
	pub store: Store,
}

impl FsService {
	pub fn new(store: Store) -> Self {
		Self { store }
	}
}

/// Channel depth for streaming responses: bounds how many frames the
/// server can buffer ahead of a slow client, matching the "consumers
/// must not buffer unbounded numbers of frames" rule in spec §4.3.
const STREAM_BUFFER: usize = 16;

#[tonic::async_trait]
impl Fs for FsService {
	async fn new_project(
		&self,
		request: Request<pb::NewProjectRequest>,
	) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		self.store
			.new_project(req.id, req.template, req.pack_patterns)
			.await
			.map_err(Status::from)?;
		Ok(Response::new(pb::Empty {}))
	}

	async fn delete_project(
		&self,
		request: Request<pb::DeleteProjectRequest>,
	) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		self.store.delete_project(req.project).await.map_err(Status::from)?;
		Ok(Response::new(pb::Empty {}))
	}

	type GetStream = Pin<Box<dyn Stream<Item = Result<pb::GetResponse, Status>> + Send + 'static>>;

	async fn get(&self, request: Request<pb::GetRequest>) -> Result<Response<Self::GetStream>, Status> {
		let req = request.into_inner();
		let queries = conv::queries_from_pb(req.queries);
		let (_to, objects) = self
			.store
			.get(req.project, req.from_version, req.to_version, &queries)
			.await
			.map_err(Status::from)?;

		let (tx, rx) = mpsc::channel(STREAM_BUFFER);
		tokio::spawn(async move {
			for object in objects {
				let response = pb::GetResponse { object: Some(object.into()) };
				if tx.send(Ok(response)).await.is_err() {
					break;
				}
			}
		});

		Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
	}

	type GetCompressStream =
		Pin<Box<dyn Stream<Item = Result<pb::GetCompressResponse, Status>> + Send + 'static>>;

	async fn get_compress(
		&self,
		request: Request<pb::GetCompressRequest>,
	) -> Result<Response<Self::GetCompressStream>, Status> {
		let req = request.into_inner();
		let queries = conv::queries_from_pb(req.queries);
		let frames = self
			.store
			.get_compress(
				req.project,
				req.from_version,
				req.to_version,
				&queries,
				&req.available_cache_versions,
				dl_store::MAX_MESSAGE_SIZE,
			)
			.await
			.map_err(Status::from)?;

		let (tx, rx) = mpsc::channel(STREAM_BUFFER);
		tokio::spawn(async move {
			for frame in frames {
				if tx.send(Ok(frame.into())).await.is_err() {
					break;
				}
			}
		});

		Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
	}

	async fn update(
		&self,
		request: Request<Streaming<pb::UpdateRequest>>,
	) -> Result<Response<pb::UpdateResponse>, Status> {
		let mut stream = request.into_inner();
		let mut project = None;
		let mut objects = Vec::new();

		while let Some(item) = stream.message().await? {
			let pid = item.project;
			match project {
				None => project = Some(pid),
				Some(p) if p == pid => {}
				Some(_) => {
					return Err(Status::invalid_argument(
						"every UpdateRequest in a stream must target the same project",
					))
				}
			}
			let object = item
				.object
				.ok_or_else(|| Status::invalid_argument("update request missing object"))?;
			objects.push(UpdateObject::from(object));
		}

		let project = project.ok_or_else(|| Status::invalid_argument("empty update stream"))?;
		let version = self.store.update(project, objects).await.map_err(Status::from)?;
		Ok(Response::new(pb::UpdateResponse { version }))
	}

	async fn inspect(
		&self,
		request: Request<pb::InspectRequest>,
	) -> Result<Response<pb::InspectResponse>, Status> {
		let req = request.into_inner();
		let counts = self.store.inspect(req.project).await.map_err(Status::from)?;
		Ok(Response::new(pb::InspectResponse {
			latest_version: counts.latest_version,
			live_objects_count: counts.live_objects_count,
			total_objects_count: counts.total_objects_count,
		}))
	}

	async fn snapshot(
		&self,
		_request: Request<pb::SnapshotRequest>,
	) -> Result<Response<pb::SnapshotResponse>, Status> {
		let projects = self.store.snapshot().await.map_err(Status::from)?;
		Ok(Response::new(pb::SnapshotResponse {
			projects: conv::project_versions_to_pb(projects),
		}))
	}

	async fn reset(&self, request: Request<pb::ResetRequest>) -> Result<Response<pb::Empty>, Status> {
		let req = request.into_inner();
		self.store
			.reset(conv::project_versions_from_pb(req.projects))
			.await
			.map_err(Status::from)?;
		Ok(Response::new(pb::Empty {}))
	}

	type GetCacheStream =
		Pin<Box<dyn Stream<Item = Result<pb::GetCacheResponse, Status>> + Send + 'static>>;

	async fn get_cache(
		&self,
		_request: Request<pb::GetCacheRequest>,
	) -> Result<Response<Self::GetCacheStream>, Status> {
		let (version, packs) = self.store.get_cache().await.map_err(Status::from)?;

		let (tx, rx) = mpsc::channel(STREAM_BUFFER);
		tokio::spawn(async move {
			for (hash, bytes) in packs {
				let response = pb::GetCacheResponse {
					version,
					hash: hash.as_bytes().to_vec(),
					bytes,
				};
				if tx.send(Ok(response)).await.is_err() {
					break;
				}
			}
		});

		Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
	}

	async fn gc_contents(
		&self,
		request: Request<pb::GcContentsRequest>,
	) -> Result<Response<pb::GcResponse>, Status> {
		let req = request.into_inner();
		let count = self.store.gc_contents(req.sample).await.map_err(Status::from)?;
		Ok(Response::new(pb::GcResponse { count }))
	}

	async fn gc_project(
		&self,
		request: Request<pb::GcProjectRequest>,
	) -> Result<Response<pb::GcResponse>, Status> {
		let req = request.into_inner();
		let count = self
			.store
			.gc_project(req.project, req.keep, req.from_version)
			.await
			.map_err(Status::from)?;
		Ok(Response::new(pb::GcResponse { count }))
	}

	async fn gc_random_projects(
		&self,
		request: Request<pb::GcRandomProjectsRequest>,
	) -> Result<Response<pb::GcResponse>, Status> {
		let req = request.into_inner();
		let count = self
			.store
			.gc_random_projects(req.sample, req.keep, req.from_version)
			.await
			.map_err(Status::from)?;
		Ok(Response::new(pb::GcResponse { count }))
	}

	async fn clone_to_project(
		&self,
		request: Request<pb::CloneToProjectRequest>,
	) -> Result<Response<pb::CloneToProjectResponse>, Status> {
		let req = request.into_inner();
		let latest_version = self
			.store
			.clone_to_project(req.source, req.target, req.version)
			.await
			.map_err(Status::from)?;
		Ok(Response::new(pb::CloneToProjectResponse { latest_version }))
	}
}
