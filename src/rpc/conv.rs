//! Conversions between the generated protobuf shapes and the
//! wire-agnostic types `dl_store` works with. Nothing outside this module
//! (and `dl_tar`, for TAR bytes) should import `crate::pb` — keeping the
//! boundary here is what lets `dl_store` stay free of tonic/prost.

use dl_store::types::{Frame, Object, ObjectQuery, UpdateObject};

use crate::pb;

impl From<pb::ObjectQuery> for ObjectQuery {
	fn from(q: pb::ObjectQuery) -> Self {
		ObjectQuery {
			prefix: q.path,
			is_prefix: q.is_prefix,
			ignores: q.ignores,
			with_content: q.with_content,
		}
	}
}

pub fn queries_from_pb(queries: Vec<pb::ObjectQuery>) -> Vec<ObjectQuery> {
	queries.into_iter().map(ObjectQuery::from).collect()
}

impl From<Object> for pb::Object {
	fn from(o: Object) -> Self {
		pb::Object {
			path: o.path,
			mode: o.mode,
			size: o.size,
			deleted: o.deleted,
			content: o.content,
			pack_path: o.pack_path,
		}
	}
}

impl From<pb::Object> for UpdateObject {
	fn from(o: pb::Object) -> Self {
		UpdateObject {
			path: o.path,
			mode: o.mode,
			size: o.size,
			deleted: o.deleted,
			content: o.content,
		}
	}
}

impl From<Frame> for pb::GetCompressResponse {
	fn from(f: Frame) -> Self {
		pb::GetCompressResponse {
			version: f.version,
			bytes: f.bytes,
			pack_path: f.pack_path,
		}
	}
}

pub fn project_versions_to_pb(projects: Vec<(i64, i64)>) -> Vec<pb::ProjectVersion> {
	projects
		.into_iter()
		.map(|(id, version)| pb::ProjectVersion { id, version })
		.collect()
}

pub fn project_versions_from_pb(projects: Vec<pb::ProjectVersion>) -> Vec<(i64, i64)> {
	projects.into_iter().map(|p| (p.id, p.version)).collect()
}
