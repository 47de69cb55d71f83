use dl_rpc::pb;
use dl_util::error::Error;

use crate::grpc::Client;

/// Parse the exact `id=ver,id=ver,...` shape `snapshot` prints and reset
/// each named project to it.
pub async fn run(client: &mut Client, state: String) -> Result<(), Error> {
	let mut projects = Vec::new();
	for entry in state.split(',').filter(|s| !s.is_empty()) {
		let (id, version) = entry
			.split_once('=')
			.ok_or_else(|| Error::Message(format!("malformed snapshot entry {:?}: expected id=version", entry)))?;
		let id: i64 = id.parse().map_err(|_| Error::Message(format!("malformed project id {:?}", id)))?;
		let version: i64 = version.parse().map_err(|_| Error::Message(format!("malformed version {:?}", version)))?;
		projects.push(pb::ProjectVersion { id, version });
	}

	client.reset(pb::ResetRequest { projects }).await.map_err(Error::from)?;
	println!("reset {} project(s)", state.split(',').filter(|s| !s.is_empty()).count());
	Ok(())
}
