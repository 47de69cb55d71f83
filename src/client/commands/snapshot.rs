use dl_rpc::pb;
use dl_util::error::Error;

use crate::grpc::Client;

/// Print every project's latest version as `id=ver,id=ver,...`, the exact
/// shape `reset` consumes (spec §6).
pub async fn run(client: &mut Client) -> Result<(), Error> {
	let response = client.snapshot(pb::SnapshotRequest {}).await.map_err(Error::from)?.into_inner();

	let state = response
		.projects
		.iter()
		.map(|p| format!("{}={}", p.id, p.version))
		.collect::<Vec<_>>()
		.join(",");

	println!("{}", state);
	Ok(())
}
