use dl_rpc::pb;
use dl_util::error::Error;

use crate::grpc::Client;

pub async fn run(client: &mut Client, project: i64) -> Result<(), Error> {
	let response = client
		.inspect(pb::InspectRequest { project })
		.await
		.map_err(Error::from)?
		.into_inner();

	format_table::format_table(vec![
		"LATEST VERSION\tLIVE OBJECTS\tTOTAL OBJECTS".to_string(),
		format!("{}\t{}\t{}", response.latest_version, response.live_objects_count, response.total_objects_count),
	]);
	Ok(())
}
