use dl_rpc::pb;
use dl_util::error::Error;

use crate::cli::GcCommand;
use crate::grpc::Client;

pub async fn run(client: &mut Client, command: GcCommand) -> Result<(), Error> {
	let count = match command {
		GcCommand::Contents { sample } => {
			client.gc_contents(pb::GcContentsRequest { sample }).await.map_err(Error::from)?.into_inner().count
		}
		GcCommand::Project { project, keep, from } => client
			.gc_project(pb::GcProjectRequest { project, keep, from_version: from })
			.await
			.map_err(Error::from)?
			.into_inner()
			.count,
		GcCommand::RandomProjects { sample, keep, from } => client
			.gc_random_projects(pb::GcRandomProjectsRequest { sample, keep, from_version: from })
			.await
			.map_err(Error::from)?
			.into_inner()
			.count,
	};

	println!("reclaimed {} item(s)", count);
	Ok(())
}
