use dl_rpc::pb;
use dl_util::error::Error;

use crate::grpc::Client;

pub async fn run(client: &mut Client, project: i64, template: Option<i64>, pack_patterns: Vec<String>) -> Result<(), Error> {
	client
		.new_project(pb::NewProjectRequest { id: project, template, pack_patterns })
		.await
		.map_err(Error::from)?;
	println!("created project {}", project);
	Ok(())
}
