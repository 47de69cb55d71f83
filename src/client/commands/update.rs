use std::path::PathBuf;

use dl_cache::CacheDir;
use dl_util::error::Error;

use crate::grpc::Client;
use crate::sync;

pub async fn run(
	client: &mut Client,
	cache: &CacheDir,
	project: i64,
	dir: PathBuf,
	ignores: Vec<String>,
) -> Result<(), Error> {
	let (version, rebuilt) = sync::update_tree(client, cache, &dir, project, ignores).await?;
	if rebuilt {
		println!("update raced a concurrent writer; rebuilt project {} to version {}", project, version);
	} else {
		println!("updated project {} to version {}", project, version);
	}
	Ok(())
}
