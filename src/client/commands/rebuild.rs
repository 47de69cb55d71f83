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
	to: Option<i64>,
	ignores: Vec<String>,
) -> Result<(), Error> {
	std::fs::create_dir_all(&dir).map_err(|e| Error::Message(format!("unable to create {}: {}", dir.display(), e)))?;
	let version = sync::rebuild_tree(client, cache, &dir, project, to, ignores).await?;
	println!("rebuilt project {} to version {} in {}", project, version, dir.display());
	Ok(())
}
