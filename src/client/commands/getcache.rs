//! `getcache`: download the current cache version's packs into the local
//! cache directory (spec §4.1 "Contract — GetCache", §4.5).

use dl_cache::CacheDir;
use dl_rpc::pb;
use dl_util::error::{Error, OkOrMessage};
use dl_util::hash::Hash;

use crate::grpc::Client;

pub async fn run(client: &mut Client, cache: &CacheDir) -> Result<(), Error> {
	let mut stream = client.get_cache(pb::GetCacheRequest {}).await.map_err(Error::from)?.into_inner();

	let first = stream.message().await.map_err(Error::from)?.ok_or_message("empty GetCache stream: no cache version header")?;
	let version = first.version;

	if cache.has_version(version)? {
		println!("cache version {} already held locally", version);
		return Ok(());
	}

	let lock = cache.lock()?;
	let mut count = 0u64;
	extract(cache, &lock, &first)?;
	count += 1;

	while let Some(frame) = stream.message().await.map_err(Error::from)? {
		extract(cache, &lock, &frame)?;
		count += 1;
	}

	cache.add_version(version)?;
	println!("fetched cache version {} ({} pack(s))", version, count);
	Ok(())
}

fn extract(cache: &CacheDir, _lock: &dl_cache::CacheLock, frame: &pb::GetCacheResponse) -> Result<(), Error> {
	let hash = Hash::try_from(frame.hash.as_slice())?;
	cache.extract_pack(&hash, &frame.bytes)
}
