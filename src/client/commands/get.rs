//! `get`: a one-shot, unincremental materialize via the plain (uncompressed)
//! `Get` RPC — no `.dl/` metadata is written, unlike `rebuild`.

use std::path::{Path, PathBuf};

use dl_rpc::pb;
use dl_util::error::{Error, ErrContext};

use crate::grpc::Client;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;

pub async fn run(
	client: &mut Client,
	project: i64,
	dir: PathBuf,
	to: Option<i64>,
	ignores: Vec<String>,
) -> Result<(), Error> {
	std::fs::create_dir_all(&dir).err_context(format!("unable to create {}", dir.display()))?;

	let request = pb::GetRequest {
		project,
		from_version: None,
		to_version: to,
		queries: vec![pb::ObjectQuery { path: String::new(), is_prefix: true, ignores, with_content: true }],
	};

	let mut stream = client.get(request).await.map_err(Error::from)?.into_inner();

	let mut count = 0u64;
	while let Some(response) = stream.message().await.map_err(Error::from)? {
		if let Some(object) = response.object {
			write_object(&dir, &object)?;
			count += 1;
		}
	}

	println!("wrote {} objects to {}", count, dir.display());
	Ok(())
}

fn write_object(root: &Path, object: &pb::Object) -> Result<(), Error> {
	let target = root.join(&object.path);

	if object.deleted {
		let _ = std::fs::remove_file(&target);
		return Ok(());
	}

	if let Some(parent) = target.parent() {
		std::fs::create_dir_all(parent).err_context(format!("unable to create parent directory for {}", object.path))?;
	}

	let file_type = object.mode & S_IFMT;
	if file_type == S_IFDIR {
		std::fs::create_dir_all(&target).err_context(format!("unable to create directory {}", object.path))?;
	} else if file_type == S_IFLNK {
		let content = object.content.clone().unwrap_or_default();
		let link_target = String::from_utf8_lossy(&content).into_owned();
		let _ = std::fs::remove_file(&target);
		#[cfg(unix)]
		std::os::unix::fs::symlink(&link_target, &target)
			.err_context(format!("unable to create symlink {}", object.path))?;
		return Ok(());
	} else {
		let content = object.content.clone().unwrap_or_default();
		std::fs::write(&target, &content).err_context(format!("unable to write {}", object.path))?;
	}

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		std::fs::set_permissions(&target, std::fs::Permissions::from_mode(object.mode & 0o7777))
			.err_context(format!("unable to set mode on {}", object.path))?;
	}

	Ok(())
}
