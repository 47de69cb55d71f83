//! DateiLager client binary: config resolution, gRPC channel setup and
//! dispatch to one handler per CLI subcommand (spec §6 "client" CLI
//! surface).

#[macro_use]
extern crate tracing;

mod cli;
mod commands;
mod grpc;
mod sync;

use clap::{CommandFactory, Parser};
use dl_cache::CacheDir;
use dl_util::error::Error;

use cli::{Command, Opt};

#[tokio::main]
async fn main() {
	dl_util::version::init_version(option_env!("GIT_VERSION").unwrap_or("unknown"));

	let opt = Opt::parse();
	dl_util::tracing_setup::init("dl_client=info");

	if let Err(e) = run(opt).await {
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
}

async fn run(opt: Opt) -> Result<(), Error> {
	// `version` and `completions` need neither a server connection nor a
	// cache directory; every other subcommand does.
	match &opt.command {
		Command::Version => {
			println!("{}", dl_util::version::dateilager_version());
			return Ok(());
		}
		Command::Completions { shell } => {
			clap_complete::generate(*shell, &mut Opt::command(), "dl-client", &mut std::io::stdout());
			return Ok(());
		}
		_ => {}
	}

	let config = load_config(&opt)?;
	let server = config.server.ok_or(Error::Message(
		"no server address: set it in the config file, pass --server, or set DL_ENV_SERVER".into(),
	))?;

	debug!("Connecting to server {}", server);
	let mut client = grpc::connect(&server).await?;

	match opt.command {
		Command::New { project, template, pack_patterns } => commands::new::run(&mut client, project, template, pack_patterns).await,
		Command::Get { project, dir, to, ignores } => commands::get::run(&mut client, project, dir, to, ignores).await,
		Command::Rebuild { project, dir, to, ignores } => {
			let cache = open_cache(&config)?;
			commands::rebuild::run(&mut client, &cache, project, dir, to, ignores).await
		}
		Command::Update { project, dir, ignores } => {
			let cache = open_cache(&config)?;
			commands::update::run(&mut client, &cache, project, dir, ignores).await
		}
		Command::Inspect { project } => commands::inspect::run(&mut client, project).await,
		Command::Snapshot => commands::snapshot::run(&mut client).await,
		Command::Reset { state } => commands::reset::run(&mut client, state).await,
		Command::Gc(gc) => commands::gc::run(&mut client, gc).await,
		Command::Getcache => {
			let cache = open_cache(&config)?;
			commands::getcache::run(&mut client, &cache).await
		}
		Command::Version | Command::Completions { .. } => unreachable!("handled above"),
	}
}

fn open_cache(config: &dl_util::config::ClientConfig) -> Result<CacheDir, Error> {
	let dir = config
		.cache_dir
		.clone()
		.or_else(dirs_next_cache_dir)
		.ok_or(Error::Message(
			"no cache directory: set it in the config file, pass --cache-dir, or set DL_ENV_CACHE_DIR".into(),
		))?;
	CacheDir::open(dir)
}

/// `~/.cache/dateilager`, the default cache root when nothing else is
/// configured.
fn dirs_next_cache_dir() -> Option<std::path::PathBuf> {
	std::env::var_os("HOME").map(|home| std::path::PathBuf::from(home).join(".cache").join("dateilager"))
}

fn load_config(opt: &Opt) -> Result<dl_util::config::ClientConfig, Error> {
	let mut config: dl_util::config::ClientConfig = if opt.config.exists() {
		dl_util::config::read_toml(&opt.config)?
	} else {
		dl_util::config::ClientConfig::default()
	};

	if let Some(v) = &opt.server {
		config.server = Some(v.clone());
	}
	if let Some(v) = &opt.cache_dir {
		config.cache_dir = Some(v.clone());
	}
	if dl_util::config::skip_ssl_verification() {
		config.skip_ssl_verification = true;
	}

	Ok(config)
}
