//! CLI flags for the server binary. Each one overrides the matching
//! config-file / environment-variable setting, the same file-then-env-
//! then-flag precedence `dl_util::config` documents.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dl-server", about = "DateiLager server")]
pub struct Opt {
	/// Path to the layered TOML config file.
	#[arg(short, long, env = "DL_CONFIG_FILE", default_value = "/etc/dateilager.toml")]
	pub config: PathBuf,

	#[arg(long, env = "DL_LISTEN_ADDR")]
	pub listen_addr: Option<String>,

	#[arg(long, env = "DL_ENV_DATABASE_URL")]
	pub database_url: Option<String>,

	#[arg(long, env = "DL_ENV_DB_POOL_SIZE")]
	pub db_pool_size: Option<u32>,

	#[arg(long, env = "DL_ENV_TLS_CERT")]
	pub tls_cert: Option<PathBuf>,

	#[arg(long, env = "DL_ENV_TLS_KEY")]
	pub tls_key: Option<PathBuf>,

	#[arg(long, env = "DL_ENV_PASETO_PUBLIC_KEY")]
	pub paseto_public_key: Option<PathBuf>,

	/// Bind address for the Prometheus `/metrics` endpoint (requires the
	/// `metrics` feature).
	#[arg(long, env = "DL_ENV_METRICS_ADDR")]
	pub metrics_addr: Option<String>,
}
