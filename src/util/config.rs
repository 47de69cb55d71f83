//! Layered configuration: TOML file, overridden by environment variables,
//! overridden by CLI flags. Mirrors `garage_util::config` + the
//! `fill_secrets` pattern in the teacher's `garage/main.rs`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
	/// Address the gRPC listener binds to.
	#[serde(default = "default_listen_addr")]
	pub listen_addr: String,

	/// Postgres connection string.
	pub database_url: String,

	/// Maximum number of pooled database connections. Spec default: 60.
	#[serde(default = "default_pool_size")]
	pub db_pool_size: u32,

	/// TLS certificate and key, optional in dev.
	pub tls_cert: Option<PathBuf>,
	pub tls_key: Option<PathBuf>,

	/// Path to the published PASETO v4 Ed25519 public key used to verify
	/// bearer tokens in the auth interceptor.
	pub paseto_public_key: Option<PathBuf>,

	/// Root directory under which content-addressed cache packs are
	/// exploded when the server itself keeps a local cache warm.
	#[serde(default)]
	pub cache_dir: Option<PathBuf>,

	/// Default pack patterns applied to newly created projects that don't
	/// specify their own.
	#[serde(default)]
	pub default_pack_patterns: Vec<String>,
}

fn default_listen_addr() -> String {
	"0.0.0.0:5051".to_string()
}

fn default_pool_size() -> u32 {
	60
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
	pub server: Option<String>,
	#[serde(default)]
	pub skip_ssl_verification: bool,
	pub cache_dir: Option<PathBuf>,
}

pub fn read_toml<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, Error> {
	let path = path.as_ref();
	let data = std::fs::read_to_string(path)
		.err_context(format!("unable to read config file {}", path.display()))?;
	toml::from_str(&data).err_context(format!("unable to parse config file {}", path.display()))
}

/// Resolve the bearer token the way the spec's §6 Environment section
/// demands: `DL_TOKEN` directly, or the file named by `DL_TOKEN_FILE`.
pub fn resolve_token() -> Result<String, Error> {
	if let Ok(tok) = std::env::var("DL_TOKEN") {
		return Ok(tok);
	}
	if let Ok(path) = std::env::var("DL_TOKEN_FILE") {
		return std::fs::read_to_string(&path)
			.map(|s| s.trim().to_string())
			.err_context(format!("unable to read token file {}", path));
	}
	Err(Error::Message(
		"no auth token: set DL_TOKEN or DL_TOKEN_FILE".into(),
	))
}

pub fn skip_ssl_verification() -> bool {
	std::env::var("DL_SKIP_SSL_VERIFICATION")
		.map(|v| v == "1")
		.unwrap_or(false)
}
