//! DateiLager server binary: config, TLS, database pool, service wiring
//! and health endpoint (spec §6 "server" CLI surface; SPEC_FULL §6
//! ambient logging/panic/config additions).

#[macro_use]
extern crate tracing;

mod cli;
#[cfg(feature = "metrics")]
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tonic::transport::{Identity, Server, ServerTlsConfig};

use dl_rpc::pb::fs_server::FsServer;
use dl_rpc::{interceptors, FsService};
use dl_store::Store;
use dl_util::auth::TokenVerifier;
use dl_util::config::ServerConfig;
use dl_util::error::{Error, ErrContext};

#[tokio::main]
async fn main() {
	dl_util::version::init_version(option_env!("GIT_VERSION").unwrap_or("unknown"));
	install_panic_hook();

	let opt = cli::Opt::parse();
	dl_util::tracing_setup::init("dl_rpc=info,dl_server=info");

	if let Err(e) = run(opt).await {
		error!("fatal error: {}", e);
		std::process::exit(1);
	}
}

/// Abort rather than let a half-initialized Tokio runtime limp on: a
/// server that panicked mid-transaction cannot be trusted to hold
/// Update's single-writer-per-project guarantee (spec §9 "global
/// state"). A process supervisor is expected to restart it clean.
fn install_panic_hook() {
	let version = dl_util::version::dateilager_version().to_string();
	std::panic::set_hook(Box::new(move |panic_info| {
		eprintln!("======== PANIC (internal dateilager error) ========");
		eprintln!("{}", panic_info);
		eprintln!();
		eprintln!("dateilager version: {}", version);
		eprintln!();
		eprintln!("backtrace:");
		eprintln!("{:?}", backtrace::Backtrace::new());
		std::process::abort();
	}));
}

async fn run(opt: cli::Opt) -> Result<(), Error> {
	let config = load_config(&opt)?;

	let db = Arc::new(dl_db::Db::connect(&config.database_url, config.db_pool_size).await?);
	db.migrate().await?;
	let store = Store::new(db);

	let listen_addr: SocketAddr = config
		.listen_addr
		.parse()
		.err_context(format!("invalid listen address {}", config.listen_addr))?;

	let service = FsService::new(store);

	let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
	health_reporter
		.set_serving::<FsServer<FsService>>()
		.await;

	let mut builder = Server::builder()
		.layer(interceptors::panic_recovery_layer())
		.layer(interceptors::tracing_layer())
		.layer(interceptors::StructuredLoggingLayer);

	if let (Some(cert_path), Some(key_path)) = (&config.tls_cert, &config.tls_key) {
		let cert = std::fs::read(cert_path).err_context("unable to read TLS certificate")?;
		let key = std::fs::read(key_path).err_context("unable to read TLS key")?;
		builder = builder
			.tls_config(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
			.err_context("invalid TLS configuration")?;
	} else {
		warn!("starting without TLS: tls_cert/tls_key not configured");
	}

	#[cfg(feature = "metrics")]
	if let Some(addr) = &opt.metrics_addr {
		let addr: SocketAddr = addr.parse().err_context("invalid metrics address")?;
		tokio::spawn(metrics::run(addr));
	}

	let fs_server = if let Some(public_key_path) = &config.paseto_public_key {
		let raw = std::fs::read(public_key_path).err_context("unable to read PASETO public key")?;
		let verifier = TokenVerifier::from_public_key_bytes(&raw)?;
		let interceptor = interceptors::AuthInterceptor::new(verifier);
		FsServer::with_interceptor(service, interceptor)
	} else {
		warn!("starting without auth: paseto_public_key not configured");
		// An unauthenticated deployment still needs a concrete
		// `FsServer<FsService>` type to match `health_reporter` above;
		// wrap it in a no-op interceptor that never rejects.
		FsServer::with_interceptor(service, interceptors::AuthInterceptor::passthrough())
	};

	info!("DateiLager server ({}) listening on {}", dl_util::version::dateilager_version(), listen_addr);

	builder
		.add_service(health_service)
		.add_service(fs_server)
		.serve_with_shutdown(listen_addr, shutdown_signal())
		.await
		.err_context("server terminated unexpectedly")
}

async fn shutdown_signal() {
	let _ = tokio::signal::ctrl_c().await;
	info!("shutdown signal received");
}

fn load_config(opt: &cli::Opt) -> Result<ServerConfig, Error> {
	let mut config: ServerConfig = if opt.config.exists() {
		dl_util::config::read_toml(&opt.config)?
	} else {
		ServerConfig {
			listen_addr: "0.0.0.0:5051".to_string(),
			database_url: String::new(),
			db_pool_size: 60,
			tls_cert: None,
			tls_key: None,
			paseto_public_key: None,
			cache_dir: None,
			default_pack_patterns: Vec::new(),
		}
	};

	if let Some(v) = &opt.listen_addr {
		config.listen_addr = v.clone();
	}
	if let Some(v) = &opt.database_url {
		config.database_url = v.clone();
	}
	if let Some(v) = opt.db_pool_size {
		config.db_pool_size = v;
	}
	if let Some(v) = &opt.tls_cert {
		config.tls_cert = Some(v.clone());
	}
	if let Some(v) = &opt.tls_key {
		config.tls_key = Some(v.clone());
	}
	if let Some(v) = &opt.paseto_public_key {
		config.paseto_public_key = Some(v.clone());
	}

	if config.database_url.is_empty() {
		return Err(Error::Message(
			"no database_url configured: set it in the config file or pass --database-url".into(),
		));
	}

	Ok(config)
}
