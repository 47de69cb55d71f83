//! Tracing initialization, shared by the server and client binaries.
//! Mirrors the `tracing_subscriber::fmt()...init()` call in the teacher's
//! `garage/main.rs`, including the "set a sane default when RUST_LOG is
//! unset" behavior.

pub fn init(default_directives: &str) {
	if std::env::var("RUST_LOG").is_err() {
		std::env::set_var("RUST_LOG", default_directives);
	}
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
		.init();
}
