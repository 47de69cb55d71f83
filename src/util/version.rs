//! Build/version metadata exposed through the `version` CLI subcommand,
//! mirroring `garage_util::version` + the `option_env!("GIT_VERSION")`
//! fallback chain in the teacher's `garage/main.rs`.

use std::sync::OnceLock;

static VERSION: OnceLock<String> = OnceLock::new();

pub fn init_version(git_version: &str) {
	let _ = VERSION.set(format!("{} ({})", env!("CARGO_PKG_VERSION"), git_version));
}

pub fn dateilager_version() -> &'static str {
	VERSION.get().map(|s| s.as_str()).unwrap_or("unknown")
}
