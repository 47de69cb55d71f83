//! CLI surface for the client binary (spec §6): `new | get | rebuild |
//! update | inspect | snapshot | reset | gc | getcache | version`. Each
//! one overrides the matching config-file / environment-variable setting,
//! same precedence as the server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dl-client", about = "DateiLager client")]
pub struct Opt {
	/// Path to the layered TOML config file.
	#[arg(short, long, env = "DL_CONFIG_FILE", default_value = "~/.dateilager.toml")]
	pub config: PathBuf,

	#[arg(long, env = "DL_ENV_SERVER")]
	pub server: Option<String>,

	#[arg(long, env = "DL_ENV_CACHE_DIR")]
	pub cache_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Create a new, empty project (optionally cloned from a template).
	New {
		project: i64,
		#[arg(long)]
		template: Option<i64>,
		#[arg(long = "pack-pattern")]
		pack_patterns: Vec<String>,
	},

	/// Materialize (or update) a project's tree into a local directory.
	Get {
		project: i64,
		dir: PathBuf,
		#[arg(long)]
		to: Option<i64>,
		#[arg(long = "ignore")]
		ignores: Vec<String>,
	},

	/// Rebuild a directory from scratch against the latest (or a given)
	/// version, discarding any local changes.
	Rebuild {
		project: i64,
		dir: PathBuf,
		#[arg(long)]
		to: Option<i64>,
		#[arg(long = "ignore")]
		ignores: Vec<String>,
	},

	/// Diff a working directory against its last-known summary and push
	/// the result as a new version.
	Update {
		project: i64,
		dir: PathBuf,
		#[arg(long = "ignore")]
		ignores: Vec<String>,
	},

	/// Print a project's latest version and object counts.
	Inspect { project: i64 },

	/// Print every project's latest version as a compact `id=ver,id=ver`
	/// state string.
	Snapshot,

	/// Reset every named project to the given version. Consumes the
	/// exact `id=ver,id=ver` shape `snapshot` prints.
	Reset { state: String },

	/// Garbage collection.
	#[command(subcommand)]
	Gc(GcCommand),

	/// Download the current cache version's packs into the local cache
	/// directory.
	Getcache,

	/// Print the client's build version.
	Version,

	/// Generate shell completions for this binary.
	Completions { shell: clap_complete::Shell },
}

#[derive(Subcommand, Debug)]
pub enum GcCommand {
	Contents { #[arg(long, default_value_t = 1.0)] sample: f64 },
	Project {
		project: i64,
		keep: i64,
		#[arg(long)]
		from: Option<i64>,
	},
	RandomProjects {
		#[arg(long, default_value_t = 1.0)]
		sample: f64,
		keep: i64,
		#[arg(long)]
		from: Option<i64>,
	},
}
