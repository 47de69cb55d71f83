//! Postgres-backed persistence for DateiLager. Owns the schema and every
//! SQL statement in the workspace — `dl_store` talks to this crate through
//! the typed methods below and never sees a query string, the same
//! separation the teacher draws between `garage_model` and `garage_db`.

#[macro_use]
extern crate tracing;

pub mod model;
pub mod queries;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use dl_util::error::{Error, ErrContext};

/// Exposed so `#[sqlx::test(migrator = "dl_db::MIGRATOR")]` can stand up
/// an ephemeral, fully migrated database per test without every
/// downstream crate needing its own `migrations/` directory.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// The authoritative store handle. Cheap to clone (wraps a connection
/// pool), handed out as `Arc<Db>` by every service that needs it.
#[derive(Clone)]
pub struct Db {
	pub pool: PgPool,
}

impl Db {
	pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, Error> {
		info!("Opening database pool (max_connections = {})...", max_connections);
		let pool = PgPoolOptions::new()
			.max_connections(max_connections)
			.connect(database_url)
			.await
			.err_context("unable to connect to the database")?;
		Ok(Self { pool })
	}

	pub async fn migrate(&self) -> Result<(), Error> {
		MIGRATOR
			.run(&self.pool)
			.await
			.err_context("unable to run database migrations")
	}
}
