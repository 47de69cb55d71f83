//! Error taxonomy shared by every DateiLager crate.
//!
//! Mirrors the five-way split from the error handling design: Input,
//! Conflict, Integrity, Transient and Fatal. Each variant knows how to map
//! itself to a `tonic::Status` so the RPC boundary never has to re-derive
//! the category.

use err_derive::Error;

/// The category a failure belongs to, used by clients to decide whether a
/// retry is safe. Only `Transient` is automatically retryable by RPC
/// helpers; `Conflict` is surfaced so the caller can rebuild and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
	Input,
	Conflict,
	Integrity,
	Transient,
	Fatal,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(display = "{}", _0)]
	Message(String),

	#[error(display = "not found: {}", _0)]
	NotFound(String),

	#[error(display = "concurrent update in progress for project {}", _0)]
	Conflict(i64),

	#[error(display = "corrupt content, hash mismatch for {}", _0)]
	CorruptData(String),

	#[error(display = "tar decode error: {}", _0)]
	TarDecode(String),

	#[error(display = "database error: {}", _0)]
	Db(#[error(source)] sqlx::Error),

	#[error(display = "io error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "request deadline exceeded")]
	DeadlineExceeded,

	#[error(display = "unavailable: {}", _0)]
	Unavailable(String),
}

impl Error {
	pub fn category(&self) -> Category {
		match self {
			Error::Message(_) | Error::NotFound(_) => Category::Input,
			Error::Conflict(_) => Category::Conflict,
			Error::CorruptData(_) | Error::TarDecode(_) => Category::Integrity,
			Error::Db(_) | Error::DeadlineExceeded | Error::Unavailable(_) => Category::Transient,
			Error::Io(_) => Category::Fatal,
		}
	}

	/// Whether a client may safely retry the operation that produced this
	/// error. Only idempotent operations (Get, GetCache, Inspect, Snapshot)
	/// should honor this — Update is never automatically retried even when
	/// this returns true, since a failed Update may or may not have bumped
	/// the version.
	pub fn retryable(&self) -> bool {
		matches!(self.category(), Category::Transient)
	}
}

impl From<&str> for Error {
	fn from(s: &str) -> Error {
		Error::Message(s.to_string())
	}
}

impl From<String> for Error {
	fn from(s: String) -> Error {
		Error::Message(s)
	}
}

/// Lets client code pull a `tonic::Status` straight into the crate's own
/// taxonomy via `?`/`map_err(Error::from)`, e.g. when draining a response
/// stream. The reverse direction (`Error` -> `Status`) is what the server
/// side uses at the RPC boundary, below.
impl From<tonic::Status> for Error {
	fn from(status: tonic::Status) -> Error {
		match status.code() {
			tonic::Code::NotFound => Error::NotFound(status.message().to_string()),
			tonic::Code::Aborted => Error::Conflict(0),
			tonic::Code::DataLoss => Error::CorruptData(status.message().to_string()),
			tonic::Code::Unavailable | tonic::Code::DeadlineExceeded | tonic::Code::ResourceExhausted => {
				Error::Unavailable(status.message().to_string())
			}
			_ => Error::Message(status.message().to_string()),
		}
	}
}

impl From<Error> for tonic::Status {
	fn from(e: Error) -> tonic::Status {
		let code = match e.category() {
			Category::Input => tonic::Code::InvalidArgument,
			Category::Conflict => tonic::Code::Aborted,
			Category::Integrity => tonic::Code::DataLoss,
			Category::Transient => tonic::Code::Unavailable,
			Category::Fatal => tonic::Code::Internal,
		};
		tonic::Status::new(code, e.to_string())
	}
}

/// Extension trait to attach context to a `Result`'s error, the way
/// `garage_util::error::OkOrMessage`/`err_context` does, but generic over
/// any `Display` error so it composes across `sqlx`, `std::io` and our own
/// `Error`.
pub trait ErrContext<T> {
	fn err_context<C: Into<String>>(self, context: C) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> ErrContext<T> for Result<T, E> {
	fn err_context<C: Into<String>>(self, context: C) -> Result<T, Error> {
		self.map_err(|e| Error::Message(format!("{}: {}", context.into(), e)))
	}
}

/// Extension trait to turn an `Option` into a `Result` with a message,
/// mirroring `garage_util::error::OkOrMessage::ok_or_message`.
pub trait OkOrMessage<T> {
	fn ok_or_message<C: Into<String>>(self, message: C) -> Result<T, Error>;
}

impl<T> OkOrMessage<T> for Option<T> {
	fn ok_or_message<C: Into<String>>(self, message: C) -> Result<T, Error> {
		self.ok_or_else(|| Error::Message(message.into()))
	}
}
