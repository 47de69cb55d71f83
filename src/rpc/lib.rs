//! Wire protocol and service wiring for DateiLager (spec §4.3, §6).
//!
//! `pb` holds the generated protobuf/tonic types (field order as declared
//! in `proto/dateilager.proto`, which mirrors spec.md §6 verbatim). Every
//! other module here either converts between `pb` and `dl_store`'s
//! wire-agnostic types, or wires the interceptor chain spec §4.3
//! prescribes: panic recovery, tracing, structured logging, then auth.

#[macro_use]
extern crate tracing;

pub mod conv;
pub mod interceptors;
pub mod service;

pub mod pb {
	tonic::include_proto!("dateilager");
}

pub use interceptors::AuthInterceptor;
pub use service::FsService;

/// Frames never exceed this size; both client and server channels are
/// configured with it as their max encode/decode message size (spec
/// §4.3: `MAX_MESSAGE_SIZE`).
pub const MAX_MESSAGE_SIZE: usize = dl_store::MAX_MESSAGE_SIZE;
