//! Channel and auth wiring for the `dl-client` binary: builds the
//! `tonic::transport::Channel` the CLI's config resolves to, and attaches
//! the bearer token every request must carry (spec §4.3, §6
//! "Environment").

use std::time::Duration;

use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};

use dl_rpc::pb::fs_client::FsClient;
use dl_rpc::MAX_MESSAGE_SIZE;
use dl_util::config::{resolve_token, skip_ssl_verification};
use dl_util::error::{Error, ErrContext};

/// Attaches `Authorization: Bearer <token>` to every outgoing call. The
/// token is resolved once at client construction, matching the server's
/// PASETO verifier which re-checks it on every call anyway.
#[derive(Clone)]
pub struct BearerAuth {
	header: MetadataValue<tonic::metadata::Ascii>,
}

impl BearerAuth {
	pub fn new(token: &str) -> Result<Self, Error> {
		let header = format!("Bearer {}", token)
			.parse()
			.err_context("invalid bearer token: not valid header metadata")?;
		Ok(Self { header })
	}
}

impl Interceptor for BearerAuth {
	fn call(&mut self, mut req: Request<()>) -> Result<Request<()>, Status> {
		req.metadata_mut().insert("authorization", self.header.clone());
		Ok(req)
	}
}

pub type Client = FsClient<tonic::service::interceptor::InterceptedService<Channel, BearerAuth>>;

/// Every RPC carries a deadline propagated from the client (spec §5);
/// absent a more specific per-call override, this is the global timeout
/// a call is allowed to run for.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(200);

/// Connect to `server` and wrap the resulting client with bearer-token
/// auth. `DL_TOKEN`/`DL_TOKEN_FILE` supplies the token (spec §6); TLS is
/// used unless `DL_SKIP_SSL_VERIFICATION` opts the connection down to
/// plaintext, the same escape hatch the server's dev mode offers on the
/// other end.
pub async fn connect(server: &str) -> Result<Client, Error> {
	let token = resolve_token()?;
	let auth = BearerAuth::new(&token)?;

	let mut endpoint = Endpoint::from_shared(server.to_string())
		.err_context(format!("invalid server address {}", server))?
		.timeout(DEFAULT_CALL_TIMEOUT);

	if !skip_ssl_verification() && server.starts_with("https://") {
		endpoint = endpoint
			.tls_config(ClientTlsConfig::new().with_native_roots())
			.err_context("invalid TLS client configuration")?;
	}

	let channel = endpoint
		.connect()
		.await
		.err_context(format!("unable to connect to {}", server))?;

	let client = FsClient::with_interceptor(channel, auth)
		.max_decoding_message_size(MAX_MESSAGE_SIZE)
		.max_encoding_message_size(MAX_MESSAGE_SIZE);

	Ok(client)
}
