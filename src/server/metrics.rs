//! Minimal Prometheus exposition, gated behind the `metrics` Cargo
//! feature so a default build stays small (spec SPEC_FULL §6 "Ambient
//! addition — metrics").

#![cfg(feature = "metrics")]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::OnceLock;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

pub struct Metrics {
	pub registry: Registry,
	pub rpc_calls: IntCounterVec,
	pub gc_runs: IntCounterVec,
	pub update_inflight: IntGaugeVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn init() -> &'static Metrics {
	METRICS.get_or_init(|| {
		let registry = Registry::new();

		let rpc_calls = IntCounterVec::new(
			Opts::new("dateilager_rpc_calls_total", "RPC calls by method and status"),
			&["method", "status"],
		)
		.expect("valid metric");
		registry.register(Box::new(rpc_calls.clone())).expect("register rpc_calls");

		let gc_runs = IntCounterVec::new(
			Opts::new("dateilager_gc_runs_total", "GC runs by policy"),
			&["policy"],
		)
		.expect("valid metric");
		registry.register(Box::new(gc_runs.clone())).expect("register gc_runs");

		let update_inflight = IntGaugeVec::new(
			Opts::new("dateilager_update_inflight", "Updates currently in flight by project"),
			&["project"],
		)
		.expect("valid metric");
		registry
			.register(Box::new(update_inflight.clone()))
			.expect("register update_inflight");

		Metrics { registry, rpc_calls, gc_runs, update_inflight }
	})
}

async fn serve_metrics(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
	use prometheus::Encoder;
	let metrics = init();
	let encoder = prometheus::TextEncoder::new();
	let families = metrics.registry.gather();
	let mut buffer = Vec::new();
	encoder.encode(&families, &mut buffer).expect("encode metrics");
	Ok(Response::new(Body::from(buffer)))
}

pub async fn run(addr: SocketAddr) {
	let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(serve_metrics)) });
	info!("Metrics endpoint listening on {}", addr);
	if let Err(e) = Server::bind(&addr).serve(make_svc).await {
		error!("metrics server error: {}", e);
	}
}
