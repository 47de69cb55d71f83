fn main() {
	tonic_build::configure()
		.build_server(true)
		.build_client(true)
		.compile(&["proto/dateilager.proto"], &["proto"])
		.expect("unable to compile proto/dateilager.proto");
}
