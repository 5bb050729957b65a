fn main() -> Result<(), Box<dyn std::error::Error>> {
	let root = env!("CARGO_MANIFEST_DIR");
	tonic_build::configure()
		.build_server(true)
		.build_client(true)
		.compile_protos(
			&[format!("{root}/proto/capgate/v1/capgate.proto")],
			&[format!("{root}/proto")],
		)?;
	Ok(())
}
