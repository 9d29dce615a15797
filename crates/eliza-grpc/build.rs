use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true) // Used by the CLI and integration tests
        .file_descriptor_set_path(out_dir.join("eliza_descriptor.bin"))
        .compile_protos(&["proto/connectrpc/eliza/v1/eliza.proto"], &["proto/"])?;
    Ok(())
}
