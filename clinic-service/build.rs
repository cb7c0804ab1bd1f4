fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(out_dir.join("clinic_descriptor.bin"))
        .compile_protos(&["../proto/clinic/v1/clinic.proto"], &["../proto"])?;

    println!("cargo:rerun-if-changed=../proto/clinic/v1/clinic.proto");
    println!("cargo:rerun-if-changed=migrations");

    Ok(())
}
