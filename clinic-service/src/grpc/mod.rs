//! gRPC module for clinic-service.

mod service;

pub use service::ClinicServiceImpl;

/// Generated protobuf code.
pub mod proto {
    tonic::include_proto!("clinic.v1");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("clinic_descriptor");
}
