pub mod cluster_state;
pub mod sandbox_files;

pub use cluster_state::ClusterStateSource;
pub use sandbox_files::SandboxFileReader;
