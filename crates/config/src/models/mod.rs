pub mod app_config;
pub mod cluster;
pub mod observability;
pub mod tail;

pub use app_config::*;
pub use cluster::*;
pub use observability::*;
pub use tail::*;
