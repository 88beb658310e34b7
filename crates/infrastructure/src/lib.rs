pub mod mesos_client;

pub use mesos_client::MesosHttpClient;
