pub mod session;
pub mod shutdown;

pub use session::{write_logs, MesosSession};
pub use shutdown::{wait_for_shutdown_signal, ShutdownManager};
