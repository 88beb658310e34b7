pub mod log_tailer;
pub mod retry_policy;
pub mod stream_merger;

pub use log_tailer::{
    LogTailer, PollOutcome, TailCursor, TailItem, TailObserver, TailSettings, TracingObserver,
};
pub use retry_policy::RetryPolicy;
pub use stream_merger::{MergedLogStream, MergedStream, StreamMerger};
