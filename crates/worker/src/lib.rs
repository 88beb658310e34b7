pub mod components;

pub use components::{
    LogTailer, MergedLogStream, MergedStream, PollOutcome, RetryPolicy, StreamMerger, TailCursor,
    TailItem, TailObserver, TailSettings, TracingObserver,
};
