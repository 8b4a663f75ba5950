//! RunLog Logs - Run log storage and live tail streaming

mod reader;
mod store;
mod tail;

pub use reader::{FileState, LogReader};
pub use store::{format_line, RunLogStore};
pub use tail::{LineSink, TailOutcome, TailStreamer};
