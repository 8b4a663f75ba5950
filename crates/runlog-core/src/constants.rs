//! Constants and default values for RunLog

/// Default HTTP port when `PORT` is not set
pub const DEFAULT_PORT: u16 = 8002;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default log directory name, relative to the working directory
pub const LOGS_DIR: &str = "logs";

/// Default route prefix for run log endpoints (`/<prefix>/{run_id}`)
pub const DEFAULT_ROUTE_PREFIX: &str = "bob_logs";

/// Default interval for the polling notifier backend in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Capacity of the per-session line channel between streamer and response body
pub const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Maximum length of a run identifier
pub const MAX_RUN_ID_LEN: usize = 255;

/// Content type for plain text and streaming responses
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
