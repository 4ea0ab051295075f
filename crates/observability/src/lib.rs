//! Process-wide tracing setup shared by the brewhouse binaries.

pub mod subscriber;

pub use subscriber::DEFAULT_FILTER;

/// Initialize process-wide observability (structured JSON logs).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init(DEFAULT_FILTER);
}
