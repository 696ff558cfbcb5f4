//! Process-wide logging setup.

/// Tracing subscriber configuration (format, filters).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide logging from `LOG_FORMAT` and `RUST_LOG`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}
