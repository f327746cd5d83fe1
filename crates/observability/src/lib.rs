//! Tracing/logging setup shared by every binary in the workspace.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFilterError, LogFormat, LogFormatError, LogSettings, parse_filter};

/// Initialize process-wide tracing with `settings`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(settings: &LogSettings) -> Result<(), LogFilterError> {
    self::tracing::init(settings)
}
