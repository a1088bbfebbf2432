//! Process-wide logging setup.

/// Initialize process-wide observability (structured logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Tracing configuration (filters, formatting).
pub mod tracing;
