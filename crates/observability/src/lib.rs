//! Process-wide tracing setup shared by every binary in the workspace.

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Filter and formatter selection.
pub mod tracing;
