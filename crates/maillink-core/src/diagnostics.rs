//! Diagnostics sink for connection events.

/// Receives log lines and breadcrumbs about connection attempts.
///
/// Implementations must not fail; diagnostics are best effort.
pub trait Diagnostics: Send + Sync {
    /// Records a log line.
    fn log(&self, line: &str);

    /// Leaves a named breadcrumb with key-value data.
    fn breadcrumb(&self, name: &str, data: &[(String, String)]);
}

/// Diagnostics sink writing to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log(&self, line: &str) {
        tracing::info!(target: "maillink::diagnostics", "{line}");
    }

    fn breadcrumb(&self, name: &str, data: &[(String, String)]) {
        tracing::info!(target: "maillink::diagnostics", breadcrumb = name, ?data);
    }
}
