//! Diagnostics sink
//!
//! Debug output may be queued behind a slow console. Bonding persistence and
//! low-power entry both stall that console, so the peripheral only performs
//! them once the sink reports it has drained.

/// Queued debug output
pub trait Diagnostics {
    /// Whether all queued output has been written out
    fn is_drained(&self) -> bool;

    /// Block until queued output is written out
    fn flush(&mut self);
}

/// Diagnostics backed by the global `log` logger
///
/// The logger writes synchronously, so there is never anything queued.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn is_drained(&self) -> bool {
        true
    }

    fn flush(&mut self) {
        log::logger().flush();
    }
}

/// Diagnostics that stay busy for a fixed number of drain checks
///
/// Used to exercise the ordering between debug output and slow operations.
#[derive(Debug, Default, Clone)]
pub struct QueuedDiagnostics {
    pending: u32,
    flushes: u32,
}

impl QueuedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue output that takes `checks` drain checks to leave
    pub fn queue(&mut self, checks: u32) {
        self.pending = self.pending.saturating_add(checks);
    }

    /// Mark one unit of queued output as written
    pub fn tick(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Number of explicit flushes requested so far
    pub fn flushes(&self) -> u32 {
        self.flushes
    }
}

impl Diagnostics for QueuedDiagnostics {
    fn is_drained(&self) -> bool {
        self.pending == 0
    }

    fn flush(&mut self) {
        self.pending = 0;
        self.flushes += 1;
    }
}
