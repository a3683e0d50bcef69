use std::sync::Arc;

use parking_lot::Mutex;

/// Textual debug hook for wire traffic and engine lifecycle.
///
/// Purely observational: the engine behaves identically with or without a
/// sink attached.
pub trait TraceSink: Send + Sync + 'static {
    fn frame_in(&self, raw: &str);
    fn frame_out(&self, raw: &str);
    fn lifecycle(&self, event: &str);
}

#[derive(Default)]
pub struct NoopTrace;

impl TraceSink for NoopTrace {
    fn frame_in(&self, _raw: &str) {}

    fn frame_out(&self, _raw: &str) {}

    fn lifecycle(&self, _event: &str) {}
}

/// Buffering sink for tests and interactive debugging.
#[derive(Default)]
pub struct MemoryTrace {
    lines: Mutex<Vec<String>>,
}

impl MemoryTrace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().push(line);
    }
}

impl TraceSink for MemoryTrace {
    fn frame_in(&self, raw: &str) {
        self.push(format!("<< {}", raw));
    }

    fn frame_out(&self, raw: &str) {
        self.push(format!(">> {}", raw));
    }

    fn lifecycle(&self, event: &str) {
        self.push(format!("-- {}", event));
    }
}
