//! Progress reporting decoupled from any presentation layer.
//!
//! The pipeline emits events through an injected observer; the events are
//! informational only and never required for correctness.

/// One progress notification. `current`/`total` form a monotonically
/// non-decreasing fraction across a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub current: u32,
    pub total: u32,
    pub message: String,
}

/// Observer interface; implemented for any `FnMut(ProgressEvent)`.
pub trait ProgressSink {
    fn update(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn update(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _event: ProgressEvent) {}
}

pub(crate) fn emit(sink: &mut dyn ProgressSink, current: u32, total: u32, message: impl Into<String>) {
    sink.update(ProgressEvent {
        current,
        total,
        message: message.into(),
    });
}
