use serde::Serialize;
use std::path::PathBuf;
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub enum DebugEvent {
    ModelLoaded {
        path: PathBuf,
        files: usize,
        types: usize,
    },
    TypeStarted {
        type_name: String,
    },
    MethodSummarized {
        method: String,
        depth: usize,
    },
    DepthExceeded {
        method: String,
        depth: usize,
    },
    ObligationResolved {
        type_name: String,
        field: String,
        satisfied: bool,
        reason: String,
    },
    TypeFinished {
        type_name: String,
        findings: usize,
    },
}

pub trait DebugSink: Send + Sync {
    fn event(&self, event: DebugEvent);
}

static DEBUG_SINK: RwLock<Option<Box<dyn DebugSink>>> = RwLock::new(None);

pub fn set_debug_sink(sink: Option<Box<dyn DebugSink>>) {
    let mut slot = DEBUG_SINK.write().unwrap_or_else(|e| e.into_inner());
    *slot = sink;
}

pub(crate) fn emit(event: DebugEvent) {
    let slot = DEBUG_SINK.read().unwrap_or_else(|e| e.into_inner());
    if let Some(s) = slot.as_ref() {
        s.event(event);
    }
}
