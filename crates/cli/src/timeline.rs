//! Records analysis debug events with timestamps and renders them.

use clap::ValueEnum;
use engine::{DebugEvent, DebugSink};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Loading,
    TypeAnalysis,
    Summaries,
    Obligations,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Loading => "loading",
            Phase::TypeAnalysis => "type-analysis",
            Phase::Summaries => "summaries",
            Phase::Obligations => "obligations",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RecordedEvent {
    pub index: usize,
    pub phase: Phase,
    #[serde(rename = "elapsed_ms")]
    pub elapsed_millis: u128,
    pub description: String,
    pub event: DebugEvent,
}

impl RecordedEvent {
    fn new(index: usize, elapsed: Duration, event: DebugEvent) -> Self {
        Self {
            index,
            phase: phase_of(&event),
            elapsed_millis: elapsed.as_millis(),
            description: describe_event(&event),
            event,
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_millis as f64 / 1_000.0
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub count: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventTimeline {
    pub events: Vec<RecordedEvent>,
}

impl EventTimeline {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            let _ = writeln!(
                out,
                "[+{elapsed:>7.3}s] {phase:<14} {description}",
                elapsed = event.elapsed_seconds(),
                phase = event.phase,
                description = event.description
            );
        }
        out
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }

    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for event in &self.events {
            let label = format!(
                "{}<br/>{}",
                event.phase.as_str(),
                event.description.replace('"', "'")
            );
            let _ = writeln!(out, "    E{}[\"{label}\"]", event.index);
        }
        for pair in self.events.windows(2) {
            if let [prev, next] = pair {
                let _ = writeln!(out, "    E{} --> E{}", prev.index, next.index);
            }
        }
        out
    }

    pub fn phase_summary(&self) -> Vec<PhaseSummary> {
        let mut map = BTreeMap::new();
        for event in &self.events {
            *map.entry(event.phase).or_insert(0usize) += 1;
        }
        map.into_iter()
            .map(|(phase, count)| PhaseSummary { phase, count })
            .collect()
    }
}

#[derive(Default)]
struct TimelineInner {
    start: Option<Instant>,
    events: Vec<RecordedEvent>,
}

/// A [`DebugSink`] that keeps every event it receives.
#[derive(Clone, Default)]
pub struct TimelineSink {
    inner: Arc<Mutex<TimelineInner>>,
}

impl TimelineSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TimelineInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> EventTimeline {
        EventTimeline {
            events: self.lock().events.clone(),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.events.clear();
        inner.start = None;
    }
}

impl DebugSink for TimelineSink {
    fn event(&self, event: DebugEvent) {
        let mut inner = self.lock();
        let now = Instant::now();
        let start = *inner.start.get_or_insert(now);
        let index = inner.events.len();
        inner
            .events
            .push(RecordedEvent::new(index, now.duration_since(start), event));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EventFormat {
    Text,
    Json,
    Mermaid,
}

impl EventTimeline {
    pub fn render(&self, format: EventFormat) -> serde_json::Result<String> {
        Ok(match format {
            EventFormat::Text => self.to_text(),
            EventFormat::Json => self.to_json_string()?,
            EventFormat::Mermaid => self.to_mermaid(),
        })
    }
}

fn phase_of(event: &DebugEvent) -> Phase {
    match event {
        DebugEvent::ModelLoaded { .. } => Phase::Loading,
        DebugEvent::TypeStarted { .. } | DebugEvent::TypeFinished { .. } => Phase::TypeAnalysis,
        DebugEvent::MethodSummarized { .. } | DebugEvent::DepthExceeded { .. } => {
            Phase::Summaries
        }
        DebugEvent::ObligationResolved { .. } => Phase::Obligations,
    }
}

fn describe_event(event: &DebugEvent) -> String {
    match event {
        DebugEvent::ModelLoaded { path, types, .. } => {
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            format!("Model loaded: {name} ({types} types)")
        }
        DebugEvent::TypeStarted { type_name } => format!("Analysing {type_name}"),
        DebugEvent::MethodSummarized { method, depth } => {
            format!("Summarised {method} at depth {depth}")
        }
        DebugEvent::DepthExceeded { method, depth } => {
            format!("Call to {method} not followed: depth {depth} over the limit")
        }
        DebugEvent::ObligationResolved {
            type_name,
            field,
            satisfied,
            reason,
        } => {
            let status = if *satisfied { "satisfied" } else { "UNSATISFIED" };
            format!("{type_name}.{field} {status} ({reason})")
        }
        DebugEvent::TypeFinished {
            type_name,
            findings,
        } => format!("Finished {type_name}: {findings} finding(s)"),
    }
}
