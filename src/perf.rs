//! Opt-in timing and render diagnostics.
//!
//! `--perf` reports how long each [`ScopeTimer`] lived on stderr.
//! `--render-debug-log PATH` appends timestamped records (frames, messages,
//! image surface builds) to a file; timers are mirrored there as well.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

static TIMINGS: AtomicBool = AtomicBool::new(false);
static SINK: Mutex<Option<DebugSink>> = Mutex::new(None);

/// Measures the time until it is dropped.
#[derive(Debug)]
#[must_use = "the timer reports when dropped"]
pub struct ScopeTimer {
    label: &'static str,
    started: Instant,
}

impl Drop for ScopeTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        if is_enabled() {
            eprintln!("[perf] {}: {}", self.label, format_ms(elapsed));
        }
        if let Some(sink) = sink().as_mut() {
            sink.record("perf", &format!("{} took {}", self.label, format_ms(elapsed)));
        }
    }
}

#[derive(Debug)]
struct DebugSink {
    opened: Instant,
    out: BufWriter<File>,
}

impl DebugSink {
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "marksight render debug log start")?;
        out.flush()?;
        Ok(Self {
            opened: Instant::now(),
            out,
        })
    }

    // Write failures are dropped; diagnostics never interrupt the viewer.
    fn record(&mut self, name: &str, detail: &str) {
        let at = format_ms(self.opened.elapsed());
        let _ = writeln!(self.out, "[{at:>13}] {name}: {detail}");
        let _ = self.out.flush();
    }
}

fn sink() -> MutexGuard<'static, Option<DebugSink>> {
    SINK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn format_ms(elapsed: Duration) -> String {
    format!("{:.3} ms", elapsed.as_secs_f64() * 1000.0)
}

pub fn set_enabled(enabled: bool) {
    TIMINGS.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    TIMINGS.load(Ordering::Relaxed)
}

/// Start timing `label`.
pub fn scope(label: &'static str) -> ScopeTimer {
    ScopeTimer {
        label,
        started: Instant::now(),
    }
}

/// Open (or with `None`, close) the render debug log.
///
/// # Errors
/// Returns the I/O error if the file cannot be opened or flushed.
pub fn set_debug_log_path(path: Option<&Path>) -> std::io::Result<()> {
    let mut guard = sink();
    if let Some(mut previous) = guard.take() {
        previous.out.flush()?;
    }
    if let Some(path) = path {
        *guard = Some(DebugSink::open(path)?);
    }
    Ok(())
}

pub fn is_debug_log_enabled() -> bool {
    sink().is_some()
}

/// Append one record to the render debug log when it is open.
pub fn log_event(name: &str, detail: impl AsRef<str>) {
    if let Some(sink) = sink().as_mut() {
        sink.record(name, detail.as_ref());
    }
}
