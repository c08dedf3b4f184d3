//! Progress reporting.
//!
//! The engine never renders anything itself; it reports named counters
//! through a [`ProgressSink`] and lets the caller decide how (or whether) to
//! show them. A CLI wants a single rewritten status line; an embedder might
//! want nothing at all, or a structured event stream.

/// A snapshot of where the pipeline currently is.
#[derive(Debug, Clone, Default)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub total_dirs: usize,
    pub current_dir: usize,
    pub total_files: usize,
    pub current_file: usize,
    pub total_tools: usize,
    pub current_tool: usize,
    pub current_tool_name: Option<String>,
}

/// Which phase of the pipeline is currently reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Discovery,
    Digest,
    DependencyMap,
    ToolRun,
}

impl Phase {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Discovery => "discover",
            Self::Digest => "digest",
            Self::DependencyMap => "map deps",
            Self::ToolRun => "run tools",
        }
    }
}

/// Receives progress updates from the pipeline.
pub trait ProgressSink: Send {
    fn report(&mut self, event: &ProgressEvent);
}

impl ProgressSink for Box<dyn ProgressSink> {
    fn report(&mut self, event: &ProgressEvent) {
        (**self).report(event);
    }
}

/// A sink that discards every update. The engine must function correctly
/// with this sink installed; it is the default for `quiet = true`.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _event: &ProgressEvent) {}
}

/// Renders a single, rewritten status line to a writer (typically stderr).
///
/// Mirrors the distilled project's single-line terminal reporter: one line,
/// overwritten in place, showing the current phase and a `current/total`
/// fraction for whichever counters are in play.
pub struct LineProgress<W: std::io::Write> {
    out: W,
    last_len: usize,
}

impl<W: std::io::Write> LineProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out, last_len: 0 }
    }
}

impl<W: std::io::Write + Send> ProgressSink for LineProgress<W> {
    fn report(&mut self, event: &ProgressEvent) {
        let mut line = format!("[{}]", event.phase.label());
        if event.total_dirs > 0 {
            line.push_str(&format!(" dirs {}/{}", event.current_dir, event.total_dirs));
        }
        if event.total_files > 0 {
            line.push_str(&format!(" files {}/{}", event.current_file, event.total_files));
        }
        if let Some(name) = &event.current_tool_name {
            line.push_str(&format!(
                " tool {}/{} ({name})",
                event.current_tool, event.total_tools
            ));
        }
        let pad = self.last_len.saturating_sub(line.len());
        let _ = write!(self.out, "\r{line}{}", " ".repeat(pad));
        let _ = self.out.flush();
        self.last_len = line.len();
    }
}
