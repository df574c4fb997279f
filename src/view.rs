//! The presentation boundary.
//!
//! A [`crate::controller::ToolController`] never draws anything itself. It
//! reports every visible change through a [`ToolView`]: the file listing, the
//! state of the primary action control, the current phase, progress, notices
//! and the result panel. The terminal front-end in `src/bin/toolflow.rs` is
//! one implementation; tests use a recording one.
//!
//! # Example
//!
//! ```rust
//! use toolflow::{Notice, ToolView};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Toasts(Mutex<Vec<String>>);
//!
//! impl ToolView for Toasts {
//!     fn show_notice(&self, notice: &Notice) {
//!         self.0.lock().unwrap().push(notice.message.clone());
//!     }
//! }
//!
//! let view: Arc<dyn ToolView> = Arc::new(Toasts::default());
//! view.show_notice(&Notice::error("Please select a PDF file"));
//! ```

use crate::intake::{format_file_size, FileCandidate};
use crate::output::{DownloadLink, ResultSummary};
use serde::Serialize;
use std::sync::Arc;

/// Where a tool controller is in its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No files selected yet.
    Idle,
    /// Files selected; options may be edited.
    Configure,
    /// A request is in flight.
    Submitting,
    /// The last request succeeded and its result is shown.
    Succeeded,
    /// The last request failed. Reported briefly before returning to
    /// [`Phase::Configure`].
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A toast-style notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// One row of the file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub index: usize,
    pub name: String,
    pub size: u64,
    /// Human-readable size, e.g. `2 MB`.
    pub size_label: String,
}

impl FileEntry {
    pub fn listing(files: &[FileCandidate]) -> Vec<FileEntry> {
        files
            .iter()
            .enumerate()
            .map(|(index, f)| FileEntry {
                index,
                name: f.name.clone(),
                size: f.size,
                size_label: format_file_size(f.size),
            })
            .collect()
    }
}

/// Everything shown after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultPanel {
    pub tool_id: String,
    /// One download control per output file, in server order.
    pub links: Vec<DownloadLink>,
    pub summary: ResultSummary,
}

/// Receives every visible change of a tool controller.
///
/// All methods have default no-op implementations so views only override
/// what they render. Calls arrive from whichever task drives the controller,
/// and [`ToolView::trigger_download`] from the auto-download task.
pub trait ToolView: Send + Sync {
    /// The selection changed.
    fn render_file_list(&self, files: &[FileEntry]) {
        let _ = files;
    }

    /// Enable or disable the primary action control.
    fn set_action_enabled(&self, enabled: bool) {
        let _ = enabled;
    }

    fn show_phase(&self, phase: Phase) {
        let _ = phase;
    }

    /// Simulated progress while a request is in flight.
    ///
    /// # Arguments
    /// * `percent` — 0–100, monotonic within one submission
    /// * `message` — stage label, e.g. `Processing...`
    fn show_progress(&self, percent: u8, message: &str) {
        let _ = (percent, message);
    }

    fn show_notice(&self, notice: &Notice) {
        let _ = notice;
    }

    fn show_result(&self, panel: &ResultPanel) {
        let _ = panel;
    }

    /// Start a download without user action. Only ever called after
    /// [`ToolView::show_result`] has rendered the same link.
    fn trigger_download(&self, link: &DownloadLink) {
        let _ = link;
    }
}

/// A view that renders nothing.
pub struct NoopView;

impl ToolView for NoopView {}

/// Shared handle stored by a controller.
pub type SharedView = Arc<dyn ToolView>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_formats_sizes() {
        let files = vec![
            FileCandidate::from_bytes("a.pdf", None, vec![0; 1536]),
            FileCandidate::from_bytes("b.pdf", None, Vec::new()),
        ];
        let rows = FileEntry::listing(&files);
        assert_eq!(rows[0].size_label, "1.5 KB");
        assert_eq!(rows[1].size_label, "0 Bytes");
        assert_eq!(rows[1].index, 1);
    }

    #[test]
    fn noop_view_accepts_everything() {
        let view: SharedView = Arc::new(NoopView);
        view.render_file_list(&[]);
        view.set_action_enabled(true);
        view.show_phase(Phase::Configure);
        view.show_progress(50, "Processing...");
        view.show_notice(&Notice::info("hello"));
        view.trigger_download(&DownloadLink {
            url: "/files/x.pdf".into(),
            filename: "x.pdf".into(),
        });
    }
}
