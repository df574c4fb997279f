//! # toolflow
//!
//! Drive file-conversion tool backends: pick files, set options, submit one
//! multipart request, present the result and download it.
//!
//! ## Workflow Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Intake    type + size checks, dedupe, single-file replace
//!  ├─ 2. Options   schema-driven: defaults, clamping, flag encoding
//!  ├─ 3. Submit    one POST per job, simulated progress, optional timeout
//!  ├─ 4. Classify  2xx/success → result, everything else → typed error
//!  └─ 5. Present   download controls, summary metrics, auto-download
//! ```
//!
//! Each tool is described by a [`ToolSchema`]; the built-in catalog lives in
//! [`tools`]. A [`ToolController`] runs the workflow for one tool and reports
//! everything visible through a [`ToolView`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolflow::{ClientConfig, FileCandidate, NoopView, SubmitOutcome, ToolController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().base_url("http://localhost:5000").build()?;
//!     let controller = ToolController::connect("pdf-compressor", config, Arc::new(NoopView))?;
//!
//!     controller.add_files(vec![FileCandidate::from_path("report.pdf")?]);
//!     controller.set_option("quality", 70);
//!
//!     if let SubmitOutcome::Completed(panel) = controller.submit().await? {
//!         for link in &panel.links {
//!             println!("{} -> {}", link.filename, link.url);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `toolflow` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! toolflow = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod download;
pub mod error;
pub mod intake;
pub mod options;
pub mod output;
pub mod progress;
pub mod schema;
pub mod submit;
pub mod tools;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::{SubmitOutcome, ToolController};
pub use download::fetch_to_dir;
pub use error::{ErrorKind, ToolflowError};
pub use intake::{format_file_size, DropItem, FileCandidate, IntakeReport, SelectedFileSet};
pub use options::{ProcessingOptions, RawOptions, RawValue};
pub use output::{DownloadLink, OutputFile, ProcessingResult, ResultSummary};
pub use progress::SimulatedProgress;
pub use schema::{AutoDownload, Endpoint, FileField, OptionKind, OptionSpec, ToolSchema};
pub use submit::{health_check, HealthStatus, RawResponse, ReqwestTransport, SubmitRequest, Transport};
pub use view::{FileEntry, Notice, NoticeLevel, NoopView, Phase, ResultPanel, SharedView, ToolView};
