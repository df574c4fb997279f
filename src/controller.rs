//! The per-tool workflow: intake → configure → submit → result.
//!
//! A [`ToolController`] owns the Selected File Set and the raw option state
//! of exactly one tool. It is handed its collaborators explicitly (a
//! [`Transport`] for the network and a [`ToolView`] for everything visible),
//! so several controllers can coexist without sharing anything.
//!
//! ```text
//!            add_files / drop_items            submit()
//!   Idle ─────────────────────────▶ Configure ─────────▶ Submitting
//!    ▲                                  ▲                    │
//!    │ reset()                          │  error (Failed     │ success
//!    └──────────── any ─────────────────┤  shown briefly)    ▼
//!                                       └─────────────── Succeeded
//! ```
//!
//! Every error path leaves the controller interactive: validation errors are
//! reported before any request is built, transport and server errors return
//! it to `Configure` with the selection and options untouched so the user can
//! simply resubmit.

use crate::config::ClientConfig;
use crate::error::ToolflowError;
use crate::intake::{DropItem, FileCandidate, IntakeReport, SelectedFileSet};
use crate::options::{self, ProcessingOptions, RawOptions, RawValue};
use crate::output::ProcessingResult;
use crate::progress::{stage_message, SimulatedProgress};
use crate::schema::{AutoDownload, ToolSchema};
use crate::submit::{
    build_request, classify, RawResponse, ReqwestTransport, SubmitRequest, Transport,
};
use crate::tools;
use crate::view::{FileEntry, Notice, Phase, ResultPanel, SharedView};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What an accepted call to [`ToolController::submit`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The backend processed the job; the panel has been shown.
    Completed(ResultPanel),
    /// Another submission was still in flight; nothing was sent.
    AlreadyInFlight,
    /// [`ToolController::reset`] was called while the request was in flight;
    /// the response was dropped unseen.
    Discarded,
}

struct State {
    files: SelectedFileSet,
    options: RawOptions,
    phase: Phase,
    last_result: Option<ProcessingResult>,
    pending_download: Option<JoinHandle<()>>,
    /// Bumped by every reset; a response from an older generation is stale.
    generation: u64,
}

/// Clears the processing flag however `submit` exits. If the submission is
/// dropped before [`InFlight::finish`], the controller is made interactive
/// again.
struct InFlight<'a> {
    controller: &'a ToolController,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let c = self.controller;
        c.processing.store(false, Ordering::Release);
        if !self.finished {
            debug!("{}: submission abandoned", c.schema.id);
            c.set_phase(c.settled_phase());
            c.view.set_action_enabled(c.can_submit());
        }
    }
}

/// Coordinates file intake, option collection, submission and result display
/// for one tool.
pub struct ToolController {
    schema: ToolSchema,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    view: SharedView,
    state: Mutex<State>,
    processing: AtomicBool,
}

impl ToolController {
    pub fn new(
        schema: ToolSchema,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        view: SharedView,
    ) -> Self {
        let phase = initial_phase(&schema);
        let controller = Self {
            schema,
            config,
            transport,
            view,
            state: Mutex::new(State {
                files: SelectedFileSet::new(),
                options: RawOptions::new(),
                phase,
                last_result: None,
                pending_download: None,
                generation: 0,
            }),
            processing: AtomicBool::new(false),
        };
        controller.view.show_phase(phase);
        controller.view.set_action_enabled(controller.can_submit());
        controller
    }

    /// Controller for a built-in tool talking HTTP to `config.base_url`.
    pub fn connect(
        tool_id: &str,
        config: ClientConfig,
        view: SharedView,
    ) -> Result<Self, ToolflowError> {
        let schema = tools::lookup(tool_id)?.clone();
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::new(schema, config, transport, view))
    }

    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn files(&self) -> Vec<FileCandidate> {
        self.state().files.files().to_vec()
    }

    pub fn last_result(&self) -> Option<ProcessingResult> {
        self.state().last_result.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Whether the primary action control should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.is_processing() && self.state().files.len() >= self.schema.min_files
    }

    // ── File intake ───────────────────────────────────────────────────────

    /// Files chosen through the picker.
    pub fn add_files(&self, candidates: Vec<FileCandidate>) -> IntakeReport {
        let max = self.config.max_file_size(&self.schema);
        let report = self.state().files.add(&self.schema, max, candidates);
        self.after_intake(&report);
        report
    }

    /// Items dropped onto the drop zone. Non-file items are ignored.
    pub fn drop_items(&self, items: Vec<DropItem>) -> IntakeReport {
        let max = self.config.max_file_size(&self.schema);
        let report = self.state().files.drop_items(&self.schema, max, items);
        self.after_intake(&report);
        report
    }

    pub fn remove_file(&self, index: usize) -> Option<FileCandidate> {
        let (removed, now_empty) = {
            let mut state = self.state();
            let removed = state.files.remove(index);
            (removed, state.files.is_empty())
        };
        if removed.is_some() {
            self.render_files();
            if now_empty && self.schema.takes_files() && !self.is_processing() {
                self.set_phase(Phase::Idle);
            }
            self.view.set_action_enabled(self.can_submit());
        }
        removed
    }

    /// Reorder the selection; `new_order` lists current indices.
    pub fn reorder(&self, new_order: &[usize]) -> Result<(), ToolflowError> {
        self.state().files.reorder(new_order)?;
        self.render_files();
        Ok(())
    }

    fn after_intake(&self, report: &IntakeReport) {
        for e in &report.rejected {
            self.view.show_notice(&Notice::error(e.user_message()));
        }
        if !report.changed() {
            return;
        }
        debug!(
            "{}: added {} file(s), skipped {} duplicate(s)",
            self.schema.id,
            report.accepted.len(),
            report.duplicates.len()
        );
        self.render_files();
        if !self.is_processing() {
            self.set_phase(Phase::Configure);
        }
        self.view.set_action_enabled(self.can_submit());
    }

    // ── Options ───────────────────────────────────────────────────────────

    pub fn set_option(&self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.state().options.set(name, value);
    }

    pub fn unset_option(&self, name: &str) {
        self.state().options.unset(name);
    }

    /// The payload the next submission would send, without sending it.
    pub fn preview_options(&self) -> Result<ProcessingOptions, ToolflowError> {
        options::collect(&self.schema, &self.state().options)
    }

    /// Drop the selection, options and result; back to `Idle`.
    ///
    /// A submission still in flight is not cancelled, but its outcome is
    /// discarded when it arrives.
    pub fn reset(&self) {
        {
            let mut state = self.state();
            state.generation += 1;
            if let Some(handle) = state.pending_download.take() {
                handle.abort();
            }
            state.files.clear();
            state.options = RawOptions::new();
            state.last_result = None;
        }
        self.render_files();
        self.set_phase(Phase::Idle);
        if !self.schema.takes_files() {
            self.set_phase(Phase::Configure);
        }
        self.view.set_action_enabled(self.can_submit());
    }

    // ── Submission ────────────────────────────────────────────────────────

    /// Validate, send exactly one request and present its outcome.
    ///
    /// Returns [`SubmitOutcome::AlreadyInFlight`] without touching anything
    /// when another submission has not finished yet. Errors are returned
    /// *and* reported to the view.
    pub async fn submit(&self) -> Result<SubmitOutcome, ToolflowError> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("{}: submission already in flight", self.schema.id);
            return Ok(SubmitOutcome::AlreadyInFlight);
        }
        let in_flight = InFlight {
            controller: self,
            finished: false,
        };
        let generation = self.state().generation;

        let request = match self.prepare().await {
            Ok(request) => request,
            Err(e) => {
                in_flight.finish();
                warn!("{}: not submitted: {}", self.schema.id, e);
                self.view.show_notice(&Notice::error(e.user_message()));
                return Err(e);
            }
        };

        if self.state().generation != generation {
            in_flight.finish();
            return Ok(SubmitOutcome::Discarded);
        }
        if let Some(handle) = self.state().pending_download.take() {
            handle.abort();
        }
        self.set_phase(Phase::Submitting);
        self.view.set_action_enabled(false);
        info!(
            "Submitting {} file(s) to {} ({})",
            request.files.len(),
            self.schema.id,
            request.path
        );

        let started = Instant::now();
        let mut progress = SimulatedProgress::new(self.config.progress_cap);
        let outcome = self
            .send_with_progress(&request, &mut progress, generation)
            .await
            .and_then(classify);
        in_flight.finish();

        if self.state().generation != generation {
            info!("{}: reset during submission, outcome discarded", self.schema.id);
            self.set_phase(self.settled_phase());
            self.view.set_action_enabled(self.can_submit());
            return Ok(SubmitOutcome::Discarded);
        }

        match outcome {
            Ok(result) => {
                info!(
                    "{} completed in {:.1}s",
                    self.schema.id,
                    started.elapsed().as_secs_f64()
                );
                match self.present_result(result, generation, progress.complete()) {
                    Some(panel) => Ok(SubmitOutcome::Completed(panel)),
                    None => Ok(SubmitOutcome::Discarded),
                }
            }
            Err(e) => {
                warn!("{} failed: {}", self.schema.id, e);
                self.view.show_phase(Phase::Failed);
                self.view.show_notice(&Notice::error(e.user_message()));
                self.set_phase(self.settled_phase());
                self.view.set_action_enabled(self.can_submit());
                Err(e)
            }
        }
    }

    /// Wait for a scheduled automatic download to fire. Returns at once when
    /// none is pending.
    pub async fn wait_for_auto_download(&self) {
        let handle = self.state().pending_download.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Auto-download task failed: {}", e);
                }
            }
        }
    }

    async fn prepare(&self) -> Result<SubmitRequest, ToolflowError> {
        let (files, payload) = {
            let state = self.state();
            if state.files.len() < self.schema.min_files {
                return Err(ToolflowError::NotEnoughFiles {
                    required: self.schema.min_files,
                    selected: state.files.len(),
                });
            }
            let payload = options::collect(&self.schema, &state.options)?;
            (state.files.files().to_vec(), payload)
        };
        for adj in payload.adjustments() {
            info!(
                "Option '{}' adjusted from {} to {}",
                adj.name, adj.requested, adj.applied
            );
        }
        let max = self.config.max_file_size(&self.schema);
        build_request(&self.schema, &files, &payload, max).await
    }

    async fn send_with_progress(
        &self,
        request: &SubmitRequest,
        progress: &mut SimulatedProgress,
        generation: u64,
    ) -> Result<RawResponse, ToolflowError> {
        self.view.show_progress(progress.percent(), progress.message());

        let send = self.send_with_timeout(request);
        tokio::pin!(send);

        let tick = Duration::from_millis(self.config.progress_tick_ms);
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                response = &mut send => return response,
                _ = ticker.tick() => {
                    let percent = progress.tick();
                    if self.state().generation == generation {
                        self.view.show_progress(percent, progress.message());
                    }
                }
            }
        }
    }

    async fn send_with_timeout(
        &self,
        request: &SubmitRequest,
    ) -> Result<RawResponse, ToolflowError> {
        match self.config.request_timeout_secs {
            Some(secs) => tokio::time::timeout(
                Duration::from_secs(secs),
                self.transport.submit(request),
            )
            .await
            .map_err(|_| ToolflowError::Timeout {
                endpoint: request.path.clone(),
                secs,
            })?,
            None => self.transport.submit(request).await,
        }
    }

    /// Record and show `result`, unless a reset has superseded `generation`.
    fn present_result(
        &self,
        result: ProcessingResult,
        generation: u64,
        percent: u8,
    ) -> Option<ResultPanel> {
        let panel = ResultPanel {
            tool_id: self.schema.id.clone(),
            links: result.download_links(&self.schema.default_output_name),
            summary: result.summary(),
        };
        let message = result
            .message
            .clone()
            .unwrap_or_else(|| format!("{} completed successfully", self.schema.name));
        {
            let mut state = self.state();
            if state.generation != generation {
                return None;
            }
            state.phase = Phase::Succeeded;
            state.last_result = Some(result);
        }

        self.view.show_progress(percent, stage_message(percent));
        self.view.show_phase(Phase::Succeeded);
        self.view.show_result(&panel);
        self.view.show_notice(&Notice::success(message));
        self.view.set_action_enabled(self.can_submit());
        self.schedule_auto_download(&panel);
        Some(panel)
    }

    fn schedule_auto_download(&self, panel: &ResultPanel) {
        let wanted = match self.schema.auto_download {
            AutoDownload::Never => false,
            AutoDownload::Always => !panel.links.is_empty(),
            AutoDownload::WhenSingleOutput => panel.links.len() == 1,
        };
        if !wanted || !self.config.auto_download {
            return;
        }
        let Some(link) = panel.links.first().cloned() else {
            return;
        };

        let view = Arc::clone(&self.view);
        let delay = Duration::from_millis(self.config.auto_download_delay_ms);
        debug!("Auto-download of {} in {:?}", link.filename, delay);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            view.trigger_download(&link);
        });
        self.state().pending_download = Some(handle);
    }

    // ── helpers ───────────────────────────────────────────────────────────

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: Phase) {
        self.state().phase = phase;
        self.view.show_phase(phase);
    }

    fn settled_phase(&self) -> Phase {
        if self.state().files.is_empty() && self.schema.takes_files() {
            Phase::Idle
        } else {
            Phase::Configure
        }
    }

    fn render_files(&self) {
        let entries = FileEntry::listing(self.state().files.files());
        self.view.render_file_list(&entries);
    }
}

fn initial_phase(schema: &ToolSchema) -> Phase {
    if schema.takes_files() {
        Phase::Idle
    } else {
        Phase::Configure
    }
}

impl std::fmt::Debug for ToolController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolController")
            .field("tool", &self.schema.id)
            .field("phase", &self.phase())
            .field("processing", &self.is_processing())
            .finish()
    }
}
