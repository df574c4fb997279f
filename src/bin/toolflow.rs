//! CLI binary for toolflow.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, renders the controller's view in the terminal and saves
//! the results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use toolflow::{
    fetch_to_dir, format_file_size, health_check, tools, ClientConfig, DownloadLink,
    FileCandidate, FileEntry, Notice, NoticeLevel, OptionKind, Phase, RawOptions, ReqwestTransport,
    ResultPanel, SubmitOutcome, ToolController, ToolView, Transport,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal view using indicatif ────────────────────────────────────────────

/// Renders notices, the file list and a progress bar on stderr, and
/// remembers which links the controller asked to download automatically.
struct CliView {
    bar: Option<ProgressBar>,
    quiet: bool,
    triggered: Mutex<Vec<DownloadLink>>,
}

impl CliView {
    fn new(show_progress: bool, quiet: bool) -> Arc<Self> {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::hidden();
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_length(100);
            bar
        });
        Arc::new(Self {
            bar,
            quiet,
            triggered: Mutex::new(Vec::new()),
        })
    }

    fn take_triggered(&self) -> Vec<DownloadLink> {
        std::mem::take(&mut *self.triggered.lock().unwrap())
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) if !bar.is_hidden() => bar.println(line),
            _ => eprintln!("{line}"),
        }
    }
}

impl ToolView for CliView {
    fn render_file_list(&self, files: &[FileEntry]) {
        if self.quiet {
            return;
        }
        for f in files {
            self.println(format!(
                "  {} {:<40} {}",
                dim(&format!("{:>2}.", f.index + 1)),
                f.name,
                dim(&f.size_label)
            ));
        }
    }

    fn show_phase(&self, phase: Phase) {
        let Some(bar) = &self.bar else { return };
        match phase {
            Phase::Submitting => {
                bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                bar.reset();
                bar.set_prefix("Processing");
                bar.enable_steady_tick(Duration::from_millis(80));
            }
            Phase::Succeeded | Phase::Failed => bar.finish_and_clear(),
            Phase::Idle | Phase::Configure => {}
        }
    }

    fn show_progress(&self, percent: u8, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_position(percent as u64);
            bar.set_message(message.to_string());
        }
    }

    fn show_notice(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => self.println(format!("{} {}", red("✘"), red(&notice.message))),
            NoticeLevel::Success if !self.quiet => {
                self.println(format!("{} {}", green("✔"), bold(&notice.message)))
            }
            NoticeLevel::Info if !self.quiet => {
                self.println(format!("{} {}", cyan("◆"), notice.message))
            }
            _ => {}
        }
    }

    fn trigger_download(&self, link: &DownloadLink) {
        self.triggered.lock().unwrap().push(link.clone());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List the built-in tools and their options
  toolflow --list-tools

  # Merge two PDFs (result saved to the current directory)
  toolflow pdf-merger doc1.pdf doc2.pdf

  # Compress with explicit options
  toolflow pdf-compressor report.pdf -O compression_level=high -O quality=70

  # Split every 3 pages and save every part
  toolflow pdf-splitter book.pdf -O split_type=every -O every_n=3 --download-all -d parts/

  # Generate a QR code (no input files)
  toolflow qr-generator -O content=https://example.com -O size=300 --download-all

  # Check that the backend is up
  toolflow --health --server http://localhost:5000

  # JSON result for scripting
  toolflow pdf-compressor report.pdf --json --no-auto-download

ENVIRONMENT VARIABLES:
  TOOLFLOW_SERVER           Backend base URL
  TOOLFLOW_OUTPUT_DIR       Where downloaded results are written
  TOOLFLOW_TIMEOUT          Request timeout in seconds (0 = none)
  RUST_LOG                  Overrides the log filter
"#;

/// Submit files to a conversion tool backend and download the result.
#[derive(Parser, Debug)]
#[command(
    name = "toolflow",
    version,
    about = "Submit files to a conversion tool backend and download the result",
    long_about = "Upload files to a PDF/image tool backend, apply tool options, wait for the \
single JSON response and save the produced files. Options are validated, defaulted and clamped \
locally before anything is sent.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Tool identifier, e.g. pdf-merger (see --list-tools).
    tool: Option<String>,

    /// Input files, in submission order.
    files: Vec<PathBuf>,

    /// Tool option as NAME=VALUE. Repeatable.
    #[arg(short = 'O', long = "opt", value_name = "NAME=VALUE")]
    opts: Vec<String>,

    /// Backend base URL.
    #[arg(short, long, env = "TOOLFLOW_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Directory for downloaded results.
    #[arg(short = 'd', long, env = "TOOLFLOW_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Request timeout in seconds; 0 waits indefinitely.
    #[arg(long, env = "TOOLFLOW_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Never download results automatically.
    #[arg(long, env = "TOOLFLOW_NO_AUTO_DOWNLOAD")]
    no_auto_download: bool,

    /// Delay before an automatic download, in milliseconds.
    #[arg(long, env = "TOOLFLOW_AUTO_DOWNLOAD_DELAY_MS", default_value_t = 2000)]
    auto_download_delay_ms: u64,

    /// Download every result file, not only the automatic one.
    #[arg(long, env = "TOOLFLOW_DOWNLOAD_ALL")]
    download_all: bool,

    /// Replace the tool's per-file size limit (bytes).
    #[arg(long, env = "TOOLFLOW_MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    /// Simulated progress tick interval in milliseconds.
    #[arg(long, env = "TOOLFLOW_PROGRESS_TICK_MS", default_value_t = 200)]
    progress_tick_ms: u64,

    /// Print the built-in tools and exit.
    #[arg(long)]
    list_tools: bool,

    /// Probe GET /health and exit.
    #[arg(long)]
    health: bool,

    /// Print structured JSON instead of text.
    #[arg(long, env = "TOOLFLOW_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TOOLFLOW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TOOLFLOW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TOOLFLOW_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_tools {
        return list_tools(cli.json);
    }

    let config = build_config(&cli)?;
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new(&config).context("Failed to create HTTP client")?);

    // ── Health probe ─────────────────────────────────────────────────────
    if cli.health {
        let health = health_check(transport.as_ref())
            .await
            .with_context(|| format!("Backend at {} is not healthy", config.base_url))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&health).context("Failed to serialise health")?
            );
        } else {
            println!("{} {}  {}", green("✔"), bold(&health.status), dim(&config.base_url));
        }
        return Ok(());
    }

    // ── Select tool and files ────────────────────────────────────────────
    let tool_id = cli
        .tool
        .as_deref()
        .context("No tool given (see --list-tools)")?;
    let schema = tools::lookup(tool_id)?.clone();

    let view = CliView::new(show_progress, cli.quiet);
    let controller = ToolController::new(schema, config, Arc::clone(&transport), view.clone());

    let mut candidates = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        candidates.push(FileCandidate::from_path(path)?);
    }
    if !candidates.is_empty() {
        let report = controller.add_files(candidates);
        if !report.rejected.is_empty() {
            bail!("{} file(s) rejected", report.rejected.len());
        }
    }

    for pair in &cli.opts {
        let (name, value) = RawOptions::parse_pair(pair)?;
        controller.set_option(name, value);
    }

    // ── Submit ───────────────────────────────────────────────────────────
    let panel = match controller
        .submit()
        .await
        .with_context(|| format!("{} failed", controller.schema().name))?
    {
        SubmitOutcome::Completed(panel) => panel,
        SubmitOutcome::AlreadyInFlight => bail!("A submission is already in progress"),
        SubmitOutcome::Discarded => bail!("The submission was discarded"),
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&panel).context("Failed to serialise result")?
        );
    } else if !cli.quiet {
        print_panel(&panel);
    }

    // ── Download ─────────────────────────────────────────────────────────
    controller.wait_for_auto_download().await;
    let links = if cli.download_all {
        panel.links.clone()
    } else {
        view.take_triggered()
    };
    for link in &links {
        let path = fetch_to_dir(transport.as_ref(), link, &cli.output_dir)
            .await
            .with_context(|| format!("Failed to save {}", link.filename))?;
        if !cli.quiet && !cli.json {
            eprintln!("{} saved {}", green("✔"), bold(&path.display().to_string()));
        }
    }
    if links.is_empty() && !panel.links.is_empty() && !cli.quiet && !cli.json {
        eprintln!("{}", dim("Nothing downloaded; pass --download-all to save the files above."));
    }

    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let config = ClientConfig::builder()
        .base_url(cli.server.clone())
        .request_timeout_secs((cli.timeout > 0).then_some(cli.timeout))
        .auto_download(!cli.no_auto_download)
        .auto_download_delay_ms(cli.auto_download_delay_ms)
        .progress_tick_ms(cli.progress_tick_ms)
        .max_file_size_override(cli.max_file_size)
        .build()
        .context("Invalid configuration")?;
    Ok(config)
}

fn print_panel(panel: &ResultPanel) {
    let s = &panel.summary;
    if let (Some(orig), Some(comp)) = (s.original_size, s.compressed_size) {
        eprintln!(
            "   {} → {}  {}",
            format_file_size(orig),
            format_file_size(comp),
            dim(&format!("({}% smaller)", s.savings_percent.unwrap_or(0)))
        );
    }
    if let Some(pages) = s.page_count {
        eprintln!("   {} page(s)", pages);
    }
    if let Some(count) = s.file_count {
        eprintln!("   {} file(s)", count);
    }
    if let Some(ref t) = s.processing_time {
        eprintln!("   {}", dim(&format!("processed in {t}s")));
    }
    for link in &panel.links {
        println!("{}  {}", bold(&link.filename), dim(&link.url));
    }
}

fn list_tools(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(tools::catalog()).context("Failed to serialise catalog")?
        );
        return Ok(());
    }
    for tool in tools::catalog() {
        let files = match (tool.min_files, tool.max_files) {
            (_, 0) => "no files".to_string(),
            (_, 1) => "1 file".to_string(),
            (min, max) => format!("{min}–{max} files"),
        };
        println!("{}  {}  {}", bold(&tool.id), tool.name, dim(&files));
        for opt in &tool.options {
            let detail = match &opt.kind {
                OptionKind::Integer { min, max, default } => {
                    format!("{min}–{max}, default {default}")
                }
                OptionKind::Choice { values, default } => {
                    format!("{}, default {default}", values.join("|"))
                }
                OptionKind::Flag { default, .. } => format!("flag, default {default}"),
                OptionKind::Text { default, required, .. } => match (default, required) {
                    (Some(d), _) => format!("text, default {d}"),
                    (None, true) => "text, required".to_string(),
                    (None, false) => "text".to_string(),
                },
            };
            let condition = opt
                .visible_when
                .as_ref()
                .map(|c| format!(" (when {}={})", c.option, c.equals))
                .unwrap_or_default();
            println!("    {:<20} {}{}", opt.name, dim(&detail), dim(&condition));
        }
    }
    Ok(())
}
