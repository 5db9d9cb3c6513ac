//! CLI binary for edgequake-pdfbatch.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `PipelineConfig`, runs the selected stages and prints a
//! failure summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfbatch::{
    run_pipeline, FailurePolicy, PipelineConfig, ProgressCallback, RunReport, StageSelection,
    TranscriptionProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar, reset for every document, with a log
/// line per page printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TranscriptionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, doc_name: &str, total_pages: usize) {
        self.bar.reset();
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix(doc_name.to_string());
    }

    fn on_page_start(&self, _doc_name: &str, page_num: usize, _total: usize) {
        *self.page_started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(
        &self,
        _doc_name: &str,
        page_num: usize,
        _processed: usize,
        total: usize,
        markdown_len: usize,
    ) {
        let secs = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(
        &self,
        _doc_name: &str,
        page_num: usize,
        _processed: usize,
        total: usize,
        error: &str,
    ) {
        let secs = self.page_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep the per-page line on one terminal row.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, doc_name: &str, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        self.bar.println(format!(
            "{} {}  {}/{} pages",
            mark,
            bold(doc_name),
            success_count,
            total_pages
        ));
    }

    fn on_batch_complete(&self, _total_documents: usize, failed_pages: usize) {
        self.bar.finish_and_clear();
        if failed_pages > 0 {
            eprintln!(
                "{} {} pages failed",
                red("✘"),
                red(&self.errors.load(Ordering::SeqCst).to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: rasterise, transcribe and assemble every PDF in ./input
  pdfbatch

  # Only rasterise (legacy flag names are accepted as aliases)
  pdfbatch --split

  # Re-transcribe existing page images, then re-assemble
  pdfbatch --transcribe --assemble

  # Rebuild full_document.md from existing fragments (no API key needed)
  pdfbatch --assemble

  # Azure OpenAI deployment, JSON run report
  pdfbatch --provider azure --model my-gpt4o-deployment --report run.json

LAYOUT:
  <input-dir>/<doc>.pdf
  <image-dir>/<doc>/page_<N>.png
  <markdown-dir>/<doc>/page_<N>.md
  <markdown-dir>/<doc>/full_document.md

ENVIRONMENT VARIABLES:
  INPUT_PDF_DIR           Directory containing the source PDFs
  OUTPUT_IMAGE_DIR        Root for rendered page images
  OUTPUT_MARKDOWN_DIR     Root for page fragments and assembled transcripts
  EDGEQUAKE_PROVIDER      Provider (azure, openai, anthropic, gemini, ollama)
  OPENAI_DEPLOYMENT       Model ID or Azure deployment name
  AZURE_OPENAI_ENDPOINT   Azure OpenAI endpoint
  AZURE_OPENAI_API_KEY    Azure OpenAI key
  OPENAI_API_VERSION      Azure OpenAI API version
  OPENAI_API_KEY          OpenAI API key
  PDFIUM_LIB_PATH         Path to libpdfium, or the directory containing it
  RUST_LOG                Overrides the log filter chosen by -v / -q

A .env file in the working directory is loaded before arguments are parsed.
"#;

/// Batch-transcribe folders of PDFs into Markdown using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfbatch",
    version,
    about = "Batch-transcribe folders of PDFs into Markdown using Vision LLMs",
    long_about = "Render every page of every PDF in a directory to PNG, transcribe each page \
with a Vision Language Model and concatenate the page transcripts of each document into \
full_document.md. Stages can be run individually; each one re-reads the output of the \
previous one from disk.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Run the rasterisation stage (PDF → page PNGs).
    #[arg(long, visible_alias = "split")]
    rasterize: bool,

    /// Run the transcription stage (page PNG → page Markdown).
    #[arg(long, visible_alias = "genai")]
    transcribe: bool,

    /// Run the assembly stage (page Markdown → full_document.md).
    #[arg(long, visible_alias = "concat")]
    assemble: bool,

    /// Directory containing the source PDFs.
    #[arg(long, env = "INPUT_PDF_DIR", default_value = "input")]
    input_dir: PathBuf,

    /// Root directory for rendered page images.
    #[arg(long, env = "OUTPUT_IMAGE_DIR", default_value = "output/images")]
    image_dir: PathBuf,

    /// Root directory for page fragments and assembled transcripts.
    #[arg(long, env = "OUTPUT_MARKDOWN_DIR", default_value = "output/markdown")]
    markdown_dir: PathBuf,

    /// LLM provider: azure, openai, anthropic, gemini, ollama.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: azure, openai, anthropic, gemini, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Model ID or Azure deployment name.
    #[arg(long, env = "OPENAI_DEPLOYMENT")]
    model: Option<String>,

    /// Azure OpenAI endpoint; with --azure-api-key selects Azure OpenAI.
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    azure_endpoint: Option<String>,

    /// Azure OpenAI API key.
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    azure_api_key: Option<String>,

    /// Azure OpenAI API version.
    #[arg(long, env = "OPENAI_API_VERSION")]
    api_version: Option<String>,

    /// Path to libpdfium, or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Rendering DPI (36–600).
    #[arg(long, env = "PDFBATCH_DPI", default_value_t = 72,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: u32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDFBATCH_MAX_TOKENS", default_value_t = 32000)]
    max_tokens: usize,

    /// LLM temperature.
    #[arg(long, env = "PDFBATCH_TEMPERATURE", default_value_t = 1.0)]
    temperature: f32,

    /// Per-page LLM call timeout in seconds (unbounded when unset).
    #[arg(long, env = "PDFBATCH_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDFBATCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// What to do after a page fails to transcribe.
    #[arg(long, env = "PDFBATCH_ON_FAILURE", value_enum, default_value = "continue")]
    on_failure: FailurePolicyArg,

    /// Write the run report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFBATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FailurePolicyArg {
    Continue,
    FailFast,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(v: FailurePolicyArg) -> Self {
        match v {
            FailurePolicyArg::Continue => FailurePolicy::Continue,
            FailurePolicyArg::FailFast => FailurePolicy::FailFast,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let stages = StageSelection::only(cli.rasterize, cli.transcribe, cli.assemble);

    // ── Logging setup ────────────────────────────────────────────────────
    // While the progress bar is active only warnings reach the terminal;
    // the bar reports per-page progress itself.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && stages.transcribe;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn TranscriptionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, stages, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let report = run_pipeline(&config).await.context("Pipeline failed")?;

    if let Some(ref path) = cli.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    }

    if !cli.quiet {
        print_summary(&report, started.elapsed());
    }

    if report.has_failures() {
        eprintln!("{}", bold(&red("Failures:")));
        for line in report.failure_summary() {
            eprintln!("  {} {}", red("✗"), line);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// One line per executed stage.
fn print_summary(report: &RunReport, elapsed: Duration) {
    if let Some(ref r) = report.rasterize {
        eprintln!(
            "{}  rasterised {} documents, {} pages  {}",
            mark(r.failures.is_empty()),
            r.documents.len(),
            r.total_pages(),
            dim(&format!("({} failed)", r.failures.len())),
        );
    }
    if let Some(ref t) = report.transcription {
        let failed = t.failed_pages().len();
        eprintln!(
            "{}  transcribed {} pages  {}",
            mark(failed == 0 && !t.aborted),
            t.transcribed_count(),
            dim(&format!("({} failed)", failed)),
        );
    }
    if !report.consistency.is_empty() {
        eprintln!(
            "{}  {} image/fragment mismatches",
            cyan("⚠"),
            report.consistency.len()
        );
    }
    if let Some(ref a) = report.assembly {
        eprintln!(
            "{}  assembled {} documents  {}",
            mark(a.failures.is_empty()),
            a.assembled.len(),
            dim(&format!(
                "({} skipped, {} failed)",
                a.skipped.len(),
                a.failures.len()
            )),
        );
    }
    eprintln!("   {}", dim(&format!("{}ms total", elapsed.as_millis())));
}

fn mark(ok: bool) -> String {
    if ok {
        green("✔")
    } else {
        cyan("⚠")
    }
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(
    cli: &Cli,
    stages: StageSelection,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .input_dir(&cli.input_dir)
        .image_root(&cli.image_dir)
        .markdown_root(&cli.markdown_dir)
        .stages(stages)
        .dpi(cli.dpi)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .failure_policy(cli.on_failure.clone().into());

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let (Some(endpoint), Some(key)) = (&cli.azure_endpoint, &cli.azure_api_key) {
        builder = builder.azure(endpoint.clone(), key.clone());
    }
    if let Some(ref version) = cli.api_version {
        builder = builder.api_version(version.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::LLMProvider;
    use edgequake_pdfbatch::resolve_provider;

    #[test]
    fn azure_environment_resolves_deployment_provider() {
        std::env::set_var("AZURE_OPENAI_ENDPOINT", "https://my-resource.openai.azure.com");
        std::env::set_var("AZURE_OPENAI_API_KEY", "test-key");
        std::env::set_var("OPENAI_API_VERSION", "2024-02-15-preview");
        std::env::remove_var("AZURE_OPENAI_DEPLOYMENT_NAME");
        std::env::remove_var("EDGEQUAKE_PROVIDER");

        let cli = Cli::try_parse_from(["pdfbatch", "--model", "my-gpt4o"]).unwrap();
        let config =
            tokio_test::block_on(build_config(&cli, StageSelection::all(), None)).unwrap();
        assert_eq!(config.api_version.as_deref(), Some("2024-02-15-preview"));

        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "azure-openai");
        assert_eq!(provider.model(), "my-gpt4o");
    }
}
