//! CLI binary for ocr2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ocr2md::pipeline::input::{default_output_path, resolve_input};
use ocr2md::{chat, convert, write_markdown, ConversionConfig, ConversionOutput, Pipeline};
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a scanned image → output/receipt_ocr.md
  ocr2md image receipt.png

  # OCR a PDF, local or remote
  ocr2md pdf report.pdf -o report.md
  ocr2md pdf https://arxiv.org/pdf/1706.03762

  # Extract PDF text and let an LLM format it → output/manual.md
  ocr2md pdf-text manual.pdf --model mistralai/mistral-large

  # Free-form prompt
  ocr2md chat "Summarise the Mistral OCR API in one sentence"

  # JSON output with per-page results and stats
  ocr2md pdf report.pdf --json > report.json

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY     Mistral API key (image and pdf commands)
  OPENROUTER_API_KEY  OpenRouter API key (pdf-text and chat commands)
  OCR2MD_PROVIDER     Override LLM provider
  OCR2MD_MODEL        Override LLM model
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)

Variables may also be placed in a .env file in the working directory.
"#;

/// Convert images and PDFs to Markdown with Mistral OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2md",
    version,
    about = "Convert images and PDFs to Markdown with Mistral OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR a PNG/JPEG image.
    Image(ConvertArgs),
    /// OCR a PDF file or HTTP/HTTPS URL.
    Pdf(ConvertArgs),
    /// Extract PDF text locally and format it with an LLM.
    PdfText(ConvertArgs),
    /// Send a free-form prompt to the LLM and print the reply.
    Chat {
        /// Prompt text.
        prompt: String,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input file path (or URL for `pdf`).
    input: String,

    /// Output Markdown path. Default: output/<name>[_ocr].md
    #[arg(short, long, env = "OCR2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Print Markdown to stdout instead of writing a file.
    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    /// Title in the front-matter header. Default: input file name.
    #[arg(long, env = "OCR2MD_TITLE")]
    title: Option<String>,

    /// Date in the front-matter header (YYYY-MM-DD). Default: today (UTC).
    #[arg(long, env = "OCR2MD_DATE")]
    date: Option<NaiveDate>,

    /// PDF user password for encrypted documents (`pdf-text` only).
    #[arg(long, env = "OCR2MD_PASSWORD")]
    password: Option<String>,

    /// Print structured JSON (ConversionOutput) to stdout instead of Markdown.
    #[arg(long, env = "OCR2MD_JSON", conflicts_with = "output")]
    json: bool,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// LLM model ID for `pdf-text` and `chat`.
    #[arg(long, global = true, env = "OCR2MD_MODEL")]
    model: Option<String>,

    /// LLM provider for `pdf-text` and `chat`. Default: openrouter.
    #[arg(long, global = true, env = "OCR2MD_PROVIDER")]
    provider: Option<String>,

    /// Mistral OCR model.
    #[arg(long, global = true, env = "OCR2MD_OCR_MODEL", default_value = "mistral-ocr-latest")]
    ocr_model: String,

    /// Mistral API key (falls back to MISTRAL_API_KEY).
    #[arg(long, global = true, env = "MISTRAL_API_KEY", hide_env_values = true)]
    mistral_api_key: Option<String>,

    /// Path to a text file holding a custom formatting prompt.
    #[arg(long, global = true, env = "OCR2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "OCR2MD_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max LLM output tokens.
    #[arg(long, global = true, env = "OCR2MD_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Retries on remote failure.
    #[arg(long, global = true, env = "OCR2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call remote timeout in seconds.
    #[arg(long, global = true, env = "OCR2MD_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable the spinner.
    #[arg(long, global = true, env = "OCR2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCR2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OCR2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let global = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !global.quiet && !global.no_progress;
    let filter = if global.verbose {
        "debug"
    } else if global.quiet || show_progress {
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

    match &cli.command {
        Command::Image(args) => run_convert(global, args, Pipeline::ImageOcr, show_progress).await,
        Command::Pdf(args) => run_convert(global, args, Pipeline::PdfOcr, show_progress).await,
        Command::PdfText(args) => run_convert(global, args, Pipeline::PdfText, show_progress).await,
        Command::Chat { prompt } => run_chat(global, prompt, show_progress).await,
    }
}

async fn run_convert(
    global: &GlobalArgs,
    args: &ConvertArgs,
    pipeline: Pipeline,
    show_progress: bool,
) -> Result<()> {
    let config = build_config(global, Some(args)).await?;

    // Resolve the destination before any remote call so a bad path fails fast.
    let output_path = if args.stdout || args.json {
        None
    } else if let Some(ref path) = args.output {
        Some(path.clone())
    } else {
        let resolved = resolve_input(&args.input, pipeline).context("Invalid input")?;
        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        Some(default_output_path(&cwd, &resolved.title(), pipeline))
    };

    let output: ConversionOutput = with_spinner(
        show_progress && !args.json,
        spinner_message(pipeline),
        convert(&args.input, pipeline, &config),
    )
    .await
    .context("Conversion failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    match output_path {
        Some(path) => {
            write_markdown(&path, &output.markdown)
                .await
                .context("Failed to write output")?;
            if !global.quiet {
                eprintln!(
                    "{} {} {}",
                    green("✔"),
                    bold(&path.display().to_string()),
                    dim(&format!("({} chars)", output.stats.output_chars)),
                );
                if output.stats.total_input_tokens + output.stats.total_output_tokens > 0 {
                    eprintln!(
                        "   {} tokens in  /  {} tokens out  —  {}ms total",
                        dim(&output.stats.total_input_tokens.to_string()),
                        dim(&output.stats.total_output_tokens.to_string()),
                        output.stats.total_duration_ms,
                    );
                }
            }
        }
        None => print_stdout(&output.markdown)?,
    }

    Ok(())
}

async fn run_chat(global: &GlobalArgs, prompt: &str, show_progress: bool) -> Result<()> {
    let config = build_config(global, None).await?;
    let completion = with_spinner(show_progress, "Waiting for reply…", chat(prompt, &config))
        .await
        .context("Chat request failed")?;

    print_stdout(&completion.content)?;
    if !global.quiet {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms",
            dim(&completion.input_tokens.to_string()),
            dim(&completion.output_tokens.to_string()),
            completion.duration_ms,
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(global: &GlobalArgs, args: Option<&ConvertArgs>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .ocr_model(&global.ocr_model)
        .max_retries(global.max_retries)
        .api_timeout_secs(global.api_timeout);

    if let Some(ref path) = global.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref key) = global.mistral_api_key {
        builder = builder.mistral_api_key(key);
    }
    if let Some(ref provider) = global.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = global.model {
        builder = builder.model(model);
    }
    if let Some(t) = global.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = global.max_tokens {
        builder = builder.max_tokens(n);
    }

    if let Some(args) = args {
        if let Some(ref title) = args.title {
            builder = builder.title(title);
        }
        if let Some(date) = args.date {
            builder = builder.date(date);
        }
        if let Some(ref pwd) = args.password {
            builder = builder.password(pwd);
        }
    }

    builder.build().context("Invalid configuration")
}

/// Await `fut` while an indicatif spinner runs on stderr.
async fn with_spinner<T>(enabled: bool, message: &'static str, fut: impl Future<Output = T>) -> T {
    if !enabled {
        return fut.await;
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));

    let out = fut.await;
    bar.finish_and_clear();
    out
}

fn spinner_message(pipeline: Pipeline) -> &'static str {
    match pipeline {
        Pipeline::ImageOcr => "Running OCR on image…",
        Pipeline::PdfOcr => "Running OCR on PDF…",
        Pipeline::PdfText => "Formatting extracted text…",
    }
}

fn print_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_and_output_path_conflict() {
        let err = Cli::try_parse_from(["ocr2md", "pdf", "a.pdf", "--json", "-o", "a.md"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn json_alone_parses() {
        let cli = Cli::try_parse_from(["ocr2md", "pdf", "a.pdf", "--json"]).unwrap();
        match cli.command {
            Command::Pdf(args) => {
                assert!(args.json);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
