//! CLI binary for edgequake-webrag.
//!
//! Processes one webpage or PDF, then answers questions about it, either
//! from `--question` flags or in an interactive prompt.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_webrag::{
    Assistant, AssistantConfig, AssistantConfigBuilder, Language, ProcessingProgressCallback,
    ProcessingStage, ProgressCallback, Role, SessionContext, SourceDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
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

fn spinner(prefix: &str, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    bar.set_style(style);
    bar.set_prefix(prefix.to_string());
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner per processing run, a tick line per
/// finished stage.
#[derive(Default)]
struct CliProgressCallback {
    state: Mutex<Option<RunState>>,
}

struct RunState {
    bar: ProgressBar,
    stage: ProcessingStage,
    started: Instant,
}

impl CliProgressCallback {
    fn finish(&self) -> Option<RunState> {
        let run = self.state.lock().ok()?.take()?;
        run.bar.finish_and_clear();
        Some(run)
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: ProcessingStage) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match state.as_mut() {
            Some(run) => {
                run.bar.println(format!(
                    "  {} {:<30} {}",
                    green("✓"),
                    run.stage.label(),
                    dim(&format!("{:.1}s", run.started.elapsed().as_secs_f64()))
                ));
                run.bar.set_message(stage.label());
                run.stage = stage;
                run.started = Instant::now();
            }
            None => {
                *state = Some(RunState {
                    bar: spinner("Processing", stage.label()),
                    stage,
                    started: Instant::now(),
                });
            }
        }
    }

    fn on_cache_hit(&self, document_key: &str) {
        if let Ok(state) = self.state.lock() {
            if let Some(run) = state.as_ref() {
                run.bar
                    .println(format!("  {} already indexed: {}", cyan("↺"), dim(document_key)));
            }
        }
    }

    fn on_ready(&self, document_key: &str) {
        if let Some(run) = self.finish() {
            eprintln!(
                "  {} {:<30} {}",
                green("✓"),
                run.stage.label(),
                dim(&format!("{:.1}s", run.started.elapsed().as_secs_f64()))
            );
        }
        eprintln!("{} Ready: {}", green("✔"), bold(document_key));
    }

    fn on_error(&self, stage: Option<ProcessingStage>, _error: &str) {
        // The error itself is reported by the caller.
        self.finish();
        let what = stage.map(|s| s.label()).unwrap_or("Processing");
        eprintln!("{} {} failed", red("✘"), what);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Chat about a webpage
  webrag --url https://www.rust-lang.org

  # Ask one question about an uploaded PDF and exit
  webrag --file report.pdf -Q "What was the revenue in 2023?"

  # Summary in French, transcript as JSON
  webrag --url https://example.com --summary --language french --json

INTERACTIVE COMMANDS:
  /summary          Summarize the document (not added to the history)
  /history          Show the conversation so far
  /language <name>  Answer in English, Spanish, French, German or Chinese
  /clear            Clear the conversation and detach the document
  /reload           Reattach the last document without indexing it again
  /open <url|path>  Process another webpage or PDF
  /quit             Exit

ENVIRONMENT VARIABLES:
  FIRECRAWL_API_KEY       Firecrawl API key (webpage screenshots)
  COLIVARA_API_KEY        ColiVara API key (indexing and page search)
  FIRECRAWL_BASE_URL      Override the Firecrawl endpoint (self-hosted)
  COLIVARA_BASE_URL       Override the ColiVara endpoint (self-hosted)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

  Variables are also read from a .env file in the current directory.
"#;

/// Ask questions about webpages and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "webrag",
    version,
    about = "Ask questions about webpages and PDFs using multimodal retrieval",
    long_about = "Capture a full-page screenshot of a webpage (or take an uploaded PDF), index its \
pages as images and answer questions about it with a vision-capable LLM. Supports OpenAI, \
Anthropic, Google Gemini and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Webpage to capture. Takes precedence over --file.
    #[arg(long, env = "WEBRAG_URL")]
    url: Option<String>,

    /// PDF file to upload.
    #[arg(long, env = "WEBRAG_FILE")]
    file: Option<PathBuf>,

    /// Answer language.
    #[arg(short, long, env = "WEBRAG_LANGUAGE", value_enum, default_value = "english")]
    language: LanguageArg,

    /// Question to ask; repeat for several. Skips the interactive prompt.
    #[arg(short = 'Q', long = "question", env = "WEBRAG_QUESTION")]
    questions: Vec<String>,

    /// Print a summary of the document after processing.
    #[arg(long, env = "WEBRAG_SUMMARY")]
    summary: bool,

    /// Print the session transcript as JSON on exit.
    #[arg(long, env = "WEBRAG_JSON")]
    json: bool,

    /// Directory for the screenshot PDF and uploaded files.
    #[arg(long, env = "WEBRAG_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Page images retrieved per question.
    #[arg(long, env = "WEBRAG_TOP_K", default_value_t = 3)]
    top_k: usize,

    /// Max LLM output tokens per answer.
    #[arg(long, env = "WEBRAG_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "WEBRAG_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Path to a text file containing a custom answer system prompt.
    #[arg(long, env = "WEBRAG_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Milliseconds the scraper lets the page settle before the screenshot.
    #[arg(long, env = "WEBRAG_SCRAPE_WAIT", default_value_t = 10_000)]
    scrape_wait: u64,

    /// Screenshot download timeout in seconds.
    #[arg(long, env = "WEBRAG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Scrape, indexing and search timeout in seconds.
    #[arg(long, env = "WEBRAG_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Disable spinners.
    #[arg(long, env = "WEBRAG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WEBRAG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except answers and errors.
    #[arg(short, long, env = "WEBRAG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    English,
    Spanish,
    French,
    German,
    Chinese,
}

impl From<LanguageArg> for Language {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::English => Language::English,
            LanguageArg::Spanish => Language::Spanish,
            LanguageArg::French => Language::French,
            LanguageArg::German => Language::German,
            LanguageArg::Chinese => Language::Chinese,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Spinners give all the feedback that matters; keep INFO logs out of
    // their way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && io::stderr().is_terminal();
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

    // ── Build assistant ──────────────────────────────────────────────────
    let config = build_config(&cli).await?;
    let mut assistant = Assistant::new(config).context("Failed to initialise assistant")?;
    if show_progress {
        let cb: ProgressCallback = Arc::new(CliProgressCallback::default());
        assistant = assistant.with_progress(cb);
    }

    let source = read_source(cli.url.as_deref(), cli.file.as_deref())
        .await?
        .context("Nothing to process: pass --url or --file")?;

    let mut session = assistant.start_session();
    let ui = Ui {
        live: show_progress,
        quiet: cli.quiet,
    };

    let result = run(&cli, &ui, &mut assistant, &mut session, source).await;

    if cli.json {
        let dump = serde_json::json!({
            "session": session.id(),
            "collection": session.collection_name(),
            "document": session.document_key(),
            "document_path": session.document_path(),
            "transcript": session.transcript(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&dump).context("Failed to serialise transcript")?
        );
    }
    assistant.end_session(&session);
    result
}

struct Ui {
    live: bool,
    quiet: bool,
}

async fn run(
    cli: &Cli,
    ui: &Ui,
    assistant: &mut Assistant,
    session: &mut SessionContext,
    source: SourceDocument,
) -> Result<()> {
    process(ui, assistant, session, source)
        .await
        .context("Processing failed")?;

    if cli.summary {
        summarize(ui, assistant, session).await?;
    }

    if !cli.questions.is_empty() {
        for question in &cli.questions {
            ask(ui, session, question).await?;
        }
        return Ok(());
    }

    if !cli.summary && io::stdin().is_terminal() {
        repl(ui, assistant, session).await?;
    }
    Ok(())
}

/// Map CLI args to `AssistantConfig`, on top of the environment.
async fn build_config(cli: &Cli) -> Result<AssistantConfig> {
    let mut builder = AssistantConfigBuilder::from_config(AssistantConfig::from_env())
        .work_dir(&cli.work_dir)
        .language(cli.language.into())
        .top_k(cli.top_k)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .scrape_wait_ms(cli.scrape_wait)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }

    builder.build().context("Invalid configuration")
}

async fn read_source(url: Option<&str>, file: Option<&Path>) -> Result<Option<SourceDocument>> {
    let upload = match file {
        Some(path) if url.map(str::trim).unwrap_or("").is_empty() => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.pdf".to_string());
            Some((bytes, name))
        }
        _ => None,
    };
    Ok(SourceDocument::from_inputs(url, upload))
}

// ── Actions ──────────────────────────────────────────────────────────────────

async fn process(
    ui: &Ui,
    assistant: &mut Assistant,
    session: &mut SessionContext,
    source: SourceDocument,
) -> Result<()> {
    let outcome = assistant.process(session, source).await?;
    if !ui.quiet && !ui.live {
        eprintln!(
            "Document ready: {} ({}{})",
            outcome.document_key,
            outcome.document_path.display(),
            if outcome.reused_index { ", cached" } else { "" }
        );
    }
    Ok(())
}

async fn summarize(ui: &Ui, assistant: &Assistant, session: &SessionContext) -> Result<()> {
    let bar = ui.live.then(|| spinner("Summarizing", "retrieving pages…"));
    let summary = assistant.summarize(session).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let summary = summary.context("Summary failed")?;
    if !ui.quiet {
        eprintln!("{}", bold("Summary"));
    }
    println!("{summary}");
    Ok(())
}

/// Ask one question, showing the answer's latest line while it streams,
/// then print the deduplicated answer.
async fn ask(ui: &Ui, session: &mut SessionContext, question: &str) -> Result<()> {
    let mut turn = session.ask(question)?;
    let bar = ui.live.then(|| spinner("Answering", "retrieving pages…"));

    let mut failure = None;
    while let Some(chunk) = turn.next_chunk().await {
        if let Err(e) = chunk {
            failure = Some(e);
            break;
        }
        if let Some(ref bar) = bar {
            let latest = turn.partial().lines().last().unwrap_or("").trim();
            bar.set_message(truncate(latest, 70));
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    if let Some(e) = failure {
        return Err(e).context("Answer failed");
    }

    let answer = turn.finish(session);
    if !ui.quiet {
        eprintln!("{}", cyan("assistant ›"));
    }
    println!("{answer}");
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── Interactive prompt ───────────────────────────────────────────────────────

async fn repl(ui: &Ui, assistant: &mut Assistant, session: &mut SessionContext) -> Result<()> {
    if !ui.quiet {
        eprintln!("{}", dim("Ask a question, or /help for commands."));
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("{} ", cyan("you ›"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        // Each action reports its own failure and the prompt carries on.
        let outcome = match command {
            "/quit" | "/exit" => break,
            "/help" => {
                eprintln!("{}", AFTER_HELP.split("ENVIRONMENT").next().unwrap_or(""));
                Ok(())
            }
            "/summary" => summarize(ui, assistant, session).await,
            "/history" => {
                print_history(session);
                Ok(())
            }
            "/language" => arg
                .parse::<Language>()
                .map(|lang| {
                    session.set_language(lang);
                    eprintln!("Answering in {}", bold(lang.name()));
                })
                .map_err(anyhow::Error::from),
            "/clear" => {
                session.reset();
                eprintln!("Conversation cleared. /reload to continue with the same document.");
                Ok(())
            }
            "/reload" => {
                if assistant.attach_cached(session) {
                    eprintln!("Reattached {}", session.document_key().unwrap_or("document"));
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("No indexed document to reattach; use /open"))
                }
            }
            "/open" => open(ui, assistant, session, arg).await,
            _ if command.starts_with('/') => Err(anyhow::anyhow!("Unknown command {command}")),
            _ => ask(ui, session, line).await,
        };

        if let Err(e) = outcome {
            eprintln!("{} {:#}", red("✗"), e);
        }
    }
    Ok(())
}

async fn open(
    ui: &Ui,
    assistant: &mut Assistant,
    session: &mut SessionContext,
    target: &str,
) -> Result<()> {
    let source = if target.contains("://") {
        read_source(Some(target), None).await?
    } else {
        read_source(None, Some(Path::new(target))).await?
    };
    let source = source.context("Usage: /open <url|path>")?;
    process(ui, assistant, session, source)
        .await
        .context("Processing failed")
}

fn print_history(session: &SessionContext) {
    if session.transcript().is_empty() {
        eprintln!("{}", dim("(no messages)"));
        return;
    }
    for entry in session.transcript().entries() {
        let who = match entry.role {
            Role::User => cyan("you"),
            Role::Assistant => green("assistant"),
        };
        println!("{who}: {}", entry.content);
    }
}
