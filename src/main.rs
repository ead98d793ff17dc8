// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, error, info, warn};
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use zotcite::app_config::{self, Config};
use zotcite::app_controller::{CommandOutcome, Controller, UserInterface};
use zotcite::cancellation::Cancellation;
use zotcite::citation::Dialect;
use zotcite::document::Document;
use zotcite::file_utils::FileManager;
use zotcite::session::Session;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for Dialect to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDialect {
    Markdown,
    Latex,
}

impl From<CliDialect> for Dialect {
    fn from(cli_dialect: CliDialect) -> Self {
        match cli_dialect {
            CliDialect::Markdown => Dialect::Markdown,
            CliDialect::Latex => Dialect::Latex,
        }
    }
}

/// Document and cursor the command works on
#[derive(Args, Debug)]
struct DocumentArgs {
    /// Markdown or LaTeX document to edit
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,

    /// Cursor as a byte offset into the document
    #[arg(long, conflicts_with_all = ["line", "column"])]
    offset: Option<usize>,

    /// Cursor line (zero-based)
    #[arg(long)]
    line: Option<usize>,

    /// Cursor column in characters (zero-based)
    #[arg(long, requires = "line")]
    column: Option<usize>,

    /// Override the dialect detected from the file extension
    #[arg(short, long, value_enum)]
    dialect: Option<CliDialect>,

    /// Folder substituted for ${workspaceFolder}
    #[arg(short, long)]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export the bibliography of every key cited in the document
    Export {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Bibliography file name; prompts when omitted
        #[arg(short, long)]
        bib_name: Option<String>,
    },

    /// Pick items and insert a citation marker
    Cite {
        #[command(flatten)]
        doc: DocumentArgs,
    },

    /// Pick items, insert a marker and append new entries to the .bib file
    #[command(name = "cite-bib")]
    CiteBib {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Bibliography file name for this run only
        #[arg(short, long)]
        bib_name: Option<String>,
    },

    /// Pick items and add Markdown footnotes with their formatted entries
    #[command(name = "cite-md")]
    CiteMd {
        #[command(flatten)]
        doc: DocumentArgs,
    },

    /// Add a Markdown footnote pointing at a URL
    Hyperlink {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Link target; read from stdin when omitted
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Generate shell completions for zotcite
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// zotcite - Zotero citations for Markdown and LaTeX documents
///
/// Picks items in Zotero through Better BibTeX, inserts citation markers at
/// the cursor and keeps the document's bibliography up to date.
#[derive(Parser, Debug)]
#[command(name = "zotcite")]
#[command(version)]
#[command(about = "Zotero citation assistant for Markdown and LaTeX")]
#[command(long_about = "zotcite inserts Zotero citations into Markdown and LaTeX documents.

EXAMPLES:
    zotcite cite paper.md --offset 120            # Insert [@key] at byte 120
    zotcite cite paper.tex --line 10 --column 4   # Insert \\cite{key} at line 10
    zotcite cite-bib paper.md --line 3 -b refs.bib
    zotcite export paper.md -b '${fileBasenameNoExtension}.bib'
    zotcite hyperlink notes.md --url https://example.org
    zotcite completions bash > zotcite.bash

CONFIGURATION:
    Configuration is stored in zotcite.json by default. If the file does not
    exist, a default one is created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "zotcite.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Better BibTeX server URL
    #[arg(long, env = "ZOTCITE_SERVER_URL", global = true)]
    server_url: Option<String>,

    /// Hide the progress bar
    #[arg(long, global = true)]
    no_progress: bool,
}

// @struct: Custom logger implementation, filtering on the global max level
struct CustomLogger;

impl CustomLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌"),
            Level::Warn => ("\x1B[1;33m", "🚧"),
            Level::Info => ("\x1B[1;32m", ""),
            Level::Debug => ("\x1B[1;36m", "🔍"),
            Level::Trace => ("\x1B[1;35m", "📋"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, emoji) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// How often a pending prompt looks at the cancellation token
const PROMPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal prompts; notifications go through the logger
struct ConsoleInterface {
    preset_name: Option<String>,
    cancellation: Cancellation,
}

impl ConsoleInterface {
    fn new(preset_name: Option<String>, cancellation: Cancellation) -> Self {
        Self { preset_name, cancellation }
    }
}

impl UserInterface for ConsoleInterface {
    fn prompt_file_name(&mut self, default: &str) -> Option<String> {
        if let Some(name) = self.preset_name.take() {
            return Some(name);
        }

        eprint!("Bibliography file name [{}]: ", default);
        let _ = std::io::stderr().flush();

        // Read on a helper thread so Ctrl-C can abandon the prompt
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let mut answer = String::new();
            let read = std::io::stdin().lock().read_line(&mut answer).map(|n| (n, answer));
            let _ = sender.send(read);
        });

        loop {
            if self.cancellation.is_cancelled() {
                eprintln!();
                return None;
            }
            match receiver.recv_timeout(PROMPT_POLL_INTERVAL) {
                Ok(Ok((0, _))) | Ok(Err(_)) => return None,
                Ok(Ok((_, answer))) if answer.trim().is_empty() => return Some(default.to_string()),
                Ok(Ok((_, answer))) => return Some(answer.trim().to_string()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn status(&mut self, message: &str) {
        info!("{}", message);
    }

    fn info(&mut self, message: &str) {
        info!("{}", message);
    }

    fn error(&mut self, message: &str) {
        error!("{}", message);
    }
}

fn level_filter(level: Option<&CliLogLevel>, config: &Config) -> LevelFilter {
    match level {
        Some(level) => app_config::LogLevel::from(level.clone()).to_level_filter(),
        None => config.log_level.to_level_filter(),
    }
}

fn load_config(options: &CommandLineOptions) -> Result<Config> {
    let config_path = &options.config_path;

    let mut config = if Path::new(config_path).exists() {
        let content = FileManager::read_to_string(config_path)?;
        serde_json::from_str::<Config>(&content)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        FileManager::write_to_file(config_path, &config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(server_url) = &options.server_url {
        config.server_url = server_url.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn open_document(args: &DocumentArgs) -> Result<Document> {
    let mut doc = Document::load(&args.document)?;
    if let Some(dialect) = args.dialect {
        doc = doc.with_dialect(dialect.into());
    }

    let cursor = match (args.offset, args.line) {
        (Some(offset), _) => offset,
        (None, Some(line)) => doc.offset_at(line, args.column.unwrap_or(0)),
        (None, None) => doc.text().len(),
    };
    doc.set_cursor(cursor);
    debug!("Cursor at {:?} (offset {})", doc.position_at(doc.cursor()), doc.cursor());

    if doc.dialect().is_supported() {
        debug!("Editing {:?} as {}", args.document, doc.dialect().display_name());
    } else {
        warn!("{:?} is neither Markdown nor LaTeX, nothing will be changed", args.document);
    }
    Ok(doc)
}

fn read_url_from_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read URL from stdin")?;
    Ok(input.trim().to_string())
}

fn report(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Completed => info!("Done."),
        CommandOutcome::CompletedWithErrors(errors) => warn!("Done with {} error(s).", errors.len()),
        CommandOutcome::Skipped => debug!("Nothing to do."),
        CommandOutcome::Cancelled => warn!("Cancelled."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Start at info level; the config may lower or raise it
    CustomLogger::init(LevelFilter::Info)?;

    let options = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &options.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "zotcite", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &options.log_level {
        log::set_max_level(app_config::LogLevel::from(level.clone()).to_level_filter());
    }
    let config = load_config(&options)?;
    log::set_max_level(level_filter(options.log_level.as_ref(), &config));

    let controller = Controller::with_config(config).with_progress(!options.no_progress);

    let cancellation = controller.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling... (press Ctrl-C again to quit)");
            cancellation.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Interrupted.");
            std::process::exit(130);
        }
    });

    run_command(&controller, options.command).await
}

async fn run_command(controller: &Controller, command: Commands) -> Result<()> {
    let mut session = Session::load_or_default();

    let (mut doc, result) = match command {
        Commands::Export { doc, bib_name } => {
            let document = open_document(&doc)?;
            let mut ui = ConsoleInterface::new(bib_name, controller.cancellation());
            let before = session.clone();
            let result = controller
                .export_bibliography(&document, &mut session, &mut ui, doc.workspace.as_deref())
                .await;
            if session != before {
                session.persist();
            }
            (document, result)
        }
        Commands::Cite { doc } => {
            let mut document = open_document(&doc)?;
            let result = controller.add_citation(&mut document).await;
            (document, result)
        }
        Commands::CiteBib { doc, bib_name } => {
            let mut document = open_document(&doc)?;
            let mut ui = ConsoleInterface::new(None, controller.cancellation());
            let run_session = match bib_name {
                Some(name) => Session { last_used_name: Some(name) },
                None => session.clone(),
            };
            let result = controller
                .cite_with_bibliography(&mut document, &run_session, &mut ui, doc.workspace.as_deref())
                .await;
            (document, result)
        }
        Commands::CiteMd { doc } => {
            let mut document = open_document(&doc)?;
            let mut ui = ConsoleInterface::new(None, controller.cancellation());
            let result = controller.cite_markdown_bibliography(&mut document, &mut ui).await;
            (document, result)
        }
        Commands::Hyperlink { doc, url } => {
            let mut document = open_document(&doc)?;
            let url = match url {
                Some(url) => url,
                None => read_url_from_stdin()?,
            };
            let result = controller.add_hyperlink_citation(&mut document, &url);
            (document, result)
        }
        Commands::Completions { .. } => return Err(anyhow!("Completions are handled before running commands")),
    };

    // Keep whatever was inserted, even when the command failed afterwards
    if doc.is_dirty() {
        doc.save()?;
        info!("Updated {:?}", doc.path().unwrap_or(Path::new("")));
    }
    let outcome = result?;
    report(&outcome);
    Ok(())
}
