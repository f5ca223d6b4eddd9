//! # Interview QA CLI (`iqa`)
//!
//! Ingest interview preparation documents, ask questions about them, and
//! record feedback about the answers.
//!
//! ## Usage
//!
//! ```bash
//! iqa --config ./config/iqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `iqa ingest <path>...` | Replace the index with the given files or directories |
//! | `iqa ask "<question>"` | Answer a question from the indexed documents |
//! | `iqa feedback --answer "<answer>" "<feedback>"` | Append feedback to the log |
//! | `iqa feedback --list` | Print the feedback log |
//! | `iqa status` | Show the index state |
//! | `iqa serve` | Start the JSON HTTP server |
//! | `iqa completions <shell>` | Print a shell completion script |
//!
//! Expected conditions (nothing to index, no index yet, nothing relevant)
//! are printed as a single line and exit with status 1.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use interview_qa::config::{self, Config};
use interview_qa::error::PipelineError;
use interview_qa::feedback::{FeedbackSink, FileFeedbackSink};
use interview_qa::index::{IndexStatus, IndexStore};
use interview_qa::models::Document;
use interview_qa::pipeline::{IngestReport, Pipeline};
use interview_qa::server;

/// Interview QA: question answering over your resume and job descriptions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/iqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "iqa",
    about = "Interview QA: ask questions about your resume and job descriptions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/iqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new index from documents, replacing the current one.
    ///
    /// Directories are walked recursively; files with an unrecognized
    /// extension are skipped.
    Ingest {
        /// Files or directories (.pdf, .docx, .pptx, .txt, .md).
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Print the full text of each retrieved chunk.
        #[arg(long)]
        show_context: bool,
    },

    /// Record feedback about an answer, or list recorded feedback.
    Feedback {
        /// The feedback text.
        #[arg(required_unless_present = "list")]
        feedback: Option<String>,

        /// The answer the feedback refers to.
        #[arg(long, required_unless_present = "list")]
        answer: Option<String>,

        /// Print the feedback log instead of recording.
        #[arg(long, conflicts_with_all = ["feedback", "answer"])]
        list: bool,
    },

    /// Show whether an index exists and what it was built from.
    Status,

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,

    /// Print a shell completion script to stdout.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Commands::Serve => "interview_qa=info,tower_http=info",
        _ => "warn",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Err(err) => match err.downcast_ref::<PipelineError>() {
            Some(notice) if notice.is_notice() => {
                eprintln!("{}", notice);
                std::process::exit(1);
            }
            _ => Err(err),
        },
        ok => ok,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "iqa", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths } => {
            let documents = collect_documents(&paths)?;
            let pipeline = Pipeline::from_config(&cfg);
            let report = pipeline.ingest(documents).await?;
            print_ingest_report(&report, &cfg);
        }
        Commands::Ask {
            question,
            show_context,
        } => {
            let pipeline = Pipeline::from_config(&cfg);
            let answer = pipeline.ask(&question).await?;
            println!("{}", answer.text.trim_end());
            println!();
            println!("Sources:");
            for (i, source) in answer.sources.iter().enumerate() {
                println!(
                    "  {}. [{:.3}] chunk {}: {}",
                    i + 1,
                    source.score,
                    source.chunk.index,
                    excerpt(&source.chunk.text, 80)
                );
                if show_context {
                    println!("{}", source.chunk.text.trim());
                    println!();
                }
            }
        }
        Commands::Feedback {
            feedback,
            answer,
            list,
        } => {
            if list {
                let sink = FileFeedbackSink::new(cfg.feedback.path.clone());
                let lines = sink.read_lines().await?;
                if lines.is_empty() {
                    println!("No feedback recorded yet.");
                }
                for line in lines {
                    println!("{}", line);
                }
            } else {
                let answer = answer.unwrap_or_default();
                let feedback = feedback.unwrap_or_default();
                if feedback.trim().is_empty() {
                    return Err(PipelineError::EmptyFeedback.into());
                }
                let sink = FileFeedbackSink::new(cfg.feedback.path.clone());
                sink.record(&answer, &feedback).await?;
                println!("Feedback recorded in {}", cfg.feedback.path.display());
            }
        }
        Commands::Status => {
            print_status(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

/// Read every supported file under `paths`. Explicit files with an
/// unrecognized extension are reported and skipped.
fn collect_documents(paths: &[PathBuf]) -> anyhow::Result<Vec<Document>> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match read_document(entry.path())? {
                    Some(doc) => documents.push(doc),
                    None => tracing::debug!(path = %entry.path().display(), "skipping unsupported file"),
                }
            }
        } else {
            match read_document(path)? {
                Some(doc) => documents.push(doc),
                None => eprintln!("Skipping {}: unsupported file type", path.display()),
            }
        }
    }

    Ok(documents)
}

fn read_document(path: &Path) -> anyhow::Result<Option<Document>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if interview_qa::models::content_type_for(&name).is_none() {
        return Ok(None);
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Document::from_name(name, bytes))
}

fn print_ingest_report(report: &IngestReport, cfg: &Config) {
    println!("Ingested {} document(s)", report.documents.len());
    for doc in &report.documents {
        let mut line = format!("  {}", doc.name);
        if let Some(title) = &doc.title {
            line.push_str(&format!("  \"{}\"", title));
        }
        if let Some(author) = &doc.author {
            line.push_str(&format!("  by {}", author));
        }
        println!(
            "{}  ({} of {} pages with text)",
            line, doc.pages_with_text, doc.page_count
        );
    }
    println!(
        "  pages:      {} ({} without text)",
        report.pages_total, report.pages_skipped
    );
    println!("  characters: {}", report.characters);
    println!("  chunks:     {}", report.chunks);
    println!("  model:      {} ({} dims)", report.model, report.dims);
    println!("  index:      {}", cfg.index.path.display());
}

async fn print_status(cfg: &Config) -> anyhow::Result<()> {
    let index = IndexStore::new(cfg.index.path.clone());
    println!("Index: {}", index.path().display());
    match index.status().await? {
        IndexStatus::Absent => {
            println!("  state:     absent (run `iqa ingest <files>` first)");
        }
        IndexStatus::Present(meta) => {
            println!("  state:     present");
            println!("  model:     {} ({} dims)", meta.model, meta.dims);
            println!("  documents: {}", meta.document_count);
            println!("  chunks:    {}", meta.chunk_count);
            println!("  built at:  {}", meta.built_at.to_rfc3339());
        }
    }

    let feedback = FileFeedbackSink::new(cfg.feedback.path.clone());
    println!(
        "Feedback: {} ({} entries)",
        feedback.path().display(),
        feedback.read_lines().await?.len()
    );
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
