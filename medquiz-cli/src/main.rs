//! MedQuiz CLI: generate literature-grounded medical quizzes and score
//! model answers against a gold set.

mod commands;

use clap::Parser;
use medquiz_core::QuestionSetKind;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// MedQuiz: medical quizzes from PubMed, and answer scoring
#[derive(Parser, Debug)]
#[command(name = "medquiz", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (reads .medquiz/config.toml from here)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate a quiz for a topic (one PubMed query per line; "-" reads stdin)
    Generate {
        topic: String,

        /// Question kind: mcq, case-based, short-answer, freeform.
        /// Defaults to the kind implied by the topic.
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<QuestionSetKind>,

        /// Override the generation model
        #[arg(short, long)]
        model: Option<String>,

        /// Override max_new_tokens per pass
        #[arg(long)]
        max_new_tokens: Option<u32>,
    },
    /// Score model answers against gold answers
    Evaluate {
        /// Gold answers JSON (question id -> answer)
        #[arg(long)]
        gold: PathBuf,

        /// Model answers JSON (model -> question id -> answer)
        #[arg(long)]
        answers: PathBuf,

        /// Also compute sentence BLEU
        #[arg(long)]
        bleu: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write the result table to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .medquiz/config.toml in the workspace
    Init,
    /// Print the resolved configuration
    Show,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// Raw result table as pretty JSON
    Json,
    /// Per-question ROUGE-L and semantic series
    Table,
}

const KIND_CHOICES: &str = "mcq, case-based, short-answer, freeform";

fn parse_kind(s: &str) -> Result<QuestionSetKind, String> {
    QuestionSetKind::from_str_loose(s)
        .ok_or_else(|| format!("unknown kind '{s}', try {KIND_CHOICES}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "medquiz", "medquiz")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "medquiz.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_with_kind() {
        let args = ["medquiz", "-v", "generate", "COVID-19", "--kind", "mcq"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Generate { topic, kind, .. } => {
                assert_eq!(topic, "COVID-19");
                assert_eq!(kind, Some(QuestionSetKind::Mcq));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_generate_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["medquiz", "generate", "x", "--kind", "essay"]).is_err());
    }

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "medquiz",
            "evaluate",
            "--gold",
            "gold.json",
            "--answers",
            "answers.json",
            "--bleu",
            "--format",
            "table",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate {
                gold,
                bleu,
                format,
                output,
                ..
            } => {
                assert_eq!(gold, PathBuf::from("gold.json"));
                assert!(bleu);
                assert_eq!(format, OutputFormat::Table);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
