//! CLI subcommand handlers.

use anyhow::Context;
use medquiz_core::eval::{AnswerEvaluator, GoldTable, ReportSeries, answers::load_model_answers};
use medquiz_core::{QuestionSetKind, QuizConfig, QuizPipeline, evaluate_all};
use std::io::Read;
use std::path::Path;

use crate::{Commands, ConfigAction, OutputFormat};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Generate {
            topic,
            kind,
            model,
            max_new_tokens,
        } => handle_generate(topic, kind, model, max_new_tokens, workspace).await,
        Commands::Evaluate {
            gold,
            answers,
            bleu,
            format,
            output,
        } => handle_evaluate(&gold, &answers, bleu, format, output.as_deref(), workspace).await,
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<QuizConfig> {
    medquiz_core::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

async fn handle_generate(
    topic: String,
    kind: Option<QuestionSetKind>,
    model: Option<String>,
    max_new_tokens: Option<u32>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let mut config = load(workspace)?;
    if let Some(model) = model {
        config.generation.model = model;
    }
    if let Some(tokens) = max_new_tokens {
        config.generation.max_new_tokens = tokens;
    }

    let topic = if topic == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read topic from stdin")?;
        buf
    } else {
        topic
    };

    let pipeline = QuizPipeline::from_config(&config)?;
    let quiz = match kind {
        Some(kind) => pipeline.generate_quiz_as(&topic, kind).await?,
        None => pipeline.generate_quiz(&topic).await?,
    };
    println!("{}", quiz);
    Ok(())
}

async fn handle_evaluate(
    gold_path: &Path,
    answers_path: &Path,
    bleu: bool,
    format: OutputFormat,
    output: Option<&Path>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let mut config = load(workspace)?;
    if bleu {
        config.evaluation.include_bleu = true;
    }

    let gold = GoldTable::load(gold_path)?;
    let answers = load_model_answers(answers_path)?;
    tracing::info!(
        gold = gold.len(),
        models = answers.len(),
        bleu = config.evaluation.include_bleu,
        "Evaluating answers"
    );

    let evaluator = AnswerEvaluator::from_config(&config.evaluation)?;
    let table = evaluate_all(&evaluator, &answers, &gold).await?;

    let rendered = match format {
        OutputFormat::Json => table.to_json_pretty()?,
        OutputFormat::Table => ReportSeries::from_table(&table).render_text_table(),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Results written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".medquiz");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&QuizConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_init_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();

        let path = dir.path().join(".medquiz").join("config.toml");
        assert!(path.exists());
        let config = load(dir.path()).unwrap();
        assert_eq!(config.generation.max_new_tokens, 1000);

        // Second init leaves the file alone
        std::fs::write(&path, "[generation]\nmax_new_tokens = 64\n").unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();
        assert_eq!(load(dir.path()).unwrap().generation.max_new_tokens, 64);
    }

    #[tokio::test]
    async fn test_evaluate_writes_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let gold = dir.path().join("gold.json");
        let answers = dir.path().join("answers.json");
        let out = dir.path().join("results.json");
        std::fs::write(&gold, r#"{"Case1": "Oral rehydration therapy."}"#).unwrap();
        std::fs::write(
            &answers,
            r#"{"Model1": {"Case1": "Oral rehydration therapy."}}"#,
        )
        .unwrap();

        handle_evaluate(
            &gold,
            &answers,
            false,
            OutputFormat::Json,
            Some(&out),
            dir.path(),
        )
        .await
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["Model1"]["Case1"]["BERTScore"], 1.0);
    }

    #[tokio::test]
    async fn test_evaluate_unknown_question_fails() {
        let dir = tempfile::tempdir().unwrap();
        let gold = dir.path().join("gold.json");
        let answers = dir.path().join("answers.json");
        std::fs::write(&gold, "{}").unwrap();
        std::fs::write(&answers, r#"{"Model1": {"Short9": "x"}}"#).unwrap();

        let err = handle_evaluate(
            &gold,
            &answers,
            false,
            OutputFormat::Table,
            None,
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Short9"));
    }
}
