//! Per-model score series for charts and text reports.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

use super::aggregate::ResultTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSeries {
    pub model: String,
    /// ROUGE-L per category; case-based questions fall back to semantic F1.
    pub rouge_l: Vec<f64>,
    /// Semantic F1 per category.
    pub semantic: Vec<f64>,
}

/// Category axis plus one pair of series per model. Missing entries are 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSeries {
    pub categories: Vec<String>,
    pub models: Vec<ModelSeries>,
}

impl ReportSeries {
    pub fn from_table(table: &ResultTable) -> Self {
        let categories: Vec<String> = table
            .iter()
            .flat_map(|(_, scores)| scores.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let models = table
            .iter()
            .map(|(model, scores)| {
                let (rouge_l, semantic) = categories
                    .iter()
                    .map(|qid| match scores.get(qid) {
                        Some(record) => (
                            record.rouge_l().unwrap_or_else(|| record.semantic_f1()),
                            record.semantic_f1(),
                        ),
                        None => (0.0, 0.0),
                    })
                    .unzip();
                ModelSeries {
                    model: model.clone(),
                    rouge_l,
                    semantic,
                }
            })
            .collect();

        Self { categories, models }
    }

    /// Fixed-width table: one row per category, two columns per model.
    pub fn render_text_table(&self) -> String {
        let label_width = self
            .categories
            .iter()
            .map(String::len)
            .chain(std::iter::once("Question".len()))
            .max()
            .unwrap_or(8);
        let col_width = self
            .models
            .iter()
            .map(|m| m.model.len() + " Semantic".len())
            .max()
            .unwrap_or(0)
            .max(10);

        let mut out = String::new();
        let _ = write!(out, "{:<label_width$}", "Question");
        for series in &self.models {
            let _ = write!(out, "  {:>col_width$}", format!("{} ROUGE-L", series.model));
            let _ = write!(out, "  {:>col_width$}", format!("{} Semantic", series.model));
        }
        out.push('\n');

        let total_width = label_width + self.models.len() * 2 * (col_width + 2);
        out.push_str(&"-".repeat(total_width));
        out.push('\n');

        for (row, category) in self.categories.iter().enumerate() {
            let _ = write!(out, "{:<label_width$}", category);
            for series in &self.models {
                let _ = write!(out, "  {:>col_width$.4}", series.rouge_l[row]);
                let _ = write!(out, "  {:>col_width$.4}", series.semantic[row]);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluator::{ScoreRecord, SemanticScore, TextScores};
    use pretty_assertions::assert_eq;

    fn table() -> ResultTable {
        let mut table = ResultTable::new();
        table.record(
            "Model1",
            "MCQ1",
            ScoreRecord::Mcq {
                correct: true,
                explanation_scores: TextScores {
                    rouge_l: 0.4,
                    bleu: None,
                    semantic_f1: 0.9,
                },
            },
        );
        table.record(
            "Model1",
            "Case1",
            ScoreRecord::CaseBased(SemanticScore { semantic_f1: 0.95 }),
        );
        table.record(
            "Model2",
            "Short2",
            ScoreRecord::ShortAnswer(TextScores {
                rouge_l: 0.3,
                bleu: Some(0.1),
                semantic_f1: 0.8,
            }),
        );
        table
    }

    #[test]
    fn test_series_categories_and_fallbacks() {
        let report = ReportSeries::from_table(&table());
        assert_eq!(report.categories, vec!["Case1", "MCQ1", "Short2"]);

        let model1 = &report.models[0];
        assert_eq!(model1.model, "Model1");
        assert_eq!(model1.rouge_l, vec![0.95, 0.4, 0.0]);
        assert_eq!(model1.semantic, vec![0.95, 0.9, 0.0]);

        let model2 = &report.models[1];
        assert_eq!(model2.rouge_l, vec![0.0, 0.0, 0.3]);
        assert_eq!(model2.semantic, vec![0.0, 0.0, 0.8]);
    }

    #[test]
    fn test_empty_table() {
        let report = ReportSeries::from_table(&ResultTable::new());
        assert!(report.categories.is_empty());
        assert!(report.models.is_empty());
        assert!(report.render_text_table().starts_with("Question"));
    }

    #[test]
    fn test_render_text_table() {
        let text = ReportSeries::from_table(&table()).render_text_table();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("Model1 ROUGE-L"));
        assert!(lines[0].contains("Model2 Semantic"));
        assert!(lines[2].starts_with("Case1"));
        assert!(lines[3].contains("0.4000"));
        assert!(lines[4].contains("0.8000"));
        // Rows line up with the header
        assert_eq!(lines[2].len(), lines[0].len());
    }
}
