use console::style;
use serde::Serialize;

use crate::models::{FileOutcome, IngestionReport, OutputFormat};

pub trait Formatter {
    fn format_report(&self, report: &IngestionReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qdrant_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionStatus>,
    pub embedding_model: String,
    pub embedding_dimension: u64,
    pub openai_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub name: String,
    pub exists: bool,
    pub dimension: Option<u64>,
    pub metric: Option<String>,
    pub points: u64,
}

/// JSON view of a report: the full report plus its totals.
#[derive(Serialize)]
struct ReportSummary<'a> {
    #[serde(flatten)]
    report: &'a IngestionReport,
    files_processed: usize,
    files_succeeded: usize,
    files_partial: usize,
    files_failed: usize,
    files_skipped: usize,
    batches_failed: usize,
    chunks_stored: usize,
    success: bool,
}

impl<'a> From<&'a IngestionReport> for ReportSummary<'a> {
    fn from(report: &'a IngestionReport) -> Self {
        Self {
            report,
            files_processed: report.files_processed(),
            files_succeeded: report.files_succeeded(),
            files_partial: report.files_partial(),
            files_failed: report.files_failed(),
            files_skipped: report.files_skipped(),
            batches_failed: report.batches_failed(),
            chunks_stored: report.chunks_stored(),
            success: report.is_success(),
        }
    }
}

fn outcome_label(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Succeeded => "ok".to_string(),
        FileOutcome::Partial => "partial".to_string(),
        FileOutcome::Failed { reason } => format!("failed: {reason}"),
        FileOutcome::Skipped { reason } => format!("skipped: {reason}"),
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_report(&self, report: &IngestionReport) -> String {
        let mut lines = vec![
            "Ingestion Complete".to_string(),
            "------------------".to_string(),
            format!("Collection:     {}", report.collection),
        ];

        for file in &report.files {
            let marker = match file.outcome {
                FileOutcome::Succeeded => style("✓").green(),
                FileOutcome::Partial => style("~").yellow(),
                FileOutcome::Failed { .. } => style("✗").red(),
                FileOutcome::Skipped { .. } => style("-").dim(),
            };
            lines.push(format!(
                "  {} {} ({} chunks, {}/{} batches) {}",
                marker,
                file.file_name,
                file.chunks,
                file.batches_succeeded(),
                file.batches_total,
                outcome_label(&file.outcome)
            ));
            for batch in file.batches.iter().filter(|b| !b.succeeded) {
                lines.push(format!(
                    "      batch {}: {}",
                    batch.index,
                    batch.error.as_deref().unwrap_or("failed")
                ));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "Files:          {} processed, {} ok, {} partial, {} failed, {} skipped",
            report.files_processed(),
            report.files_succeeded(),
            report.files_partial(),
            report.files_failed(),
            report.files_skipped()
        ));
        lines.push(format!("Chunks stored:  {}", report.chunks_stored()));
        lines.push(format!("Failed batches: {}", report.batches_failed()));
        lines.push(format!("Duration:       {}ms", report.duration_ms));
        if report.cancelled {
            lines.push(style("Run was cancelled before completion.").yellow().to_string());
        }
        lines.join("\n") + "\n"
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut lines = vec!["Status".to_string(), "------".to_string()];

        let qdrant = if status.qdrant_connected {
            style("[CONNECTED]").green()
        } else {
            style("[DISCONNECTED]").red()
        };
        lines.push(format!("Qdrant:        {qdrant}"));
        lines.push(format!(
            "  URL:         {}",
            status.qdrant_url.as_deref().unwrap_or("(not set)")
        ));
        if let Some(ref error) = status.qdrant_error {
            lines.push(format!("  Error:       {error}"));
        }
        if let Some(ref c) = status.collection {
            lines.push(format!("  Collection:  {}", c.name));
            if c.exists {
                lines.push(format!(
                    "  Schema:      {} dims, {}",
                    c.dimension.unwrap_or_default(),
                    c.metric.as_deref().unwrap_or("unknown")
                ));
                lines.push(format!("  Points:      {}", c.points));
            } else {
                lines.push("  Exists:      no".to_string());
            }
        }
        lines.push(String::new());

        let openai = if status.openai_configured {
            style("[CONFIGURED]").green()
        } else {
            style("[MISSING KEY]").red()
        };
        lines.push(format!("OpenAI:        {openai}"));
        lines.push(format!(
            "  Embedding:   {} ({} dims)",
            status.embedding_model, status.embedding_dimension
        ));
        if let Some(ref path) = status.config_path {
            lines.push(String::new());
            lines.push(format!("Config file:   {path}"));
        }
        lines.join("\n") + "\n"
    }

    fn format_message(&self, message: &str) -> String {
        format!("{message}\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {error}\n", style("Error:").red().bold())
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &IngestionReport) -> String {
        self.render(&ReportSummary::from(report))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_report(&self, report: &IngestionReport) -> String {
        let mut lines = vec![
            format!("## Ingestion into `{}`\n", report.collection),
            "| File | Chunks | Batches | Outcome |".to_string(),
            "|------|--------|---------|---------|".to_string(),
        ];
        for file in &report.files {
            lines.push(format!(
                "| `{}` | {} | {}/{} | {} |",
                file.file_name,
                file.chunks,
                file.batches_succeeded(),
                file.batches_total,
                outcome_label(&file.outcome)
            ));
        }
        lines.push(String::new());
        lines.push(format!("- **Files processed:** {}", report.files_processed()));
        lines.push(format!("- **Chunks stored:** {}", report.chunks_stored()));
        lines.push(format!("- **Failed batches:** {}", report.batches_failed()));
        lines.push(format!("- **Duration:** {}ms", report.duration_ms));
        if report.cancelled {
            lines.push("- **Cancelled:** yes".to_string());
        }
        lines.join("\n") + "\n"
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let check = |ok: bool| if ok { "✅" } else { "❌" };
        let mut lines = vec![
            "## Status\n".to_string(),
            format!(
                "- **Qdrant:** {} `{}`",
                check(status.qdrant_connected),
                status.qdrant_url.as_deref().unwrap_or("not set")
            ),
        ];
        if let Some(ref error) = status.qdrant_error {
            lines.push(format!("  - Error: {error}"));
        }
        if let Some(ref c) = status.collection {
            lines.push(format!(
                "- **Collection:** `{}` ({})",
                c.name,
                if c.exists {
                    format!("{} points", c.points)
                } else {
                    "missing".to_string()
                }
            ));
        }
        lines.push(format!(
            "- **OpenAI:** {} `{}` ({} dims)",
            check(status.openai_configured),
            status.embedding_model,
            status.embedding_dimension
        ));
        lines.join("\n") + "\n"
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {message}\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {error}\n")
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchResult, FileReport};

    fn report() -> IngestionReport {
        let mut ok = FileReport::new("furnace.pdf", "/m/furnace.pdf");
        ok.chunks = 3;
        ok.batches_total = 1;
        ok.batches.push(BatchResult {
            index: 0,
            size: 3,
            embed_attempts: 1,
            upsert_attempts: 2,
            succeeded: true,
            error: None,
        });
        ok.settle();

        let mut bad = FileReport::new("scan.pdf", "/m/scan.pdf");
        bad.outcome = FileOutcome::Failed {
            reason: "failed to parse PDF: bad xref".to_string(),
        };

        IngestionReport {
            collection: "Homecarepdf_1700000000".to_string(),
            files: vec![ok, bad],
            cancelled: false,
            duration_ms: 42,
        }
    }

    #[test]
    fn test_text_report() {
        let out = TextFormatter.format_report(&report());
        assert!(out.contains("Homecarepdf_1700000000"));
        assert!(out.contains("furnace.pdf (3 chunks, 1/1 batches) ok"));
        assert!(out.contains("failed: failed to parse PDF: bad xref"));
        assert!(out.contains("Chunks stored:  3"));
    }

    #[test]
    fn test_json_report() {
        let out = JsonFormatter::new(false).format_report(&report());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["collection"], "Homecarepdf_1700000000");
        assert_eq!(value["chunks_stored"], 3);
        assert_eq!(value["files_failed"], 1);
        assert_eq!(value["success"], false);
        assert_eq!(value["files"][1]["outcome"]["status"], "failed");
    }

    #[test]
    fn test_markdown_report() {
        let out = MarkdownFormatter.format_report(&report());
        assert!(out.contains("| `furnace.pdf` | 3 | 1/1 | ok |"));
    }

    #[test]
    fn test_json_status_omits_missing_fields() {
        let status = StatusInfo {
            config_path: None,
            qdrant_url: None,
            qdrant_connected: false,
            qdrant_error: None,
            collection: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            openai_configured: false,
        };
        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(true).format_status(&status)).unwrap();
        assert!(value.get("collection").is_none());
        assert_eq!(value["embedding_dimension"], 1536);
    }

    #[test]
    fn test_error_formats() {
        assert_eq!(
            JsonFormatter::new(false).format_error("boom"),
            r#"{"error":"boom"}"#
        );
        assert!(MarkdownFormatter.format_error("boom").contains("boom"));
    }
}
