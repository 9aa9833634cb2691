// Report generation from a scan cycle

use mendlink_checker::CycleReport;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

pub fn generate_text_report(report: &CycleReport) -> String {
    let mut out = String::new();

    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    out.push_str("# Scan summary:\n");
    out.push_str(&format!("  Cycle:          {}\n", report.cycle_id));
    out.push_str(&format!("  Started:        {}\n", report.started_at));
    out.push_str(&format!("  Duration:       {} ms\n", report.duration_ms));
    out.push_str(&format!("  Pages scanned:  {}\n", report.pages));
    out.push_str(&format!("  Anchors found:  {}\n", report.anchors));
    out.push_str(&format!("  Distinct URLs:  {}\n", report.distinct_urls));
    out.push_str(&format!(
        "  Healthy:        \x1b[32m{}\x1b[0m\n",
        report.healthy
    ));
    out.push_str(&format!(
        "  Broken:         \x1b[31m{}\x1b[0m\n",
        report.broken
    ));
    out.push_str(&format!("  Skipped:        {}\n", report.skipped));

    if !report.corrections.is_empty() {
        out.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
        out.push_str("# Corrections applied:\n");
        for correction in &report.corrections {
            let page = correction
                .page
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  \x1b[33m»\x1b[0m {}\n      {} → {}  [{}]\n",
                page,
                correction.original,
                correction.new_url,
                correction.kind.as_str()
            ));
        }
    }

    out.push('\n');
    out
}

pub fn generate_json_report(report: &CycleReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Mendlink",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "cycle": report,
        }
    });
    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
