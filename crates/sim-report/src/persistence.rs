//! Section content cleaning, `progress.json`/`agent_log.jsonl`/`console_log.txt`
//! persistence, and final `full_report.md` assembly.

use std::fs::OpenOptions;
use std::io::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sim_core::{write_atomic, write_atomic_json, Store};
use sim_types::domain::report::{Outline, OutlineSection};

use crate::error::Result;

/// Strips a leading heading that duplicates the section title, demotes any `###+`
/// headings to bold text (sections already nest under their own markdown heading),
/// and drops a leading `---` rule the model sometimes prepends.
pub fn clean_section_body(title: &str, raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("---") {
        text = stripped.trim_start_matches('-').trim();
    }

    let mut lines: Vec<&str> = text.lines().collect();
    while let Some(first) = lines.first() {
        let heading = first.trim_start_matches('#').trim();
        if first.trim_start().starts_with('#') && heading.eq_ignore_ascii_case(title) {
            lines.remove(0);
        } else {
            break;
        }
    }

    lines
        .into_iter()
        .map(|line| {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("###") {
                format!("**{}**", rest.trim_start_matches('#').trim())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportProgress {
    pub status: String,
    pub progress: f64,
    pub message: String,
    pub current_section: Option<String>,
    pub completed_sections: usize,
    pub updated_at: DateTime<Utc>,
}

pub fn write_progress(
    store: &Store,
    report_id: &str,
    status: &str,
    progress: f64,
    message: impl Into<String>,
    current_section: Option<String>,
    completed_sections: usize,
) -> Result<()> {
    let snapshot = ReportProgress {
        status: status.to_string(),
        progress,
        message: message.into(),
        current_section,
        completed_sections,
        updated_at: Utc::now(),
    };
    write_atomic_json(&store.report_progress_path(report_id), &snapshot)?;
    Ok(())
}

/// One structured event in `agent_log.jsonl`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentLogEvent {
    pub timestamp: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub action: String,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

pub struct AgentLog {
    path: std::path::PathBuf,
    started_at: std::time::Instant,
}

impl AgentLog {
    pub fn open(store: &Store, report_id: &str) -> Self {
        Self { path: store.report_agent_log_path(report_id), started_at: std::time::Instant::now() }
    }

    pub fn record(&self, action: &str, stage: &str, section: Option<&str>, detail: Option<serde_json::Value>) {
        let event = AgentLogEvent {
            timestamp: Utc::now(),
            elapsed_seconds: self.started_at.elapsed().as_secs_f64(),
            action: action.to_string(),
            stage: stage.to_string(),
            section: section.map(str::to_string),
            detail,
        };
        if let Ok(line) = serde_json::to_string(&event) {
            append_line(&self.path, &line);
        }
    }
}

pub struct ConsoleLog {
    path: std::path::PathBuf,
}

impl ConsoleLog {
    /// Attached for the job's duration; detached (dropped) on completion.
    pub fn attach(store: &Store, report_id: &str) -> Self {
        Self { path: store.report_console_log_path(report_id) }
    }

    pub fn write(&self, message: impl AsRef<str>) {
        append_line(&self.path, message.as_ref());
    }
}

fn append_line(path: &std::path::Path, line: &str) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{line}");
    }
}

/// Formats one top-level section (and its subsections) as the body of `section_NN.md`.
pub fn format_section_file(section: &OutlineSection, section_body: &str, subsection_bodies: &[(String, String)]) -> String {
    let mut out = format!("## {}\n\n{}\n", section.title, section_body.trim());
    for (title, body) in subsection_bodies {
        out.push_str(&format!("\n### {}\n\n{}\n", title, body.trim()));
    }
    out
}

pub fn write_section_file(store: &Store, report_id: &str, section_number: usize, contents: &str) -> Result<()> {
    write_atomic(&store.report_section_path(report_id, section_number), contents.as_bytes())?;
    Ok(())
}

/// Concatenates the title/summary header with every persisted `section_NN.md`, then
/// dedupes adjacent equal headings and collapses runs of more than two blank lines.
pub fn assemble_full_report(outline: &Outline, section_count: usize, store: &Store, report_id: &str) -> Result<String> {
    let mut buffer = format!("# {}\n\n> {}\n\n---\n\n", outline.title, outline.summary);
    for section_number in 1..=section_count {
        let path = store.report_section_path(report_id, section_number);
        if let Ok(contents) = std::fs::read_to_string(&path) {
            buffer.push_str(&contents);
            buffer.push('\n');
        }
    }
    Ok(post_process(&buffer))
}

fn post_process(markdown: &str) -> String {
    let mut out_lines: Vec<String> = Vec::new();
    let mut last_heading: Option<String> = None;
    let mut blank_run = 0;

    for line in markdown.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
            out_lines.push(String::new());
            continue;
        }
        blank_run = 0;

        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            if last_heading.as_deref() == Some(trimmed) {
                continue;
            }
            last_heading = Some(trimmed.to_string());
        }
        out_lines.push(line.to_string());
    }

    out_lines.join("\n").trim().to_string() + "\n"
}

pub fn write_full_report(store: &Store, report_id: &str, markdown: &str) -> Result<()> {
    write_atomic(&store.report_full_path(report_id), markdown.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_duplicate_leading_heading_and_demotes_deep_headings() {
        let raw = "## Overview\nSome text.\n#### Minor point\nMore text.";
        let cleaned = clean_section_body("Overview", raw);
        assert!(!cleaned.starts_with("##"));
        assert!(cleaned.contains("**Minor point**"));
    }

    #[test]
    fn drops_leading_horizontal_rule() {
        let raw = "---\nActual content here.";
        let cleaned = clean_section_body("Findings", raw);
        assert_eq!(cleaned, "Actual content here.");
    }

    #[test]
    fn post_process_dedupes_adjacent_equal_headings_and_collapses_blank_runs() {
        let markdown = "## Findings\n\n## Findings\n\nBody text.\n\n\n\n\nMore text.";
        let processed = post_process(markdown);
        assert_eq!(processed.matches("## Findings").count(), 1);
        assert!(!processed.contains("\n\n\n\n"));
    }
}
