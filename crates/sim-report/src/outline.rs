//! Planning step: one LLM call producing a constrained outline, with a
//! deterministic fallback on failure.

use std::sync::Arc;

use serde::Deserialize;
use sim_providers::LlmClient;
use sim_types::domain::report::{Outline, OutlineSection, OutlineSubsection};

use crate::error::Result;

const PLANNING_TEMPERATURE: f64 = 0.3;
const MIN_SECTIONS: usize = 2;
const MAX_SECTIONS: usize = 5;
const MAX_SUBSECTIONS: usize = 2;

#[derive(Debug, Deserialize, Default)]
struct RawSubsection {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawSection {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subsections: Vec<RawSubsection>,
}

#[derive(Debug, Deserialize, Default)]
struct RawOutline {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    sections: Vec<RawSection>,
}

pub struct OutlinePlanner {
    llm: Arc<dyn LlmClient>,
}

impl OutlinePlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn plan(&self, requirement: &str, graph_context: &str) -> Outline {
        match self.plan_with_llm(requirement, graph_context).await {
            Ok(outline) if !outline.sections.is_empty() => outline,
            _ => fallback_outline(requirement),
        }
    }

    async fn plan_with_llm(&self, requirement: &str, graph_context: &str) -> Result<Outline> {
        let prompt = format!(
            "Plan a report outline for this simulation requirement.\n\
             Requirement: {requirement}\n\
             Context: {graph_context}\n\n\
             Respond with JSON: {{\"title\":...,\"summary\":...,\"sections\":[{{\"title\":...,\"subsections\":[{{\"title\":...}}]}}]}}.\n\
             Use between {MIN_SECTIONS} and {MAX_SECTIONS} top-level sections, each with 0 to {MAX_SUBSECTIONS} subsections."
        );
        let raw_response = self.llm.complete_json(&prompt, PLANNING_TEMPERATURE).await?;
        let raw: RawOutline = serde_json::from_str(&raw_response)?;
        Ok(normalize(raw))
    }
}

fn normalize(raw: RawOutline) -> Outline {
    let mut sections: Vec<OutlineSection> = raw
        .sections
        .into_iter()
        .filter(|s| !s.title.trim().is_empty())
        .map(|s| OutlineSection {
            title: s.title,
            subsections: s
                .subsections
                .into_iter()
                .filter(|sub| !sub.title.trim().is_empty())
                .take(MAX_SUBSECTIONS)
                .map(|sub| OutlineSubsection { title: sub.title })
                .collect(),
        })
        .take(MAX_SECTIONS)
        .collect();

    if sections.len() < MIN_SECTIONS {
        sections.extend(default_sections().into_iter().skip(sections.len()));
    }

    Outline {
        title: if raw.title.trim().is_empty() { "Simulation Report".to_string() } else { raw.title },
        summary: raw.summary,
        sections,
    }
}

fn default_sections() -> Vec<OutlineSection> {
    vec![
        OutlineSection { title: "Overview".to_string(), subsections: vec![] },
        OutlineSection { title: "Findings".to_string(), subsections: vec![] },
        OutlineSection { title: "Conclusion".to_string(), subsections: vec![] },
    ]
}

fn fallback_outline(requirement: &str) -> Outline {
    Outline {
        title: "Simulation Report".to_string(),
        summary: format!("Automated summary for: {requirement}"),
        sections: default_sections(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_providers::EchoLlmClient;

    #[tokio::test]
    async fn falls_back_when_llm_response_is_not_valid_json() {
        let planner = OutlinePlanner::new(Arc::new(EchoLlmClient::new("not json")));
        let outline = planner.plan("understand sentiment", "").await;
        assert_eq!(outline.sections.len(), 3);
    }

    #[tokio::test]
    async fn normalizes_llm_outline_within_section_bounds() {
        let response = serde_json::json!({
            "title": "Opinion Shift Report",
            "summary": "How opinions moved",
            "sections": (0..8).map(|i| serde_json::json!({
                "title": format!("Section {i}"),
                "subsections": [{"title": "a"}, {"title": "b"}, {"title": "c"}]
            })).collect::<Vec<_>>()
        })
        .to_string();
        let planner = OutlinePlanner::new(Arc::new(EchoLlmClient::new(response)));
        let outline = planner.plan("req", "ctx").await;
        assert_eq!(outline.sections.len(), MAX_SECTIONS);
        assert!(outline.sections.iter().all(|s| s.subsections.len() <= MAX_SUBSECTIONS));
    }
}
