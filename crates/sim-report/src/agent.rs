//! ReportAgent: outline planning, the per-section ReACT loop,
//! incremental persistence, and a bounded chat mode over a completed report.

use std::sync::Arc;

use sim_core::{read_json, write_atomic_json, Store};
use sim_providers::{GraphClient, LlmClient};
use sim_runtime::IpcClient;
use sim_types::domain::report::{Report, ReportStatus};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::outline::OutlinePlanner;
use crate::persistence::{
    assemble_full_report, clean_section_body, format_section_file, write_full_report, write_progress,
    write_section_file, AgentLog, ConsoleLog,
};
use crate::react_loop::SectionLoop;
use crate::tools::{tool_descriptions, ReportTools};

const MAX_TOOL_CALLS_PER_CHAT: usize = 2;
const CHAT_TEMPERATURE: f64 = 0.5;

pub struct ReportAgent {
    store: Store,
    graph: Arc<dyn GraphClient>,
    llm: Arc<dyn LlmClient>,
    ipc: Option<Arc<IpcClient>>,
}

impl ReportAgent {
    pub fn new(store: Store, graph: Arc<dyn GraphClient>, llm: Arc<dyn LlmClient>, ipc: Option<Arc<IpcClient>>) -> Self {
        Self { store, graph, llm, ipc }
    }

    pub fn create(&self, simulation_id: impl Into<String>, graph_id: impl Into<String>, requirement: impl Into<String>) -> Result<Report> {
        let report = Report::new(simulation_id, graph_id, requirement);
        self.save(&report)?;
        Ok(report)
    }

    pub fn save(&self, report: &Report) -> Result<()> {
        write_atomic_json(&self.store.report_meta_path(report.report_id.as_str()), report)?;
        Ok(())
    }

    pub fn get(&self, report_id: &str) -> Result<Report> {
        read_json(&self.store.report_meta_path(report_id)).map_err(|_| Error::NotFound(format!("report {report_id}")))
    }

    pub fn list(&self) -> Result<Vec<Report>> {
        let mut reports: Vec<Report> =
            self.store.list_report_ids()?.iter().filter_map(|id| self.get(id).ok()).collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    /// Runs the full plan -> generate -> persist pipeline, transitioning
    /// `pending -> planning -> generating -> completed | failed`.
    pub async fn generate(&self, report_id: &str) -> Result<()> {
        let mut report = self.get(report_id)?;
        let agent_log = AgentLog::open(&self.store, report_id);
        let console_log = ConsoleLog::attach(&self.store, report_id);
        agent_log.record("start", "generate", None, None);
        console_log.write(format!("starting report generation for {report_id}"));

        match self.generate_inner(&mut report, &agent_log, &console_log).await {
            Ok(markdown) => {
                report.status = ReportStatus::Completed;
                report.markdown = Some(markdown);
                report.last_error = None;
                report.touch();
                self.save(&report)?;
                agent_log.record("complete", "generate", None, None);
                console_log.write("report generation complete");
                info!(report_id, "report generation completed");
                Ok(())
            }
            Err(err) => {
                report.status = ReportStatus::Failed;
                report.last_error = Some(err.to_string());
                report.touch();
                self.save(&report)?;
                agent_log.record("error", "generate", None, Some(serde_json::json!({"error": err.to_string()})));
                console_log.write(format!("report generation failed: {err}"));
                error!(report_id, %err, "report generation failed");
                Err(err)
            }
        }
    }

    async fn generate_inner(&self, report: &mut Report, agent_log: &AgentLog, console_log: &ConsoleLog) -> Result<String> {
        report.status = ReportStatus::Planning;
        report.touch();
        self.save(report)?;
        write_progress(&self.store, report.report_id.as_str(), "planning", 0.0, "planning outline", None, 0)?;
        agent_log.record("planning", "plan", None, None);

        let graph_context = self.summarize_graph_context(&report.graph_id).await;
        let planner = OutlinePlanner::new(self.llm.clone());
        let outline = planner.plan(&report.requirement, &graph_context).await;
        write_atomic_json(&self.store.report_outline_path(report.report_id.as_str()), &outline)?;
        console_log.write(format!("outline planned: {} sections", outline.sections.len()));

        report.status = ReportStatus::Generating;
        report.outline = Some(outline.clone());
        report.touch();
        self.save(report)?;

        let tools = ReportTools::new(
            self.graph.clone(),
            self.llm.clone(),
            self.ipc.clone(),
            report.graph_id.clone(),
            report.simulation_id.clone(),
        );
        let section_loop = SectionLoop::new(self.llm.clone(), &tools);

        let total_sections = outline.sections.len().max(1);
        for (index, section) in outline.sections.iter().enumerate() {
            agent_log.record("planning", "section", Some(&section.title), None);

            let body_result = section_loop.run_section(&report.requirement, section, None).await?;
            for trace in &body_result.traces {
                agent_log.record(
                    "tool_call",
                    "section",
                    Some(&section.title),
                    Some(serde_json::json!({"tool": trace.tool, "args": trace.args})),
                );
                agent_log.record(
                    "tool_result",
                    "section",
                    Some(&section.title),
                    Some(serde_json::json!({"tool": trace.tool, "observation": trace.observation})),
                );
            }
            let cleaned = clean_section_body(&section.title, &body_result.body);
            agent_log.record("llm_response", "section", Some(&section.title), None);

            let mut subsection_bodies = Vec::new();
            for subsection in &section.subsections {
                let sub_result = section_loop.run_section(&report.requirement, section, Some(subsection)).await?;
                let sub_cleaned = clean_section_body(&subsection.title, &sub_result.body);
                subsection_bodies.push((subsection.title.clone(), sub_cleaned));
            }

            let section_file = format_section_file(section, &cleaned, &subsection_bodies);
            write_section_file(&self.store, report.report_id.as_str(), index + 1, &section_file)?;
            agent_log.record("section_complete", "section", Some(&section.title), None);
            console_log.write(format!("section complete: {}", section.title));

            write_progress(
                &self.store,
                report.report_id.as_str(),
                "generating",
                (index + 1) as f64 / total_sections as f64,
                format!("finished section: {}", section.title),
                Some(section.title.clone()),
                index + 1,
            )?;
        }

        let markdown = assemble_full_report(&outline, outline.sections.len(), &self.store, report.report_id.as_str())?;
        write_full_report(&self.store, report.report_id.as_str(), &markdown)?;
        write_progress(&self.store, report.report_id.as_str(), "completed", 1.0, "report assembled", None, total_sections)?;

        Ok(markdown)
    }

    async fn summarize_graph_context(&self, graph_id: &str) -> String {
        match self.graph.fetch_nodes(graph_id).await {
            Ok(nodes) => nodes.iter().take(20).map(|n| n.name.clone()).collect::<Vec<_>>().join(", "),
            Err(_) => String::new(),
        }
    }

    /// Chat mode: one bounded ReACT-style turn over an already-generated report, capped
    /// at `MAX_TOOL_CALLS_PER_CHAT` tool calls.
    pub async fn chat(&self, report_id: &str, message: &str) -> Result<String> {
        let report = self.get(report_id)?;
        let tools = ReportTools::new(
            self.graph.clone(),
            self.llm.clone(),
            self.ipc.clone(),
            report.graph_id.clone(),
            report.simulation_id.clone(),
        );

        let mut transcript = vec![format!(
            "You are answering a follow-up question about a previously generated report.\n\
             Report requirement: {}\n\
             Report summary: {}\n\
             Available tools:\n{}\n\n\
             You may call at most {MAX_TOOL_CALLS_PER_CHAT} tools. Respond with \
             <tool_call>{{\"name\":...,\"args\":{{...}}}}</tool_call> or [TOOL_CALL] name(k=\"v\") to call one, \
             or 'Final Answer: <text>' when ready.\n\nQuestion: {message}",
            report.requirement,
            report.outline.as_ref().map(|o| o.summary.as_str()).unwrap_or_default(),
            tool_descriptions(),
        )];

        let mut tool_calls_made = 0;
        loop {
            let prompt = transcript.join("\n\n");
            let response = self.llm.complete_json(&prompt, CHAT_TEMPERATURE).await?;

            if let Some(idx) = response.find("Final Answer:") {
                return Ok(response[idx + "Final Answer:".len()..].trim().to_string());
            }

            if tool_calls_made >= MAX_TOOL_CALLS_PER_CHAT {
                return Ok(response.trim().to_string());
            }

            match crate::react_loop::parse_tool_call(&response) {
                Some((name, args)) => {
                    let observation = tools.dispatch(&name, &args).await.unwrap_or_else(|err| format!("tool error: {err}"));
                    tool_calls_made += 1;
                    transcript.push(response);
                    transcript.push(format!("Observation from {name}: {observation}"));
                }
                None => return Ok(response.trim().to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_testing::{blank_graph, echo_llm, temp_store};

    #[tokio::test]
    async fn create_persists_a_pending_report_that_get_can_reload() {
        let (_dir, store) = temp_store();
        let agent = ReportAgent::new(store, blank_graph(), echo_llm("not json"), None);

        let created = agent.create("sim-1", "graph-1", "how opinions shifted").unwrap();
        assert_eq!(created.status, ReportStatus::Pending);

        let reloaded = agent.get(created.report_id.as_str()).unwrap();
        assert_eq!(reloaded.report_id, created.report_id);
        assert_eq!(reloaded.requirement, "how opinions shifted");
    }

    #[tokio::test]
    async fn list_returns_reports_newest_first() {
        let (_dir, store) = temp_store();
        let agent = ReportAgent::new(store, blank_graph(), echo_llm("not json"), None);

        let first = agent.create("sim-1", "graph-1", "first").unwrap();
        let second = agent.create("sim-1", "graph-1", "second").unwrap();

        let reports = agent.list().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].report_id, second.report_id);
        assert_eq!(reports[1].report_id, first.report_id);
    }

    #[tokio::test]
    async fn generate_completes_with_fallback_sections_when_the_llm_never_answers() {
        let (_dir, store) = temp_store();
        let agent = ReportAgent::new(store, blank_graph(), echo_llm("not json"), None);
        let report = agent.create("sim-1", "graph-1", "how opinions shifted after a recall").unwrap();

        agent.generate(report.report_id.as_str()).await.unwrap();

        let completed = agent.get(report.report_id.as_str()).unwrap();
        assert_eq!(completed.status, ReportStatus::Completed);
        let markdown = completed.markdown.unwrap();
        assert!(markdown.contains("Unable to complete section"));
        assert!(completed.outline.is_some());
    }

    #[tokio::test]
    async fn generate_marks_the_report_failed_when_the_llm_errors() {
        use sim_providers::UnavailableLlmClient;

        let (_dir, store) = temp_store();
        let agent = ReportAgent::new(store, blank_graph(), Arc::new(UnavailableLlmClient), None);
        let report = agent.create("sim-1", "graph-1", "how opinions shifted").unwrap();

        let result = agent.generate(report.report_id.as_str()).await;
        assert!(result.is_err());

        let failed = agent.get(report.report_id.as_str()).unwrap();
        assert_eq!(failed.status, ReportStatus::Failed);
        assert!(failed.last_error.is_some());
    }

    #[tokio::test]
    async fn chat_answers_directly_when_the_model_makes_no_tool_call() {
        let (_dir, store) = temp_store();
        let agent = ReportAgent::new(store, blank_graph(), echo_llm("Final Answer: the sentiment held steady"), None);
        let report = agent.create("sim-1", "graph-1", "how opinions shifted").unwrap();

        let answer = agent.chat(report.report_id.as_str(), "did opinion change?").await.unwrap();
        assert_eq!(answer, "the sentiment held steady");
    }
}
