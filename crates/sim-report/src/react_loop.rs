//! Per-section ReACT loop: the model alternates
//! between tool calls and reasoning until it commits to a `Final Answer:`, bounded by a
//! per-section tool-call budget.

use std::sync::Arc;

use regex::Regex;
use sim_providers::LlmClient;
use sim_types::domain::report::{OutlineSection, OutlineSubsection};
use tracing::debug;

use crate::error::Result;
use crate::tools::ReportTools;

const MAX_ITERATIONS: usize = 5;
const MIN_TOOL_CALLS: usize = 2;
const MAX_TOOL_CALLS_PER_SECTION: usize = 5;
const SECTION_TEMPERATURE: f64 = 0.5;

/// One executed tool call and its observation, kept for the section's `agent_log.jsonl`.
#[derive(Debug, Clone)]
pub struct ToolTrace {
    pub tool: String,
    pub args: serde_json::Value,
    pub observation: String,
}

pub struct SectionResult {
    pub body: String,
    pub traces: Vec<ToolTrace>,
}

pub struct SectionLoop<'a> {
    llm: Arc<dyn LlmClient>,
    tools: &'a ReportTools,
}

impl<'a> SectionLoop<'a> {
    pub fn new(llm: Arc<dyn LlmClient>, tools: &'a ReportTools) -> Self {
        Self { llm, tools }
    }

    pub async fn run_section(
        &self,
        requirement: &str,
        section: &OutlineSection,
        subsection: Option<&OutlineSubsection>,
    ) -> Result<SectionResult> {
        let title = subsection.map(|s| s.title.as_str()).unwrap_or(section.title.as_str());
        let mut transcript = vec![system_prompt(requirement, section, title)];
        let mut traces = Vec::new();
        let mut tool_calls_made = 0;

        for iteration in 0..MAX_ITERATIONS {
            let forced_final = tool_calls_made >= MAX_TOOL_CALLS_PER_SECTION
                || (iteration == MAX_ITERATIONS - 1 && tool_calls_made >= MIN_TOOL_CALLS);
            if forced_final {
                transcript.push(
                    "You have used enough tools. Write the Final Answer now, with no further tool calls."
                        .to_string(),
                );
            }

            let prompt = transcript.join("\n\n");
            let response = self.llm.complete_json(&prompt, SECTION_TEMPERATURE).await?;

            if let Some(answer) = extract_final_answer(&response) {
                if tool_calls_made >= MIN_TOOL_CALLS || forced_final {
                    return Ok(SectionResult { body: answer, traces });
                }
                transcript.push(response);
                transcript.push(format!(
                    "You must use at least {MIN_TOOL_CALLS} tools before answering. Continue."
                ));
                continue;
            }

            match parse_tool_call(&response) {
                Some((name, args)) if tool_calls_made < MAX_TOOL_CALLS_PER_SECTION => {
                    let observation = self
                        .tools
                        .dispatch(&name, &args)
                        .await
                        .unwrap_or_else(|err| format!("tool error: {err}"));
                    debug!(tool = %name, "executed section tool call");
                    traces.push(ToolTrace { tool: name.clone(), args: args.clone(), observation: observation.clone() });
                    tool_calls_made += 1;
                    transcript.push(response);
                    transcript.push(format!("Observation from {name}: {observation}"));
                }
                Some(_) => {
                    transcript.push(response);
                    transcript.push("Tool budget exhausted. Write the Final Answer now.".to_string());
                }
                None => {
                    // Model produced neither a recognizable tool call nor a final answer;
                    // treat the raw text as the answer once the minimum has been met.
                    if tool_calls_made >= MIN_TOOL_CALLS {
                        return Ok(SectionResult { body: response, traces });
                    }
                    transcript.push(response);
                    transcript.push(format!(
                        "Use one of the available tools before answering, or say 'Final Answer:' once ready. You have used {tool_calls_made} of the required {MIN_TOOL_CALLS}."
                    ));
                }
            }
        }

        Ok(SectionResult { body: format!("Unable to complete section '{title}' within the allotted turns."), traces })
    }
}

fn system_prompt(requirement: &str, section: &OutlineSection, title: &str) -> String {
    format!(
        "You are writing one section of a report on a social-opinion simulation.\n\
         Report requirement: {requirement}\n\
         Section: {}\n\
         Current part: {title}\n\n\
         Available tools:\n{}\n\n\
         Call at least {MIN_TOOL_CALLS} tools before answering. To call a tool, respond with \
         exactly: <tool_call>{{\"name\": \"tool_name\", \"args\": {{...}}}}</tool_call>\n\
         When ready, respond with: Final Answer: <section body>\n\
         Do not use markdown headings in the body; plain paragraphs only.",
        section.title,
        crate::tools::tool_descriptions(),
    )
}

fn extract_final_answer(response: &str) -> Option<String> {
    response.find("Final Answer:").map(|idx| response[idx + "Final Answer:".len()..].trim().to_string())
}

/// Recognizes either `<tool_call>{json}</tool_call>` or `[TOOL_CALL] name(k="v", ...)`.
pub(crate) fn parse_tool_call(response: &str) -> Option<(String, serde_json::Value)> {
    if let Some(captures) = xml_tool_call_re().captures(response) {
        let payload = &captures[1];
        let parsed: serde_json::Value = serde_json::from_str(payload).ok()?;
        let name = parsed.get("name")?.as_str()?.to_string();
        let args = parsed.get("args").cloned().unwrap_or(serde_json::json!({}));
        return Some((name, args));
    }

    if let Some(captures) = function_call_re().captures(response) {
        let name = captures[1].to_string();
        let mut args = serde_json::Map::new();
        for pair in kv_re().captures_iter(&captures[2]) {
            args.insert(pair[1].to_string(), serde_json::Value::String(pair[2].to_string()));
        }
        return Some((name, serde_json::Value::Object(args)));
    }

    None
}

fn xml_tool_call_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<tool_call>\s*(\{.*?\})\s*</tool_call>").unwrap())
}

fn function_call_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[TOOL_CALL\]\s*(\w+)\(([^)]*)\)").unwrap())
}

fn kv_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xml_tool_call_form() {
        let response = r#"<tool_call>{"name": "quick_search", "args": {"query": "climate", "limit": 5}}</tool_call>"#;
        let (name, args) = parse_tool_call(response).unwrap();
        assert_eq!(name, "quick_search");
        assert_eq!(args["query"], "climate");
    }

    #[test]
    fn parses_function_call_form() {
        let response = r#"[TOOL_CALL] quick_search(query="climate", limit="5")"#;
        let (name, args) = parse_tool_call(response).unwrap();
        assert_eq!(name, "quick_search");
        assert_eq!(args["query"], "climate");
        assert_eq!(args["limit"], "5");
    }

    #[test]
    fn extracts_final_answer_text() {
        let response = "Some reasoning.\nFinal Answer: The sentiment shifted negative.";
        assert_eq!(extract_final_answer(response).unwrap(), "The sentiment shifted negative.");
    }

    #[test]
    fn returns_none_when_no_tool_call_present() {
        assert!(parse_tool_call("just some plain reasoning text").is_none());
    }
}
