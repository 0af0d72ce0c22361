//! Process summarization engine

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{ActionRecord, ProcessDetailRecord};
use crate::services::llm_client::LanguageModel;

/// Actions considered by either strategy (registry lists newest first)
pub const RECENT_ACTIONS: usize = 5;

const NOT_SPECIFIED: &str = "not specified";

/// Returned by the model-backed strategy whenever it cannot produce a summary
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable: an automatic summary could not be generated for this process.";

/// Summarization strategy
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, detail: &ProcessDetailRecord, actions: &[ActionRecord]) -> String;
}

fn or_not_specified(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(NOT_SPECIFIED)
}

fn join_names(names: Option<&[String]>) -> String {
    let names: Vec<&str> = names
        .unwrap_or_default()
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        names.join(", ")
    }
}

/// Deterministic three-paragraph template
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedSummarizer;

impl RuleBasedSummarizer {
    pub fn render(detail: &ProcessDetailRecord, actions: &[ActionRecord]) -> String {
        let opening = format!(
            "The judicial process with registration key {} is being handled by the office {}. \
             It involves {} as claimant and {} as respondent.",
            or_not_specified(detail.process_key.as_deref()),
            or_not_specified(detail.office.as_deref()),
            join_names(detail.claimants.as_deref()),
            join_names(detail.respondents.as_deref()),
        );

        let recent: Vec<String> = actions
            .iter()
            .take(RECENT_ACTIONS)
            .map(|action| {
                format!(
                    "{}: {} ({})",
                    or_not_specified(action.action_date.as_deref()),
                    or_not_specified(action.label.as_deref()),
                    or_not_specified(action.annotation.as_deref()),
                )
            })
            .collect();

        let activity = if recent.is_empty() {
            "No procedural actions have been recorded for this process yet.".to_string()
        } else {
            format!("The most recent recorded actions are: {}.", recent.join("; "))
        };

        let advice = "Upcoming hearing dates and pending requirements deserve close attention, since they \
                      may decide the course of the process. Follow new actions regularly to make sure every \
                      legal term is met.";

        format!("{}\n\n{}\n\n{}", opening, activity, advice)
    }
}

#[async_trait]
impl Summarizer for RuleBasedSummarizer {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn summarize(&self, detail: &ProcessDetailRecord, actions: &[ActionRecord]) -> String {
        Self::render(detail, actions)
    }
}

const SUMMARY_SYSTEM_PROMPT: &str = "You are a legal assistant specialized in Colombian judicial processes. \
Write a concise but informative summary of a judicial process from its details and recent actions.

The summary must:
1. Be clear and direct, in professional but understandable language
2. Identify the most relevant aspects of the process
3. Highlight the most important actions and their impact on the process
4. Be 3-5 paragraphs long
5. Avoid excessive technicalities or unnecessary legal jargon";

/// External language model strategy
pub struct ModelBackedSummarizer {
    model: Arc<dyn LanguageModel>,
}

impl ModelBackedSummarizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn user_prompt(detail: &ProcessDetailRecord, actions: &[ActionRecord]) -> String {
        let mut recent = String::new();
        for (i, action) in actions.iter().take(RECENT_ACTIONS).enumerate() {
            recent.push_str(&format!(
                "{}. Date: {}\n   Action: {}\n   Annotation: {}\n\n",
                i + 1,
                or_not_specified(action.action_date.as_deref()),
                or_not_specified(action.label.as_deref()),
                or_not_specified(action.annotation.as_deref()),
            ));
        }

        format!(
            "Process details:\n\
             - Registration key: {}\n\
             - Filing date: {}\n\
             - Office: {}\n\
             - Judge: {}\n\
             - Process class: {}\n\
             - Process type: {}\n\
             - Claimants: {}\n\
             - Respondents: {}\n\n\
             Recent actions:\n{}\n\
             Please write a concise but informative summary of this judicial process.",
            or_not_specified(detail.process_key.as_deref()),
            or_not_specified(detail.filing_date.as_deref()),
            or_not_specified(detail.office.as_deref()),
            or_not_specified(detail.judge.as_deref()),
            or_not_specified(detail.process_class.as_deref()),
            or_not_specified(detail.process_type.as_deref()),
            join_names(detail.claimants.as_deref()),
            join_names(detail.respondents.as_deref()),
            recent,
        )
    }
}

#[async_trait]
impl Summarizer for ModelBackedSummarizer {
    fn name(&self) -> &'static str {
        "model_backed"
    }

    async fn summarize(&self, detail: &ProcessDetailRecord, actions: &[ActionRecord]) -> String {
        let prompt = Self::user_prompt(detail, actions);

        match self.model.complete(SUMMARY_SYSTEM_PROMPT, &prompt).await {
            Ok(summary) => {
                info!(process_key = ?detail.process_key, "Generated process summary");
                summary.trim().to_string()
            }
            Err(e) => {
                warn!(process_key = ?detail.process_key, error = %e, "Summary generation failed");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm_client::LlmError;
    use std::sync::Mutex;

    /// Records the prompt it receives
    struct RecordingModel {
        reply: Result<String, ()>,
        last_prompt: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            *self.last_prompt.lock().unwrap() = Some(user.to_string());
            self.reply.clone().map_err(|_| LlmError::EmptyResponse)
        }
    }

    fn detail() -> ProcessDetailRecord {
        ProcessDetailRecord {
            process_key: Some("11001400300320230051800".to_string()),
            office: Some("JUZGADO 003 CIVIL MUNICIPAL".to_string()),
            judge: Some("Ana Gómez".to_string()),
            claimants: Some(vec!["ACME SAS".to_string(), "Globex SA".to_string()]),
            ..ProcessDetailRecord::default()
        }
    }

    fn actions(count: usize) -> Vec<ActionRecord> {
        (1..=count)
            .map(|i| ActionRecord {
                action_id: Some(format!("A-{}", i)),
                action_date: Some(format!("2024-03-{:02}", i)),
                label: Some(format!("Action {}", i)),
                ..ActionRecord::default()
            })
            .collect()
    }

    #[test]
    fn test_template_interpolation() {
        let summary = RuleBasedSummarizer::render(&detail(), &actions(2));

        assert_eq!(summary.split("\n\n").count(), 3);
        assert!(summary.contains("registration key 11001400300320230051800"));
        assert!(summary.contains("ACME SAS, Globex SA as claimant"));
        assert!(summary.contains("not specified as respondent"));
        assert!(summary.contains("2024-03-01: Action 1 (not specified)"));
    }

    #[test]
    fn test_template_takes_five_most_recent() {
        let summary = RuleBasedSummarizer::render(&detail(), &actions(7));
        assert!(summary.contains("Action 5"));
        assert!(!summary.contains("Action 6"));
    }

    #[test]
    fn test_template_with_empty_detail() {
        let summary = RuleBasedSummarizer::render(&ProcessDetailRecord::default(), &[]);
        assert!(summary.contains("registration key not specified"));
        assert!(summary.contains("No procedural actions"));
    }

    #[tokio::test]
    async fn test_model_summary_and_prompt() {
        let model = Arc::new(RecordingModel {
            reply: Ok("  A short summary.  ".to_string()),
            last_prompt: Mutex::new(None),
        });
        let summarizer = ModelBackedSummarizer::new(model.clone());

        let summary = summarizer.summarize(&detail(), &actions(6)).await;
        assert_eq!(summary, "A short summary.");

        let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("5. Date: 2024-03-05"));
        assert!(!prompt.contains("6. Date"));
        assert!(prompt.contains("- Judge: Ana Gómez"));
    }

    #[tokio::test]
    async fn test_model_failure_returns_unavailable() {
        let model = Arc::new(RecordingModel {
            reply: Err(()),
            last_prompt: Mutex::new(None),
        });
        let summarizer = ModelBackedSummarizer::new(model);

        assert_eq!(summarizer.summarize(&detail(), &[]).await, SUMMARY_UNAVAILABLE);
    }
}
