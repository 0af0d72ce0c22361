//! Action classification engine
//!
//! Assigns an urgency tier, a category, an action-required flag and a
//! justification to one procedural action. Classification is total: every
//! failure of the model-backed strategy degrades to [`fallback_classification`].

use async_trait::async_trait;
use jmon_common::models::{Classification, UrgencyTier};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::ActionRecord;
use crate::services::llm_client::LanguageModel;

/// Classification strategy
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    async fn classify(&self, action: &ActionRecord) -> Classification;
}

struct KeywordRule {
    keywords: &'static [&'static str],
    urgency: UrgencyTier,
    category: &'static str,
    action_required: bool,
    justification: &'static str,
}

/// Checked in order; first match wins
const RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["hearing", "summons", "appearance", "audiencia", "citación", "comparecencia"],
        urgency: UrgencyTier::Urgent,
        category: "Hearing",
        action_required: true,
        justification: "Hearings require preparation and mandatory attendance.",
    },
    KeywordRule {
        keywords: &["requirement", "request", "deadline", "requerimiento", "solicitud", "plazo"],
        urgency: UrgencyTier::High,
        category: "Requirement",
        action_required: true,
        justification: "A defined deadline exists to respond.",
    },
    KeywordRule {
        keywords: &["notification", "notice", "communication", "notificación", "aviso", "comunicación"],
        urgency: UrgencyTier::Normal,
        category: "Notification",
        action_required: false,
        justification: "Informational notice, no immediate action needed.",
    },
];

/// Result used when nothing better can be determined
pub fn fallback_classification() -> Classification {
    Classification {
        urgency: UrgencyTier::Normal,
        category: "Unclassified".to_string(),
        action_required: false,
        justification: "Could not be automatically determined.".to_string(),
    }
}

/// Keyword rules over the action label (case-insensitive substring match)
pub fn classify_label(label: &str) -> Classification {
    let label = label.to_lowercase();

    let rule = RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|keyword| label.contains(keyword)));

    match rule {
        Some(rule) => Classification {
            urgency: rule.urgency,
            category: rule.category.to_string(),
            action_required: rule.action_required,
            justification: rule.justification.to_string(),
        },
        None => Classification {
            urgency: UrgencyTier::Low,
            category: "Procedure".to_string(),
            action_required: false,
            justification: "Routine procedural step with no critical deadlines.".to_string(),
        },
    }
}

/// Deterministic keyword strategy
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedClassifier;

#[async_trait]
impl Classifier for RuleBasedClassifier {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn classify(&self, action: &ActionRecord) -> Classification {
        classify_label(action.label.as_deref().unwrap_or_default())
    }
}

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are a legal assistant specialized in Colombian judicial processes.
Classify one judicial action by urgency and type.

Provide:
1. Urgency tier: "Urgent", "High", "Normal" or "Low"
2. Action category: a general label such as "Hearing", "Requirement" or "Notification"
3. Whether immediate action is required: true or false
4. A short justification (1-2 sentences)

Answer with JSON only, using these keys:
{
    "urgency_tier": "Urgent|High|Normal|Low",
    "category": "string",
    "action_required": boolean,
    "justification": "string"
}"#;

/// Model reply shape; accepts the Spanish keys models often answer with
#[derive(Debug, Deserialize)]
struct ModelClassification {
    #[serde(alias = "nivel_urgencia", alias = "urgency", alias = "urgencyTier")]
    urgency_tier: String,
    #[serde(alias = "tipo_actuacion", default)]
    category: Option<String>,
    #[serde(alias = "requiere_accion", alias = "actionRequired", default)]
    action_required: bool,
    #[serde(alias = "justificacion", default)]
    justification: Option<String>,
}

/// External language model strategy
pub struct ModelBackedClassifier {
    model: Arc<dyn LanguageModel>,
}

impl ModelBackedClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Classifier for ModelBackedClassifier {
    fn name(&self) -> &'static str {
        "model_backed"
    }

    async fn classify(&self, action: &ActionRecord) -> Classification {
        let user_prompt = format!(
            "Judicial action:\n- Date: {}\n- Action: {}\n- Annotation: {}\n\nClassify this action by urgency and type.",
            action.action_date.as_deref().unwrap_or_default(),
            action.label.as_deref().unwrap_or_default(),
            action.annotation.as_deref().unwrap_or_default(),
        );

        let reply = match self.model.complete(CLASSIFY_SYSTEM_PROMPT, &user_prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(action_id = ?action.action_id, error = %e, "Classification call failed, using fallback");
                return fallback_classification();
            }
        };

        match parse_model_reply(&reply) {
            Some(classification) => {
                debug!(action_id = ?action.action_id, urgency = %classification.urgency, "Model classification");
                classification
            }
            None => {
                warn!(action_id = ?action.action_id, "Unusable classification reply, using fallback");
                fallback_classification()
            }
        }
    }
}

fn parse_model_reply(reply: &str) -> Option<Classification> {
    let json = first_json_object(reply)?;
    let parsed: ModelClassification = serde_json::from_str(json).ok()?;
    let urgency = parsed.urgency_tier.parse::<UrgencyTier>().ok()?;

    let fallback = fallback_classification();
    Some(Classification {
        urgency,
        category: parsed
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(fallback.category),
        action_required: parsed.action_required,
        justification: parsed
            .justification
            .filter(|j| !j.trim().is_empty())
            .unwrap_or(fallback.justification),
    })
}

/// First balanced `{...}` substring, ignoring braces inside JSON strings
pub(crate) fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
