//! Engine construction from configuration
//!
//! The strategy is chosen once here; callers only see the `Classifier` and
//! `Summarizer` traits.

use jmon_common::config::{EngineStrategy, MonitorConfig};
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::classifier::{Classifier, ModelBackedClassifier, RuleBasedClassifier};
use crate::services::llm_client::{ChatCompletionClient, LanguageModel};
use crate::services::summarizer::{ModelBackedSummarizer, RuleBasedSummarizer, Summarizer};

/// Classification and summarization engines sharing one strategy
#[derive(Clone)]
pub struct Engines {
    pub classifier: Arc<dyn Classifier>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl Engines {
    pub fn from_config(config: &MonitorConfig) -> Self {
        let model = match config.engine.strategy {
            EngineStrategy::RuleBased => None,
            EngineStrategy::ModelBacked => language_model(config),
        };

        let engines = Self {
            classifier: build_classifier(config.engine.strategy, model.clone()),
            summarizer: build_summarizer(config.engine.strategy, model),
        };

        info!(
            classifier = engines.classifier.name(),
            summarizer = engines.summarizer.name(),
            "Engines ready"
        );
        engines
    }
}

/// Chat-completion client for the configured endpoint, if one can be built
pub fn language_model(config: &MonitorConfig) -> Option<Arc<dyn LanguageModel>> {
    match ChatCompletionClient::new(&config.llm) {
        Ok(client) => {
            if !client.is_configured() {
                warn!("No language model API key configured, model-backed engines will return fallbacks");
            }
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!(error = %e, "Could not create language model client");
            None
        }
    }
}

pub fn build_classifier(strategy: EngineStrategy, model: Option<Arc<dyn LanguageModel>>) -> Arc<dyn Classifier> {
    match (strategy, model) {
        (EngineStrategy::ModelBacked, Some(model)) => Arc::new(ModelBackedClassifier::new(model)),
        (EngineStrategy::ModelBacked, None) => {
            warn!("Model-backed classifier requested without a language model, using keyword rules");
            Arc::new(RuleBasedClassifier)
        }
        (EngineStrategy::RuleBased, _) => Arc::new(RuleBasedClassifier),
    }
}

pub fn build_summarizer(strategy: EngineStrategy, model: Option<Arc<dyn LanguageModel>>) -> Arc<dyn Summarizer> {
    match (strategy, model) {
        (EngineStrategy::ModelBacked, Some(model)) => Arc::new(ModelBackedSummarizer::new(model)),
        (EngineStrategy::ModelBacked, None) => {
            warn!("Model-backed summarizer requested without a language model, using template");
            Arc::new(RuleBasedSummarizer)
        }
        (EngineStrategy::RuleBased, _) => Arc::new(RuleBasedSummarizer),
    }
}
