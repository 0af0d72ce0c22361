//! Service modules for judicial registry ingestion

pub mod classifier;
pub mod engines;
pub mod ingestion;
pub mod llm_client;
pub mod registry_client;
pub mod summarizer;
pub mod workflow;

pub use classifier::{Classifier, ModelBackedClassifier, RuleBasedClassifier};
pub use engines::{build_classifier, build_summarizer, Engines};
pub use ingestion::{EntityKind, IngestOutcome, IngestionCoordinator};
pub use llm_client::{ChatCompletionClient, LanguageModel, LlmError};
pub use registry_client::{JudicialRegistry, RegistryClient, RegistryError};
pub use summarizer::{ModelBackedSummarizer, RuleBasedSummarizer, Summarizer};
pub use workflow::{MonitorWorkflow, ProcessReport};
