//! Persisted entity models
//!
//! Four entity kinds, each carrying the registry's external identifier and the
//! store's surrogate `id`:
//! - [`Party`] (referenced by processes, never owned)
//! - [`Process`] (owns its actions)
//! - [`Action`] (owns its documents)
//! - [`Document`]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Registry person type for a party search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersonType {
    /// Company / legal entity (`jur` on the registry)
    #[default]
    Juridical,
    /// Natural person (`nat` on the registry)
    Natural,
}

impl PersonType {
    /// Code used by the registry query string and stored in `parties.person_type`
    pub fn code(&self) -> &'static str {
        match self {
            PersonType::Juridical => "jur",
            PersonType::Natural => "nat",
        }
    }
}

impl fmt::Display for PersonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PersonType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jur" | "juridical" | "juridica" => Ok(PersonType::Juridical),
            "nat" | "natural" => Ok(PersonType::Natural),
            other => Err(Error::InvalidInput(format!("Unknown person type: {}", other))),
        }
    }
}

/// Urgency tier assigned by the classification engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UrgencyTier {
    Urgent,
    High,
    Normal,
    Low,
}

impl UrgencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::Urgent => "Urgent",
            UrgencyTier::High => "High",
            UrgencyTier::Normal => "Normal",
            UrgencyTier::Low => "Low",
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for UrgencyTier {
    type Err = Error;

    /// Accepts the English tier names and the Spanish ones language models tend to answer with
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "urgent" | "urgente" => Ok(UrgencyTier::Urgent),
            "high" | "alta" => Ok(UrgencyTier::High),
            "normal" => Ok(UrgencyTier::Normal),
            "low" | "baja" => Ok(UrgencyTier::Low),
            other => Err(Error::InvalidInput(format!("Unknown urgency tier: {}", other))),
        }
    }
}

/// Classification engine output for one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub urgency: UrgencyTier,
    pub category: String,
    pub action_required: bool,
    pub justification: String,
}

/// Party (company or natural person)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Party {
    pub id: i64,
    /// Tax identifier; absent until some hint supplies one
    pub nit: Option<String>,
    pub name: String,
    pub person_type: PersonType,
    pub created_at: DateTime<Utc>,
}

/// Party identity hint supplied alongside a process record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyHint {
    pub name: String,
    pub person_type: PersonType,
    pub nit: Option<String>,
}

impl PartyHint {
    pub fn new(name: impl Into<String>, person_type: PersonType) -> Self {
        Self {
            name: name.into(),
            person_type,
            nit: None,
        }
    }

    pub fn with_nit(mut self, nit: impl Into<String>) -> Self {
        self.nit = Some(nit.into());
        self
    }

    /// The hint's nit, if present and non-blank
    pub fn usable_nit(&self) -> Option<&str> {
        self.nit.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Judicial process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Process {
    pub id: i64,
    pub process_id: String,
    pub process_key: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub last_action_date: Option<NaiveDate>,
    pub office: Option<String>,
    pub department: Option<String>,
    pub parties_summary: Option<String>,
    pub process_class: Option<String>,
    pub process_type: Option<String>,
    pub process_subtype: Option<String>,
    pub file_location: Option<String>,
    pub is_private: bool,
    pub claimants: Option<Vec<String>>,
    pub respondents: Option<Vec<String>>,
    pub summary: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub party_ref: Option<i64>,
}

/// Procedural action ("actuación") within a process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub id: i64,
    pub action_id: String,
    pub process_ref: i64,
    pub sequence: Option<i64>,
    pub action_date: Option<NaiveDate>,
    pub label: Option<String>,
    pub annotation: Option<String>,
    pub initial_date: Option<NaiveDate>,
    pub final_date: Option<NaiveDate>,
    pub registration_date: Option<NaiveDate>,
    pub has_documents: bool,
    pub urgency: Option<UrgencyTier>,
    pub category: Option<String>,
    pub action_required: bool,
    pub justification: Option<String>,
}

/// Document attached to an action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub document_id: String,
    pub action_ref: i64,
    pub name: Option<String>,
    pub document_date: Option<NaiveDate>,
    pub publication_date: Option<NaiveDate>,
    pub download_url: String,
    pub local_path: Option<String>,
}
