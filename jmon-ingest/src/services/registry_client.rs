//! Judicial registry API client
//!
//! Read-only HTTPS/JSON client for the public registry. Every failure, transport
//! or HTTP status, comes back as a [`RegistryError`]; nothing raw escapes. When
//! the registry's error body carries a human-readable `Message`, it is appended
//! to the error text so the caller sees why the registry refused the query.

use async_trait::async_trait;
use jmon_common::config::RegistryConfig;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{
    ActionsResponse, DocumentsResponse, NameQuery, NumberQuery, ProcessDetailRecord, SearchResponse,
};

/// Text the registry includes when a name search exceeds its record cap
pub const TOO_BROAD_MARKER: &str = "Hay más de mil registros";

/// Registry client errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transport failure, non-success status or unreadable body
    #[error("Registry query failed: {0}")]
    QueryFailed(String),

    /// Name search matched more records than the registry will return
    #[error("{0}")]
    QueryTooBroad(String),
}

/// Registry operations the ingestion workflow depends on
#[async_trait]
pub trait JudicialRegistry: Send + Sync {
    async fn search_by_name(&self, query: &NameQuery) -> Result<SearchResponse, RegistryError>;

    async fn search_by_number(&self, query: &NumberQuery) -> Result<SearchResponse, RegistryError>;

    async fn process_detail(&self, process_id: &str) -> Result<ProcessDetailRecord, RegistryError>;

    async fn process_actions(&self, process_id: &str) -> Result<ActionsResponse, RegistryError>;

    async fn action_documents(&self, action_id: &str) -> Result<DocumentsResponse, RegistryError>;

    /// Raw document bytes (PDF)
    async fn download_document(&self, document_id: &str) -> Result<Vec<u8>, RegistryError>;
}

/// HTTP implementation of [`JudicialRegistry`]
pub struct RegistryClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RegistryError::QueryFailed(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<reqwest::Response, RegistryError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, "Querying registry");

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Registry request failed");
                RegistryError::QueryFailed(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let transport = match response.error_for_status_ref() {
            Err(e) => e.to_string(),
            Ok(_) => format!("HTTP status {}", status),
        };
        let body = response.text().await.unwrap_or_default();
        let message = match upstream_message(&body) {
            Some(detail) => format!("{} - {}", transport, detail),
            None => transport,
        };

        error!(url = %url, status = status.as_u16(), message = %message, "Registry returned an error");
        Err(RegistryError::QueryFailed(message))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, RegistryError> {
        let response = self.fetch(endpoint, params).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::QueryFailed(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| {
            error!(endpoint = %endpoint, error = %e, "Registry returned malformed JSON");
            RegistryError::QueryFailed(format!("Malformed registry response: {}", e))
        })
    }
}

/// `Message` field of a registry error body, if any
fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("Message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn flag(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

#[async_trait]
impl JudicialRegistry for RegistryClient {
    async fn search_by_name(&self, query: &NameQuery) -> Result<SearchResponse, RegistryError> {
        let params = [
            ("nombre", query.name.clone()),
            ("tipoPersona", query.person_type.code().to_string()),
            ("SoloActivos", flag(query.active_only)),
            ("codificacionDespacho", query.office_code.clone().unwrap_or_default()),
            ("pagina", query.page.to_string()),
        ];

        let response: SearchResponse = self
            .get_json("Procesos/Consulta/NombreRazonSocial", &params)
            .await
            .map_err(|e| match e {
                RegistryError::QueryFailed(message) if message.contains(TOO_BROAD_MARKER) => {
                    warn!(name = %query.name, "Name search matched more than a thousand records");
                    RegistryError::QueryTooBroad(
                        "The search matched more than a thousand records. Narrow it with an office code \
                         (codificacionDespacho) or use the party's exact full name."
                            .to_string(),
                    )
                }
                other => other,
            })?;

        info!(
            name = %query.name,
            page = query.page,
            processes = response.processes.len(),
            "Name search completed"
        );
        Ok(response)
    }

    async fn search_by_number(&self, query: &NumberQuery) -> Result<SearchResponse, RegistryError> {
        let params = [
            ("numero", query.number.clone()),
            ("SoloActivos", flag(query.active_only)),
            ("pagina", query.page.to_string()),
        ];

        let response: SearchResponse = self.get_json("Procesos/Consulta/NumeroRadicacion", &params).await?;
        info!(
            number = %query.number,
            processes = response.processes.len(),
            "Number search completed"
        );
        Ok(response)
    }

    async fn process_detail(&self, process_id: &str) -> Result<ProcessDetailRecord, RegistryError> {
        self.get_json(&format!("Proceso/Detalle/{}", process_id), &[]).await
    }

    async fn process_actions(&self, process_id: &str) -> Result<ActionsResponse, RegistryError> {
        let response: ActionsResponse = self
            .get_json(&format!("Proceso/Actuaciones/{}", process_id), &[])
            .await?;
        debug!(process_id = %process_id, actions = response.actions.len(), "Fetched actions");
        Ok(response)
    }

    async fn action_documents(&self, action_id: &str) -> Result<DocumentsResponse, RegistryError> {
        let response: DocumentsResponse = self
            .get_json(&format!("Proceso/DocumentosActuacion/{}", action_id), &[])
            .await?;
        debug!(action_id = %action_id, documents = response.documents.len(), "Fetched documents");
        Ok(response)
    }

    async fn download_document(&self, document_id: &str) -> Result<Vec<u8>, RegistryError> {
        let response = self
            .fetch(&format!("Descarga/Documento/{}", document_id), &[])
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RegistryError::QueryFailed(e.to_string()))?;

        info!(document_id = %document_id, bytes = bytes.len(), "Downloaded document");
        Ok(bytes.to_vec())
    }
}
