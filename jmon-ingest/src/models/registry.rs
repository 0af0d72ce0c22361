//! Registry payload records
//!
//! Explicit optional-field records for the registry's JSON responses. Field
//! names on the wire are the registry's (Spanish, camelCase); unknown fields are
//! ignored and missing ones become `None`. Identifier fields accept either JSON
//! strings or numbers, because the registry is not consistent about it.

use jmon_common::models::PersonType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept `"123"`, `123`, `null` or a missing field; blank strings become `None`
fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Process search parameters by party name
///
/// `office_code` is optional on the wire, but common names without it regularly
/// exceed the registry's thousand-record cap and come back as
/// `RegistryError::QueryTooBroad`. Callers should pass it whenever they know it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQuery {
    pub name: String,
    pub person_type: PersonType,
    pub active_only: bool,
    pub office_code: Option<String>,
    /// 1-based
    pub page: u32,
}

impl NameQuery {
    pub fn new(name: impl Into<String>, person_type: PersonType) -> Self {
        Self {
            name: name.into(),
            person_type,
            active_only: true,
            office_code: None,
            page: 1,
        }
    }

    pub fn with_office_code(mut self, code: impl Into<String>) -> Self {
        self.office_code = Some(code.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

/// Process search parameters by registration number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberQuery {
    pub number: String,
    pub active_only: bool,
    /// 1-based
    pub page: u32,
}

impl NumberQuery {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            active_only: false,
            page: 1,
        }
    }
}

/// Pagination block attached to search and action listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pagination {
    #[serde(rename = "cantidadRegistros", default)]
    pub total_records: Option<i64>,
    #[serde(rename = "registrosPagina", default)]
    pub records_per_page: Option<i64>,
    #[serde(rename = "cantidadPaginas", default)]
    pub total_pages: Option<i64>,
    #[serde(rename = "pagina", default)]
    pub page: Option<i64>,
}

/// Search response (both search endpoints)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(rename = "tipoConsulta", default)]
    pub query_kind: Option<String>,
    #[serde(rename = "procesos", default)]
    pub processes: Vec<ProcessRecord>,
    #[serde(rename = "paginacion", default)]
    pub pagination: Option<Pagination>,
}

/// One process as listed by a search
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProcessRecord {
    #[serde(rename = "idProceso", default, deserialize_with = "opt_id")]
    pub process_id: Option<String>,
    #[serde(rename = "llaveProceso", default)]
    pub process_key: Option<String>,
    #[serde(rename = "fechaProceso", default)]
    pub filing_date: Option<String>,
    #[serde(rename = "fechaUltimaActuacion", default)]
    pub last_action_date: Option<String>,
    #[serde(rename = "despacho", default)]
    pub office: Option<String>,
    #[serde(rename = "departamento", default)]
    pub department: Option<String>,
    #[serde(rename = "sujetosProcesales", default)]
    pub parties_summary: Option<String>,
    #[serde(rename = "esPrivado", default)]
    pub is_private: Option<bool>,
}

/// Process detail
///
/// Deserialized through [`DetailWire`], so payloads carrying both spellings of a
/// field or odd name-list entries still parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "DetailWire")]
pub struct ProcessDetailRecord {
    #[serde(rename = "idProceso")]
    pub process_id: Option<String>,
    #[serde(rename = "llaveProceso")]
    pub process_key: Option<String>,
    #[serde(rename = "fechaRadicacion")]
    pub filing_date: Option<String>,
    #[serde(rename = "despacho")]
    pub office: Option<String>,
    #[serde(rename = "departamento")]
    pub department: Option<String>,
    #[serde(rename = "ponente")]
    pub judge: Option<String>,
    #[serde(rename = "claseProceso")]
    pub process_class: Option<String>,
    #[serde(rename = "tipoProceso")]
    pub process_type: Option<String>,
    #[serde(rename = "subTipoProceso")]
    pub process_subtype: Option<String>,
    #[serde(rename = "ubicacionExpediente")]
    pub file_location: Option<String>,
    #[serde(rename = "esPrivado")]
    pub is_private: Option<bool>,
    #[serde(rename = "demandantes")]
    pub claimants: Option<Vec<String>>,
    #[serde(rename = "demandados")]
    pub respondents: Option<Vec<String>>,
}

/// Detail payload as the registry sends it; older spellings kept apart
#[derive(Deserialize)]
struct DetailWire {
    #[serde(rename = "idProceso", default, deserialize_with = "opt_id")]
    process_id: Option<String>,
    #[serde(rename = "idRegProceso", default, deserialize_with = "opt_id")]
    reg_process_id: Option<String>,
    #[serde(rename = "llaveProceso", default)]
    process_key: Option<String>,
    #[serde(rename = "fechaRadicacion", default)]
    filing_date: Option<String>,
    #[serde(rename = "fechaProceso", default)]
    process_date: Option<String>,
    #[serde(rename = "despacho", default)]
    office: Option<String>,
    #[serde(rename = "departamento", default)]
    department: Option<String>,
    #[serde(rename = "ponente", default)]
    judge: Option<String>,
    #[serde(rename = "claseProceso", default)]
    process_class: Option<String>,
    #[serde(rename = "tipoProceso", default)]
    process_type: Option<String>,
    #[serde(rename = "subTipoProceso", default)]
    process_subtype: Option<String>,
    #[serde(rename = "subclaseProceso", default)]
    process_subclass: Option<String>,
    #[serde(rename = "ubicacionExpediente", default)]
    file_location: Option<String>,
    #[serde(rename = "ubicacion", default)]
    location: Option<String>,
    #[serde(rename = "esPrivado", default)]
    is_private: Option<bool>,
    #[serde(rename = "demandantes", default, deserialize_with = "name_list")]
    claimants: Option<Vec<String>>,
    #[serde(rename = "demandados", default, deserialize_with = "name_list")]
    respondents: Option<Vec<String>>,
}

impl From<DetailWire> for ProcessDetailRecord {
    fn from(wire: DetailWire) -> Self {
        Self {
            process_id: wire.process_id.or(wire.reg_process_id),
            process_key: wire.process_key,
            filing_date: wire.filing_date.or(wire.process_date),
            office: wire.office,
            department: wire.department,
            judge: wire.judge,
            process_class: wire.process_class,
            process_type: wire.process_type,
            process_subtype: wire.process_subtype.or(wire.process_subclass),
            file_location: wire.file_location.or(wire.location),
            is_private: wire.is_private,
            claimants: wire.claimants,
            respondents: wire.respondents,
        }
    }
}

/// Party name list: strings are kept, objects contribute their name field,
/// anything else is dropped. A bare string counts as a one-name list.
fn name_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    fn entry_name(value: &Value) -> Option<String> {
        let name = match value {
            Value::String(s) => s.as_str(),
            Value::Object(map) => ["nombre", "nombreRazonSocial", "name"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))?,
            _ => return None,
        };
        let trimmed = name.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items.iter().filter_map(entry_name).collect()),
        Some(single @ Value::String(_)) => Some(entry_name(&single).into_iter().collect()),
        _ => None,
    })
}

/// Actions listing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActionsResponse {
    #[serde(rename = "actuaciones", default)]
    pub actions: Vec<ActionRecord>,
    #[serde(rename = "paginacion", default)]
    pub pagination: Option<Pagination>,
}

/// One procedural action ("actuación")
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActionRecord {
    #[serde(rename = "idRegActuacion", default, deserialize_with = "opt_id")]
    pub action_id: Option<String>,
    #[serde(rename = "consActuacion", default)]
    pub sequence: Option<i64>,
    #[serde(rename = "fechaActuacion", default)]
    pub action_date: Option<String>,
    #[serde(rename = "actuacion", default)]
    pub label: Option<String>,
    #[serde(rename = "anotacion", default)]
    pub annotation: Option<String>,
    #[serde(rename = "fechaInicial", default)]
    pub initial_date: Option<String>,
    #[serde(rename = "fechaFinal", default)]
    pub final_date: Option<String>,
    #[serde(rename = "fechaRegistro", default)]
    pub registration_date: Option<String>,
    #[serde(rename = "conDocumentos", default)]
    pub has_documents: Option<bool>,
}

/// Documents listing for one action
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DocumentsResponse {
    #[serde(rename = "documentos", default)]
    pub documents: Vec<DocumentRecord>,
}

/// One document attached to an action
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DocumentRecord {
    #[serde(rename = "idRegDocumento", default, deserialize_with = "opt_id")]
    pub document_id: Option<String>,
    #[serde(rename = "nombreDocumento", default)]
    pub name: Option<String>,
    #[serde(rename = "fechaDocumento", default)]
    pub document_date: Option<String>,
    #[serde(rename = "fechaPublicacion", default)]
    pub publication_date: Option<String>,
    /// Ignored on ingestion; stored URLs are always derived from the document id
    #[serde(rename = "urlDocumento", default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_with_numeric_ids_and_extra_fields() {
        let json = r#"{
            "tipoConsulta": "NombreRazonSocial",
            "procesos": [{
                "idProceso": 123456789,
                "idConexion": 263,
                "llaveProceso": "11001400300320230051800",
                "fechaProceso": "2023-05-10T00:00:00",
                "fechaUltimaActuacion": "2024-02-01T00:00:00",
                "despacho": "JUZGADO 003 CIVIL MUNICIPAL DE BOGOTÁ",
                "departamento": "BOGOTÁ",
                "sujetosProcesales": "Demandante: ACME SAS | Demandado: JUAN PEREZ",
                "esPrivado": false,
                "cantFilas": -1
            }],
            "paginacion": {"cantidadRegistros": 1, "registrosPagina": 20, "cantidadPaginas": 1, "pagina": 1, "paginas": null}
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.processes.len(), 1);
        let process = &response.processes[0];
        assert_eq!(process.process_id.as_deref(), Some("123456789"));
        assert_eq!(process.process_key.as_deref(), Some("11001400300320230051800"));
        assert_eq!(process.is_private, Some(false));
        assert_eq!(response.pagination.unwrap().total_pages, Some(1));
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let record: ActionRecord = serde_json::from_str(r#"{"actuacion": "Auto admite demanda"}"#).unwrap();
        assert_eq!(record.action_id, None);
        assert_eq!(record.sequence, None);
        assert_eq!(record.has_documents, None);
        assert_eq!(record.label.as_deref(), Some("Auto admite demanda"));
    }

    #[test]
    fn test_blank_and_null_ids_are_absent() {
        let record: DocumentRecord = serde_json::from_str(r#"{"idRegDocumento": "  "}"#).unwrap();
        assert_eq!(record.document_id, None);

        let record: DocumentRecord = serde_json::from_str(r#"{"idRegDocumento": null}"#).unwrap();
        assert_eq!(record.document_id, None);
    }

    #[test]
    fn test_empty_search_response() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.processes.is_empty());
        assert!(response.pagination.is_none());
    }

    #[test]
    fn test_detail_aliases() {
        let detail: ProcessDetailRecord = serde_json::from_str(
            r#"{"idRegProceso": 42, "subclaseProceso": "Sin Subclase", "ubicacion": "Despacho"}"#,
        )
        .unwrap();
        assert_eq!(detail.process_id.as_deref(), Some("42"));
        assert_eq!(detail.process_subtype.as_deref(), Some("Sin Subclase"));
        assert_eq!(detail.file_location.as_deref(), Some("Despacho"));
    }

    #[test]
    fn test_detail_with_both_spellings_prefers_current_one() {
        let detail: ProcessDetailRecord = serde_json::from_str(
            r#"{
                "idProceso": 7, "idRegProceso": 42,
                "fechaRadicacion": "2023-05-10", "fechaProceso": "2023-05-01T00:00:00",
                "subTipoProceso": "Ejecutivo", "subclaseProceso": "Sin Subclase",
                "ubicacionExpediente": "Secretaría", "ubicacion": "Despacho"
            }"#,
        )
        .unwrap();
        assert_eq!(detail.process_id.as_deref(), Some("7"));
        assert_eq!(detail.filing_date.as_deref(), Some("2023-05-10"));
        assert_eq!(detail.process_subtype.as_deref(), Some("Ejecutivo"));
        assert_eq!(detail.file_location.as_deref(), Some("Secretaría"));
    }

    #[test]
    fn test_detail_name_lists_accept_mixed_entries() {
        let detail: ProcessDetailRecord = serde_json::from_str(
            r#"{
                "demandantes": [{"nombre": "ACME"}, " Globex SA ", 12, {"otro": "x"}, null],
                "demandados": "Juan Pérez"
            }"#,
        )
        .unwrap();
        assert_eq!(detail.claimants, Some(vec!["ACME".to_string(), "Globex SA".to_string()]));
        assert_eq!(detail.respondents, Some(vec!["Juan Pérez".to_string()]));

        let detail: ProcessDetailRecord = serde_json::from_str(r#"{"demandantes": {"nombre": "ACME"}}"#).unwrap();
        assert_eq!(detail.claimants, None);
    }

    #[test]
    fn test_name_query_page_is_one_based() {
        let query = NameQuery::new("ACME", PersonType::Juridical).with_page(0);
        assert_eq!(query.page, 1);
        assert!(query.active_only);
    }
}
