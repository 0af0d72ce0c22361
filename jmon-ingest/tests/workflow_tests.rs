//! Monitoring workflow tests with an in-process registry stub

use async_trait::async_trait;
use jmon_common::config::DEFAULT_REGISTRY_BASE_URL;
use jmon_common::db::create_tables;
use jmon_common::models::{PersonType, UrgencyTier};
use jmon_ingest::models::{
    ActionRecord, ActionsResponse, DocumentRecord, DocumentsResponse, NameQuery, NumberQuery, Pagination,
    ProcessDetailRecord, ProcessRecord, SearchResponse,
};
use jmon_ingest::services::{
    Engines, IngestionCoordinator, JudicialRegistry, MonitorWorkflow, RegistryError, RuleBasedClassifier,
    RuleBasedSummarizer,
};
use jmon_ingest::WorkflowError;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct StubRegistry {
    /// Name search pages by page number
    pages: HashMap<u32, SearchResponse>,
    too_broad: bool,
    actions: Vec<ActionRecord>,
    documents: Vec<DocumentRecord>,
    requested_pages: Mutex<Vec<u32>>,
}

#[async_trait]
impl JudicialRegistry for StubRegistry {
    async fn search_by_name(&self, query: &NameQuery) -> Result<SearchResponse, RegistryError> {
        if self.too_broad {
            return Err(RegistryError::QueryTooBroad("narrow it".to_string()));
        }
        self.requested_pages.lock().unwrap().push(query.page);
        Ok(self.pages.get(&query.page).cloned().unwrap_or_default())
    }

    async fn search_by_number(&self, _query: &NumberQuery) -> Result<SearchResponse, RegistryError> {
        Ok(self.pages.get(&1).cloned().unwrap_or_default())
    }

    async fn process_detail(&self, process_id: &str) -> Result<ProcessDetailRecord, RegistryError> {
        Ok(ProcessDetailRecord {
            process_id: Some(process_id.to_string()),
            process_key: Some("11001400300320230051800".to_string()),
            office: Some("JUZGADO 003 CIVIL MUNICIPAL".to_string()),
            process_class: Some("Verbal".to_string()),
            claimants: Some(vec!["ACME SAS".to_string()]),
            respondents: Some(vec!["Juan Pérez".to_string()]),
            ..ProcessDetailRecord::default()
        })
    }

    async fn process_actions(&self, _process_id: &str) -> Result<ActionsResponse, RegistryError> {
        Ok(ActionsResponse {
            actions: self.actions.clone(),
            pagination: None,
        })
    }

    async fn action_documents(&self, _action_id: &str) -> Result<DocumentsResponse, RegistryError> {
        Ok(DocumentsResponse {
            documents: self.documents.clone(),
        })
    }

    async fn download_document(&self, document_id: &str) -> Result<Vec<u8>, RegistryError> {
        Ok(format!("%PDF {}", document_id).into_bytes())
    }
}

fn page(ids: &[&str], page: i64, total_pages: Option<i64>) -> SearchResponse {
    SearchResponse {
        query_kind: None,
        processes: ids
            .iter()
            .map(|id| ProcessRecord {
                process_id: Some(id.to_string()),
                last_action_date: Some("2024-02-01".to_string()),
                ..ProcessRecord::default()
            })
            .collect(),
        pagination: Some(Pagination {
            total_records: None,
            records_per_page: None,
            total_pages,
            page: Some(page),
        }),
    }
}

fn action(action_id: &str, label: &str) -> ActionRecord {
    ActionRecord {
        action_id: Some(action_id.to_string()),
        action_date: Some("2024-03-15T00:00:00".to_string()),
        label: Some(label.to_string()),
        ..ActionRecord::default()
    }
}

async fn build_workflow(registry: StubRegistry, max_pages: u32) -> (MonitorWorkflow, Arc<StubRegistry>) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_tables(&pool).await.unwrap();

    let registry = Arc::new(registry);
    let engines = Engines {
        classifier: Arc::new(RuleBasedClassifier),
        summarizer: Arc::new(RuleBasedSummarizer),
    };
    let workflow = MonitorWorkflow::new(
        registry.clone(),
        IngestionCoordinator::new(pool, DEFAULT_REGISTRY_BASE_URL),
        engines,
        max_pages,
    );
    (workflow, registry)
}

#[tokio::test]
async fn test_name_search_stores_processes_linked_to_party() {
    let mut pages = HashMap::new();
    let mut first = page(&["P-1", "P-2"], 1, Some(1));
    first.processes.push(ProcessRecord::default());
    pages.insert(1, first);

    let (workflow, _) = build_workflow(StubRegistry { pages, ..StubRegistry::default() }, 10).await;

    let outcome = workflow
        .search_by_name(&NameQuery::new("ACME SAS", PersonType::Juridical))
        .await
        .unwrap();

    assert_eq!(outcome.stored.len(), 2);
    assert_eq!(outcome.skipped, 1);
    assert!(outcome.stored.iter().all(|p| p.party_ref.is_some()));
    assert_eq!(outcome.stored[0].party_ref, outcome.stored[1].party_ref);
}

#[tokio::test]
async fn test_number_search_stores_without_party() {
    let mut pages = HashMap::new();
    pages.insert(1, page(&["P-9"], 1, Some(1)));

    let (workflow, _) = build_workflow(StubRegistry { pages, ..StubRegistry::default() }, 10).await;

    let outcome = workflow.search_by_number(&NumberQuery::new("1100")).await.unwrap();
    assert_eq!(outcome.stored.len(), 1);
    assert_eq!(outcome.stored[0].party_ref, None);
}

#[tokio::test]
async fn test_too_broad_search_surfaces_registry_error() {
    let (workflow, _) = build_workflow(
        StubRegistry {
            too_broad: true,
            ..StubRegistry::default()
        },
        10,
    )
    .await;

    let err = workflow
        .search_by_name(&NameQuery::new("BANCO", PersonType::Juridical))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Registry(RegistryError::QueryTooBroad(_))));
}

#[tokio::test]
async fn test_all_pages_stops_at_last_reported_page() {
    let mut pages = HashMap::new();
    pages.insert(1, page(&["P-1"], 1, Some(2)));
    pages.insert(2, page(&["P-2"], 2, Some(2)));
    pages.insert(3, page(&["P-3"], 3, Some(2)));

    let (workflow, registry) = build_workflow(StubRegistry { pages, ..StubRegistry::default() }, 10).await;

    let outcome = workflow
        .search_by_name_all_pages(&NameQuery::new("ACME SAS", PersonType::Juridical))
        .await
        .unwrap();

    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.stored.len(), 2);
    assert_eq!(*registry.requested_pages.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_all_pages_stops_on_empty_page_and_at_cap() {
    let mut pages = HashMap::new();
    pages.insert(1, page(&["P-1"], 1, None));
    let (workflow_empty, registry) = build_workflow(StubRegistry { pages, ..StubRegistry::default() }, 10).await;

    let outcome = workflow_empty
        .search_by_name_all_pages(&NameQuery::new("ACME SAS", PersonType::Juridical))
        .await
        .unwrap();
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(*registry.requested_pages.lock().unwrap(), vec![1, 2]);

    let mut pages = HashMap::new();
    for n in 1..=5 {
        pages.insert(n, page(&[format!("P-{}", n).as_str()], i64::from(n), None));
    }
    let (workflow_capped, registry) = build_workflow(StubRegistry { pages, ..StubRegistry::default() }, 3).await;

    let outcome = workflow_capped
        .search_by_name_all_pages(&NameQuery::new("ACME SAS", PersonType::Juridical))
        .await
        .unwrap();
    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(outcome.stored.len(), 3);
    assert_eq!(*registry.requested_pages.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_refresh_process_stores_summary_and_classifications() {
    let mut pages = HashMap::new();
    pages.insert(1, page(&["P-1"], 1, Some(1)));
    let registry = StubRegistry {
        pages,
        actions: vec![
            action("A-2", "Fijación fecha de audiencia"),
            action("A-1", "Auto admite demanda"),
        ],
        ..StubRegistry::default()
    };
    let (workflow, _) = build_workflow(registry, 10).await;
    workflow
        .search_by_name(&NameQuery::new("ACME SAS", PersonType::Juridical))
        .await
        .unwrap();

    let report = workflow.refresh_process("P-1").await.unwrap();

    assert_eq!(report.actions.len(), 2);
    assert_eq!(report.actions[0].classification.urgency, UrgencyTier::Urgent);
    assert_eq!(report.actions[1].classification.urgency, UrgencyTier::Low);
    assert!(report.summary.contains("11001400300320230051800"));

    let process = report.process.unwrap();
    assert_eq!(process.summary.as_deref(), Some(report.summary.as_str()));
    assert_eq!(process.process_class.as_deref(), Some("Verbal"));
    assert!(process.party_ref.is_some());

    assert_eq!(report.stored_actions.len(), 2);
    assert_eq!(report.stored_actions[0].category.as_deref(), Some("Hearing"));
    assert!(report.stored_actions[0].action_required);
}

#[tokio::test]
async fn test_refresh_unknown_process_writes_nothing() {
    let registry = StubRegistry {
        actions: vec![action("A-1", "Notificación por estado")],
        ..StubRegistry::default()
    };
    let (workflow, _) = build_workflow(registry, 10).await;

    let report = workflow.refresh_process("P-new").await.unwrap();

    assert!(report.process_missing);
    assert!(report.process.is_none());
    assert!(report.stored_actions.is_empty());
    assert_eq!(report.actions[0].classification.urgency, UrgencyTier::Normal);
    assert!(report.summary.contains("11001400300320230051800"));
    assert!(workflow.coordinator().find_process("P-new").await.unwrap().is_none());
    assert!(workflow.coordinator().find_action("A-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_process_seen_first_by_refresh_links_party_on_later_search() {
    let mut pages = HashMap::new();
    pages.insert(1, page(&["P-1"], 1, Some(1)));
    let registry = StubRegistry {
        pages,
        actions: vec![action("A-1", "Auto")],
        ..StubRegistry::default()
    };
    let (workflow, _) = build_workflow(registry, 10).await;

    assert!(workflow.refresh_process("P-1").await.unwrap().process_missing);

    let outcome = workflow
        .search_by_name(&NameQuery::new("ACME SAS", PersonType::Juridical))
        .await
        .unwrap();
    assert!(outcome.stored[0].party_ref.is_some());

    let report = workflow.refresh_process("P-1").await.unwrap();
    assert!(!report.process_missing);
    assert_eq!(report.stored_actions.len(), 1);
}

#[tokio::test]
async fn test_documents_and_download() {
    let mut pages = HashMap::new();
    pages.insert(1, page(&["P-1"], 1, Some(1)));
    let registry = StubRegistry {
        pages,
        actions: vec![action("A-1", "Auto")],
        documents: vec![DocumentRecord {
            document_id: Some("D-1".to_string()),
            name: Some("Auto.pdf".to_string()),
            ..DocumentRecord::default()
        }],
        ..StubRegistry::default()
    };
    let (workflow, _) = build_workflow(registry, 10).await;

    let missing = workflow.refresh_action_documents("A-1").await.unwrap();
    assert!(missing.action_missing);
    assert!(missing.stored.is_empty());

    workflow.search_by_number(&NumberQuery::new("1100")).await.unwrap();
    workflow.refresh_process("P-1").await.unwrap();
    let report = workflow.refresh_action_documents("A-1").await.unwrap();
    assert!(!report.action_missing);
    assert_eq!(report.stored.len(), 1);

    let dir = TempDir::new().unwrap();
    let path = workflow.download_document("D-1", dir.path()).await.unwrap();

    assert_eq!(path, dir.path().join("D-1.pdf"));
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF D-1".to_vec());

    let stored = workflow.coordinator().find_document("D-1").await.unwrap().unwrap();
    assert_eq!(stored.local_path.as_deref(), Some(path.to_string_lossy().as_ref()));
}
