//! Scenario tests for the orchestrator over real on-disk stores

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use docrag_core::{
    BlobStore, CompletionGateway, DocumentRecord, DocumentStore, EmbeddingGateway, IndexEngine,
    IndexEngineFactory, InsertedDocument,
};
use docrag_index::{IndexConfig, LocalIndexFactory, compute_document_id};
use docrag_provider::{StubCompletion, StubEmbedding};
use docrag_store::{FsBlobStore, JsonDocumentStore};
use insta::assert_yaml_snapshot;
use tempfile::TempDir;

use crate::{
    BatchOutcome, DocumentStatus, Error, HealthStatus, Orchestrator, OrchestratorConfig,
    ProviderStatus, QueryParam, UploadFile,
};

const DIM: usize = 32;

#[derive(Default)]
struct Faults {
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
    insert_delay_ms: AtomicU64,
}

/// Delegates to the local engine unless a fault is switched on.
struct FlakyEngine {
    inner: Arc<dyn IndexEngine>,
    faults: Arc<Faults>,
}

#[async_trait]
impl IndexEngine for FlakyEngine {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn document_id(&self, text: &str) -> String {
        self.inner.document_id(text)
    }

    async fn insert(&self, texts: &[String]) -> docrag_core::Result<Vec<InsertedDocument>> {
        let delay = self.faults.insert_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.faults.fail_insert.load(Ordering::SeqCst) {
            return Err(Error::IndexOperationFailed("injected insert failure".to_string()));
        }
        self.inner.insert(texts).await
    }

    async fn delete_by_id(&self, id: &str) -> docrag_core::Result<bool> {
        if self.faults.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::IndexOperationFailed("injected delete failure".to_string()));
        }
        self.inner.delete_by_id(id).await
    }

    async fn query(&self, text: &str, param: &QueryParam) -> docrag_core::Result<String> {
        self.inner.query(text, param).await
    }

    async fn document_count(&self) -> docrag_core::Result<usize> {
        self.inner.document_count().await
    }

    async fn chunk_count(&self) -> docrag_core::Result<usize> {
        self.inner.chunk_count().await
    }
}

/// Counts constructions and hands out [`FlakyEngine`]s.
struct CountingFactory {
    inner: LocalIndexFactory,
    builds: AtomicUsize,
    delay: Duration,
    faults: Arc<Faults>,
}

#[async_trait]
impl IndexEngineFactory for CountingFactory {
    async fn build(
        &self,
        dimension: usize,
        embedding: Arc<dyn EmbeddingGateway>,
        completion: Arc<dyn CompletionGateway>,
    ) -> docrag_core::Result<Arc<dyn IndexEngine>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let inner = self.inner.build(dimension, embedding, completion).await?;
        Ok(Arc::new(FlakyEngine {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct Harness {
    working: TempDir,
    _storage: TempDir,
    embedding: Arc<StubEmbedding>,
    completion: Arc<StubCompletion>,
    documents: Arc<JsonDocumentStore>,
    blobs: Arc<FsBlobStore>,
    factory: Arc<CountingFactory>,
    orchestrator: Orchestrator,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(OrchestratorConfig::default(), Duration::ZERO).await
    }

    async fn with_config(config: OrchestratorConfig, build_delay: Duration) -> Self {
        let working = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let embedding = Arc::new(StubEmbedding::new(DIM));
        let completion = Arc::new(StubCompletion::new());
        let documents = Arc::new(JsonDocumentStore::open(working.path()).await.unwrap());
        let blobs = Arc::new(FsBlobStore::open(storage.path()).await.unwrap());
        let factory = Arc::new(CountingFactory {
            inner: LocalIndexFactory::new(index_config(&working)),
            builds: AtomicUsize::new(0),
            delay: build_delay,
            faults: Arc::new(Faults::default()),
        });

        let orchestrator = Orchestrator::builder()
            .config(config)
            .embedding(embedding.clone())
            .completion(completion.clone())
            .document_store(documents.clone())
            .blob_store(blobs.clone())
            .index_factory(factory.clone())
            .build()
            .unwrap();

        Self {
            working,
            _storage: storage,
            embedding,
            completion,
            documents,
            blobs,
            factory,
            orchestrator,
        }
    }

    /// A second orchestrator over the same stores, with its own embedding gateway.
    fn reopen(&self, embedding: Arc<StubEmbedding>) -> Orchestrator {
        Orchestrator::builder()
            .embedding(embedding)
            .completion(self.completion.clone())
            .document_store(self.documents.clone())
            .blob_store(self.blobs.clone())
            .index_factory(Arc::new(LocalIndexFactory::new(index_config(&self.working))))
            .build()
            .unwrap()
    }

    fn builds(&self) -> usize {
        self.factory.builds.load(Ordering::SeqCst)
    }

    fn faults(&self) -> &Faults {
        &self.factory.faults
    }

    async fn listed_filenames(&self) -> Vec<String> {
        self.orchestrator
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.filename)
            .collect()
    }
}

fn index_config(working: &TempDir) -> IndexConfig {
    IndexConfig {
        chunk_token_size: 64,
        chunk_overlap_token_size: 8,
        ..IndexConfig::default().with_working_dir(working.path())
    }
}

fn text_file(name: &str, content: &str) -> UploadFile {
    UploadFile::new(name, content.as_bytes().to_vec())
}

fn report_files() -> Vec<UploadFile> {
    vec![
        text_file("a.txt", "Report A has 12 pages in total."),
        text_file("b.txt", "Report B has 30 pages in total."),
    ]
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let h = Harness::new().await;

    let first = h.orchestrator.initialize().await.unwrap();
    let second = h.orchestrator.initialize().await.unwrap();
    h.orchestrator.initialize().await.unwrap();

    assert_eq!(first.dimension(), DIM);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(h.embedding.calls(), 1);
    assert_eq!(h.builds(), 1);
}

#[tokio::test]
async fn test_concurrent_initialize_constructs_once() {
    let h = Harness::with_config(OrchestratorConfig::default(), Duration::from_millis(50)).await;

    let (a, b, c) = tokio::join!(
        h.orchestrator.initialize(),
        h.orchestrator.initialize(),
        h.orchestrator.initialize(),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(h.embedding.calls(), 1);
    assert_eq!(h.builds(), 1);
}

#[tokio::test]
async fn test_failed_probe_leaves_orchestrator_unready() {
    let h = Harness::new().await;
    h.embedding.set_failing(true);

    let (a, b) = tokio::join!(h.orchestrator.initialize(), h.orchestrator.initialize());
    assert!(matches!(a, Err(Error::ProviderUnavailable(_))));
    assert!(matches!(b, Err(Error::ProviderUnavailable(_))));
    assert_eq!(h.builds(), 0);

    h.embedding.set_failing(false);
    assert!(h.orchestrator.initialize().await.is_ok());
    assert_eq!(h.builds(), 1);

    let calls = h.embedding.calls();
    h.orchestrator.initialize().await.unwrap();
    assert_eq!(h.embedding.calls(), calls);
}

#[tokio::test]
async fn test_dimension_drift_is_rejected() {
    let h = Harness::new().await;
    h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    let drifted = h.reopen(Arc::new(StubEmbedding::new(DIM / 2)));
    let result = drifted.initialize().await;
    match result {
        Err(error @ Error::DimensionMismatch { expected: DIM, .. }) => {
            assert!(error.is_provider_error());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("initialization should fail"),
    }

    let same = h.reopen(Arc::new(StubEmbedding::new(DIM)));
    assert!(same.initialize().await.is_ok());
}

#[tokio::test]
async fn test_ingest_fails_when_providers_are_down() {
    let h = Harness::new().await;
    h.embedding.set_failing(true);

    let result = h.orchestrator.ingest(report_files(), "total pages?").await;
    assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
    assert!(h.blobs.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_two_reports_are_summarized() {
    let h = Harness::new().await;

    let report = h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    assert_eq!(report.batches.len(), 1);
    assert!(report.is_complete_success());
    match &report.batches[0].outcome {
        BatchOutcome::Summarized { filenames, summary } => {
            assert_eq!(filenames, &vec!["a.txt".to_string(), "b.txt".to_string()]);
            assert_eq!(summary, "[stub-completion] total pages?");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let listed = h.orchestrator.list_documents().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|e| e.status == DocumentStatus::Indexed && e.chunk_count == 1));
    assert_eq!(h.blobs.list().await.unwrap(), vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_insert_failure_rolls_back_batch() {
    let h = Harness::new().await;
    h.orchestrator.initialize().await.unwrap();
    h.faults().fail_insert.store(true, Ordering::SeqCst);

    let report = h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    assert!(matches!(
        report.batches[0].outcome,
        BatchOutcome::NotIndexed {
            error: Error::IndexOperationFailed(_)
        }
    ));
    assert!(report.indexed_filenames().is_empty());
    assert!(h.orchestrator.list_documents().await.unwrap().is_empty());
    assert_eq!(h.documents.count().await.unwrap(), 0);
    assert!(h.blobs.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unconfirmed_rollback_keeps_failed_records() {
    let h = Harness::new().await;
    h.orchestrator.initialize().await.unwrap();
    h.faults().fail_insert.store(true, Ordering::SeqCst);
    h.faults().fail_delete.store(true, Ordering::SeqCst);

    h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    let records = h.documents.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == DocumentStatus::Failed));
    assert!(h.orchestrator.list_documents().await.unwrap().is_empty());

    let health = h.orchestrator.self_test().await;
    assert_eq!(health.stores.failed_count, 2);
    assert_eq!(health.stores.blob_count, 2);

    h.faults().fail_delete.store(false, Ordering::SeqCst);
    let outcome = h.orchestrator.delete_by_filename("a.txt").await.unwrap();
    assert!(!outcome.index_deleted);
    assert!(outcome.blob_removed);
    assert_eq!(h.documents.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_insert_timeout_rolls_back_batch() {
    let h = Harness::with_config(
        OrchestratorConfig {
            insert_timeout_secs: 1,
            ..OrchestratorConfig::default()
        },
        Duration::ZERO,
    )
    .await;
    h.orchestrator.initialize().await.unwrap();
    h.faults().insert_delay_ms.store(3_000, Ordering::SeqCst);

    let report = h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    assert!(matches!(
        report.batches[0].outcome,
        BatchOutcome::NotIndexed {
            error: Error::Timeout(_)
        }
    ));
    assert!(report.indexed_filenames().is_empty());
    assert_eq!(h.documents.count().await.unwrap(), 0);
    assert!(h.blobs.list().await.unwrap().is_empty());
    let engine = h.orchestrator.initialize().await.unwrap();
    assert_eq!(engine.document_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_summary_failure_keeps_documents_indexed() {
    let h = Harness::new().await;
    h.completion.set_failing(true);

    let report = h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    match &report.batches[0].outcome {
        BatchOutcome::IndexedWithoutSummary { filenames, error } => {
            assert_eq!(filenames.len(), 2);
            assert!(error.is_provider_error());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(h.listed_filenames().await, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_partial_batch_extraction_failure() {
    let h = Harness::new().await;
    let files = vec![
        text_file("a.txt", "Report A has 12 pages in total."),
        UploadFile::new("b.bin", vec![0x89, 0x50, 0x4e, 0x47, 0x00, 0x1a]),
        text_file("c.txt", "Report C covers the appendix."),
    ];

    let report = h.orchestrator.ingest(files, "total pages?").await.unwrap();

    let batch = &report.batches[0];
    assert_eq!(batch.outcome.indexed_filenames(), ["a.txt", "c.txt"]);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].filename, "b.bin");
    assert!(matches!(batch.failures[0].error, Error::ExtractionFailed { .. }));

    assert_eq!(h.listed_filenames().await, vec!["a.txt", "c.txt"]);
    assert_eq!(h.blobs.list().await.unwrap(), vec!["a.txt", "c.txt"]);
}

#[tokio::test]
async fn test_partial_batch_report_snapshot() {
    let h = Harness::new().await;
    let files = vec![
        text_file("a.txt", "Report A has 12 pages in total."),
        UploadFile::new("b.bin", vec![0x00, 0x01, 0x02]),
    ];

    let report = h.orchestrator.ingest(files, "total pages?").await.unwrap();

    assert_yaml_snapshot!(report, {
        ".batches[].batch_id" => "[batch_id]"
    }, @r#"
    batches:
      - batch_id: "[batch_id]"
        index: 0
        filenames:
          - a.txt
          - b.bin
        outcome:
          outcome: summarized
          filenames:
            - a.txt
          summary: "[stub-completion] total pages?"
        failures:
          - filename: b.bin
            error:
              kind: extraction_failed
              message: "extraction failed for 'b.bin': binary content"
    "#);
}

#[tokio::test]
async fn test_batch_with_only_invalid_files() {
    let h = Harness::new().await;
    let files = vec![
        text_file("../escape.txt", "content"),
        text_file("blank.txt", "   "),
    ];

    let report = h.orchestrator.ingest(files, "summary").await.unwrap();

    let batch = &report.batches[0];
    assert!(matches!(
        batch.outcome,
        BatchOutcome::NotIndexed {
            error: Error::InvalidInput(_)
        }
    ));
    assert!(matches!(batch.failures[0].error, Error::InvalidInput(_)));
    assert!(matches!(batch.failures[1].error, Error::ExtractionFailed { .. }));
    assert!(h.blobs.list().await.unwrap().is_empty());
    assert!(h.orchestrator.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_follows_ingestion_order() {
    let h = Harness::new().await;
    let names = ["zeta.txt", "alpha.txt", "mid.txt", "beta.txt", "omega.txt"];

    for (i, name) in names.iter().enumerate() {
        let content = format!("Document {i} is about subject{i}.");
        h.orchestrator.ingest(vec![text_file(name, &content)], "what is it about?").await.unwrap();
    }

    assert_eq!(h.listed_filenames().await, names);
}

#[tokio::test]
async fn test_more_files_than_batch_size() {
    let h = Harness::new().await;
    let files: Vec<UploadFile> = (0..23)
        .map(|i| text_file(&format!("doc{i:02}.txt"), &format!("Document {i} discusses topic{i}.")))
        .collect();

    let report = h.orchestrator.ingest(files, "topics?").await.unwrap();

    let sizes: Vec<usize> = report.batches.iter().map(|b| b.filenames.len()).collect();
    assert_eq!(sizes, vec![10, 10, 3]);
    assert_eq!(report.batches.iter().map(|b| b.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(report.batches[2].filenames, vec!["doc20.txt", "doc21.txt", "doc22.txt"]);
    assert!(report.is_complete_success());
    assert_eq!(report.indexed_filenames().len(), 23);
    assert_eq!(h.orchestrator.list_documents().await.unwrap().len(), 23);
}

#[tokio::test]
async fn test_one_failing_batch_does_not_cancel_others() {
    let h = Harness::with_config(
        OrchestratorConfig {
            batch_size: 2,
            ..OrchestratorConfig::default()
        },
        Duration::ZERO,
    )
    .await;
    let files = vec![
        text_file("a.txt", "alpha content"),
        text_file("b.txt", "beta content"),
        UploadFile::new("c.bin", vec![0x00]),
        UploadFile::new("d.bin", vec![0x00, 0x00]),
    ];

    let report = h.orchestrator.ingest(files, "content?").await.unwrap();

    assert_eq!(report.batches.len(), 2);
    assert!(matches!(report.batches[0].outcome, BatchOutcome::Summarized { .. }));
    assert!(matches!(report.batches[1].outcome, BatchOutcome::NotIndexed { .. }));
    assert_eq!(report.failures().count(), 2);
    assert_eq!(h.listed_filenames().await, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_duplicate_content_under_new_name_is_rejected() {
    let h = Harness::new().await;
    h.orchestrator.ingest(vec![text_file("a.txt", "shared text")], "q").await.unwrap();

    let report = h
        .orchestrator
        .ingest(
            vec![text_file("b.txt", "shared text"), text_file("c.txt", "shared text")],
            "q",
        )
        .await
        .unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 2);
    assert!(matches!(
        &failures[0].error,
        Error::DuplicateContent { existing, .. } if existing == "a.txt"
    ));
    assert_eq!(h.listed_filenames().await, vec!["a.txt"]);
    assert_eq!(h.blobs.list().await.unwrap(), vec!["a.txt"]);
}

#[tokio::test]
async fn test_same_name_reupload_replaces_document() {
    let h = Harness::new().await;
    h.orchestrator.ingest(vec![text_file("a.txt", "first version")], "q").await.unwrap();
    let old = h.orchestrator.list_documents().await.unwrap();

    let report = h
        .orchestrator
        .ingest(vec![text_file("a.txt", "second version with more words")], "q")
        .await
        .unwrap();
    assert!(report.is_complete_success());

    let new = h.orchestrator.list_documents().await.unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].filename, "a.txt");
    assert_ne!(new[0].id, old[0].id);

    let engine = h.orchestrator.initialize().await.unwrap();
    assert_eq!(engine.document_count().await.unwrap(), 1);
    assert_eq!(
        h.blobs.get("a.txt").await.unwrap().unwrap(),
        b"second version with more words".to_vec()
    );
}

#[tokio::test]
async fn test_same_name_across_batches_is_ingested_once() {
    let h = Harness::with_config(
        OrchestratorConfig {
            batch_size: 1,
            ..OrchestratorConfig::default()
        },
        Duration::ZERO,
    )
    .await;
    let files = vec![
        text_file("a.txt", "first version of the report"),
        text_file("a.txt", "second version of the report"),
    ];

    let report = h.orchestrator.ingest(files, "q").await.unwrap();

    assert_eq!(report.batches.len(), 2);
    assert_eq!(report.batches[0].outcome.indexed_filenames(), ["a.txt"]);
    assert!(matches!(report.batches[1].outcome, BatchOutcome::NotIndexed { .. }));
    assert!(matches!(report.batches[1].failures[0].error, Error::InvalidInput(_)));

    assert_eq!(h.listed_filenames().await, vec!["a.txt"]);
    assert_eq!(
        h.blobs.get("a.txt").await.unwrap().unwrap(),
        b"first version of the report".to_vec()
    );
    let engine = h.orchestrator.initialize().await.unwrap();
    assert_eq!(engine.document_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_ingest_of_same_name() {
    let h = Harness::new().await;
    h.orchestrator.initialize().await.unwrap();
    h.faults().insert_delay_ms.store(300, Ordering::SeqCst);

    let (first, second) = tokio::join!(
        h.orchestrator.ingest(vec![text_file("a.txt", "first version")], "q"),
        h.orchestrator.ingest(vec![text_file("a.txt", "second version")], "q"),
    );
    let reports = [first.unwrap(), second.unwrap()];

    let indexed = reports.iter().filter(|r| r.is_complete_success()).count();
    assert_eq!(indexed, 1);
    let rejected: Vec<_> = reports.iter().flat_map(|r| r.failures()).collect();
    assert_eq!(rejected.len(), 1);
    assert!(matches!(rejected[0].error, Error::InvalidInput(_)));

    let listed = h.orchestrator.list_documents().await.unwrap();
    assert_eq!(listed.len(), 1);
    let blob = h.blobs.get("a.txt").await.unwrap().unwrap();
    assert_eq!(compute_document_id(std::str::from_utf8(&blob).unwrap()), listed[0].id);
}

#[tokio::test]
async fn test_delete_while_ingesting_is_rejected() {
    let h = Harness::new().await;
    h.orchestrator.initialize().await.unwrap();
    h.faults().insert_delay_ms.store(300, Ordering::SeqCst);

    let (report, deleted) = tokio::join!(
        h.orchestrator.ingest(vec![text_file("a.txt", "Report A has 12 pages.")], "q"),
        async {
            while h.documents.find_by_filename("a.txt").await.unwrap().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            h.orchestrator.delete_by_filename("a.txt").await
        },
    );

    assert!(matches!(deleted, Err(Error::InvalidInput(_))));
    assert!(report.unwrap().is_complete_success());
    assert_eq!(h.listed_filenames().await, vec!["a.txt"]);
}

#[tokio::test]
async fn test_interrupted_pending_records_can_be_cleared() {
    let h = Harness::new().await;
    for name in ["a.txt", "b.txt"] {
        h.documents
            .upsert(DocumentRecord::pending(format!("doc-stale-{name}"), name, "left over"))
            .await
            .unwrap();
        h.blobs.put(name, b"left over").await.unwrap();
    }

    let outcome = h.orchestrator.delete_by_filename("a.txt").await.unwrap();
    assert!(!outcome.index_deleted);
    assert!(outcome.blob_removed);

    let report = h
        .orchestrator
        .ingest(vec![text_file("b.txt", "Report B has 30 pages.")], "q")
        .await
        .unwrap();
    assert!(report.is_complete_success());
    assert_eq!(h.listed_filenames().await, vec!["b.txt"]);
    assert_eq!(h.documents.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_empty_stores_list_nothing() {
    let h = Harness::new().await;
    assert!(h.orchestrator.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let h = Harness::new().await;

    let result = h.orchestrator.delete_by_filename("missing.txt").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(h.embedding.calls(), 0);
}

#[tokio::test]
async fn test_delete_removes_index_record_and_blob() {
    let h = Harness::new().await;
    h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    let outcome = h.orchestrator.delete_by_filename("a.txt").await.unwrap();
    assert_eq!(outcome.filename, "a.txt");
    assert!(outcome.index_deleted);
    assert!(outcome.blob_removed);

    assert_eq!(h.listed_filenames().await, vec!["b.txt"]);
    let engine = h.orchestrator.initialize().await.unwrap();
    assert_eq!(engine.document_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_index_delete_touches_nothing() {
    let h = Harness::new().await;
    h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();
    h.faults().fail_delete.store(true, Ordering::SeqCst);

    let result = h.orchestrator.delete_by_filename("a.txt").await;
    assert!(matches!(result, Err(Error::IndexOperationFailed(_))));

    assert_eq!(h.listed_filenames().await, vec!["a.txt", "b.txt"]);
    assert!(h.blobs.get("a.txt").await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_with_blob_already_gone() {
    let h = Harness::new().await;
    h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();
    h.blobs.remove("a.txt").await.unwrap();

    match h.orchestrator.list_documents().await {
        Err(Error::InconsistentState {
            orphan_blobs,
            missing_blobs,
        }) => {
            assert!(orphan_blobs.is_empty());
            assert_eq!(missing_blobs, vec!["a.txt"]);
        }
        other => panic!("expected inconsistent state, got {other:?}"),
    }

    let outcome = h.orchestrator.delete_by_filename("a.txt").await.unwrap();
    assert!(outcome.index_deleted);
    assert!(!outcome.blob_removed);
    assert_eq!(h.listed_filenames().await, vec!["b.txt"]);
}

#[tokio::test]
async fn test_orphan_blob_is_inconsistent_state() {
    let h = Harness::new().await;
    h.blobs.put("stray.txt", b"left behind").await.unwrap();

    let result = h.orchestrator.list_documents().await;
    assert!(matches!(
        result,
        Err(Error::InconsistentState { ref orphan_blobs, .. }) if orphan_blobs == &vec!["stray.txt".to_string()]
    ));
}

#[tokio::test]
async fn test_query_answers_from_index() {
    let h = Harness::new().await;
    h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    let answer = h
        .orchestrator
        .query("How many pages in total?", &QueryParam::default())
        .await
        .unwrap();
    assert_eq!(answer, "[stub-completion] How many pages in total?");
    assert!(h.completion.system_prompts().last().unwrap().contains("pages in total"));
}

#[tokio::test]
async fn test_self_test_healthy() {
    let h = Harness::new().await;
    h.orchestrator.ingest(report_files(), "total pages?").await.unwrap();

    let health = h.orchestrator.self_test().await;
    assert_eq!(health.status, HealthStatus::Ok);
    assert_eq!(health.llm, ProviderStatus::Ok);
    assert_eq!(health.embedding, ProviderStatus::Ok);
    assert_eq!(health.embedding_dimension, Some(DIM));
    assert_eq!(health.stores.indexed_count, 2);
    assert_eq!(health.documents.map(|d| d.len()), Some(2));
}

#[tokio::test]
async fn test_self_test_never_fails() {
    let h = Harness::new().await;
    h.embedding.set_failing(true);
    h.completion.set_failing(true);

    let health = h.orchestrator.self_test().await;
    assert_eq!(health.status, HealthStatus::LlmError);
    assert!(matches!(health.llm, ProviderStatus::Error(_)));
    assert!(matches!(health.embedding, ProviderStatus::Error(_)));
    assert!(matches!(health.index, ProviderStatus::Error(_)));
    assert_eq!(health.embedding_dimension, None);
    assert_eq!(health.documents, Some(vec![]));

    h.blobs.put("stray.txt", b"left behind").await.unwrap();
    let health = h.orchestrator.self_test().await;
    assert_eq!(health.status, HealthStatus::FileError);
    assert_eq!(health.stores.orphan_blobs, vec!["stray.txt"]);
    assert!(health.documents.is_none());
}

#[tokio::test]
async fn test_builder_requires_collaborators() {
    let result = Orchestrator::builder()
        .embedding(Arc::new(StubEmbedding::new(DIM)))
        .build();
    assert!(matches!(result, Err(Error::Configuration(_))));
}
