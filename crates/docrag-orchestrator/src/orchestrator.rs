//! The retrieval orchestrator

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use docrag_core::{
    BlobStore, CompletionGateway, DocumentEntry, DocumentRecord, DocumentStatus, DocumentStore,
    EmbeddingGateway, Error, IndexEngine, IndexEngineFactory, QueryMode, QueryParam, Result,
    TextExtractor, UploadFile,
};
use docrag_index::{IndexConfig, LocalIndexFactory};
use docrag_store::{FsBlobStore, JsonDocumentStore};

use crate::claims::{NameClaim, NameClaims};
use crate::config::OrchestratorConfig;
use crate::extract::PlainTextExtractor;
use crate::init::InitGuard;
use crate::report::{
    BatchOutcome, BatchReport, DeleteOutcome, FileFailure, HealthReport, IngestReport,
    ProviderStatus, StoreAgreement,
};

pub const LLM_PROBE_PROMPT: &str = "Hello. What version are you?";
pub const EMBEDDING_PROBE_TEXT: &str = "Hello. Who are you?";

/// A file that passed validation and extraction and has a pending record.
///
/// Holds the claim on its filename until the batch is done with it.
struct PreparedFile<'a> {
    filename: String,
    id: String,
    text: String,
    _claim: NameClaim<'a>,
}

fn being_ingested(filename: &str) -> Error {
    Error::InvalidInput(format!("'{filename}' is being ingested"))
}

/// Keeps the Blob Store, the Document Store and the index consistent while
/// files are ingested, listed, deleted and queried.
///
/// Build one per process with [`OrchestratorBuilder`] and share it in an `Arc`.
pub struct Orchestrator {
    config: OrchestratorConfig,
    embedding: Arc<dyn EmbeddingGateway>,
    completion: Arc<dyn CompletionGateway>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    extractor: Arc<dyn TextExtractor>,
    factory: Arc<dyn IndexEngineFactory>,
    init: InitGuard,
    claims: NameClaims,
    batch_limit: Semaphore,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Probe the embedding dimension and build the index engine.
    ///
    /// Safe to call before every operation: once an engine exists it is
    /// returned without probing again.
    pub async fn initialize(&self) -> Result<Arc<dyn IndexEngine>> {
        let embedding = Arc::clone(&self.embedding);
        let completion = Arc::clone(&self.completion);
        let factory = Arc::clone(&self.factory);

        self.init
            .get_or_init(move || {
                async move {
                    let dimension = embedding.probe_dimension().await.map_err(|e| match e {
                        e if e.is_provider_error() => e,
                        other => Error::ProviderUnavailable(other.to_string()),
                    })?;
                    info!(dimension, model = embedding.model_name(), "probed embedding dimension");

                    let engine = factory.build(dimension, embedding, completion).await?;
                    info!(dimension = engine.dimension(), "index engine constructed");
                    Ok(engine)
                }
                .boxed()
            })
            .await
            .inspect_err(|e| error!(error = %e, "initialization failed"))
    }

    /// Ingest `files` in batches, summarizing each indexed batch with `summary_query`.
    ///
    /// Only an initialization failure is returned as `Err`; every other
    /// problem is reported per batch and per file.
    pub async fn ingest(&self, files: Vec<UploadFile>, summary_query: &str) -> Result<IngestReport> {
        let engine = self.initialize().await?;
        let batch_size = self.config.batch_size.max(1);
        info!(files = files.len(), batch_size, "ingest started");

        let mut seen = HashSet::new();
        let repeated: Vec<bool> = files.iter().map(|f| !seen.insert(f.filename.as_str())).collect();

        let batches = files
            .chunks(batch_size)
            .zip(repeated.chunks(batch_size))
            .enumerate()
            .map(|(index, (batch, repeated))| {
                let engine = Arc::clone(&engine);
                async move {
                    let _permit = match self.batch_limit.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return BatchReport {
                                batch_id: Uuid::new_v4(),
                                index,
                                filenames: batch.iter().map(|f| f.filename.clone()).collect(),
                                outcome: BatchOutcome::NotIndexed {
                                    error: Error::IndexOperationFailed(format!("semaphore error: {e}")),
                                },
                                failures: Vec::new(),
                            };
                        }
                    };
                    self.ingest_batch(engine.as_ref(), index, batch, repeated, summary_query).await
                }
            });

        let report = IngestReport {
            batches: join_all(batches).await,
        };
        info!(
            batches = report.batches.len(),
            indexed = report.indexed_filenames().len(),
            failed = report.failures().count(),
            "ingest finished"
        );
        Ok(report)
    }

    async fn ingest_batch(
        &self,
        engine: &dyn IndexEngine,
        index: usize,
        files: &[UploadFile],
        repeated: &[bool],
        summary_query: &str,
    ) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let filenames: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
        info!(%batch_id, index, files = files.len(), "batch started");

        let mut failures = Vec::new();
        let mut prepared: Vec<PreparedFile<'_>> = Vec::new();
        for (file, &repeated) in files.iter().zip(repeated) {
            let result = if repeated {
                Err(Error::InvalidInput(format!(
                    "'{}' appears more than once in the upload",
                    file.filename
                )))
            } else {
                self.prepare_file(engine, file, &prepared).await
            };
            match result {
                Ok(p) => prepared.push(p),
                Err(error) => {
                    warn!(%batch_id, filename = %file.filename, kind = error.kind(), %error, "file rejected");
                    failures.push(FileFailure {
                        filename: file.filename.clone(),
                        error,
                    });
                }
            }
        }

        let outcome = if prepared.is_empty() {
            BatchOutcome::NotIndexed {
                error: Error::InvalidInput("no valid files in batch".to_string()),
            }
        } else {
            self.index_prepared(engine, batch_id, &prepared, summary_query, &mut failures)
                .await
        };

        info!(
            %batch_id,
            indexed = outcome.indexed_filenames().len(),
            failed = failures.len(),
            "batch finished"
        );
        BatchReport {
            batch_id,
            index,
            filenames,
            outcome,
            failures,
        }
    }

    async fn index_prepared(
        &self,
        engine: &dyn IndexEngine,
        batch_id: Uuid,
        prepared: &[PreparedFile<'_>],
        summary_query: &str,
        failures: &mut Vec<FileFailure>,
    ) -> BatchOutcome {
        let texts: Vec<String> = prepared.iter().map(|p| p.text.clone()).collect();
        let timeout = self.config.insert_timeout();

        let inserted = match tokio::time::timeout(timeout, engine.insert(&texts)).await {
            Ok(Ok(inserted)) if inserted.len() == prepared.len() => inserted,
            Ok(Ok(inserted)) => {
                let error = Error::IndexOperationFailed(format!(
                    "index returned {} results for {} documents",
                    inserted.len(),
                    prepared.len()
                ));
                return self.roll_back(engine, batch_id, prepared, error).await;
            }
            Ok(Err(error)) => return self.roll_back(engine, batch_id, prepared, error).await,
            Err(_) => {
                let error = Error::Timeout(format!(
                    "index insert exceeded {}s",
                    self.config.insert_timeout_secs
                ));
                return self.roll_back(engine, batch_id, prepared, error).await;
            }
        };

        let mut filenames = Vec::with_capacity(prepared.len());
        for (file, doc) in prepared.iter().zip(inserted) {
            match self
                .documents
                .set_status(&file.id, DocumentStatus::Indexed, doc.chunk_count)
                .await
            {
                Ok(()) => filenames.push(file.filename.clone()),
                Err(error) => {
                    warn!(%batch_id, filename = %file.filename, %error, "could not mark document indexed");
                    self.roll_back_file(engine, file).await;
                    failures.push(FileFailure {
                        filename: file.filename.clone(),
                        error,
                    });
                }
            }
        }
        if filenames.is_empty() {
            return BatchOutcome::NotIndexed {
                error: Error::IndexOperationFailed("no document could be recorded as indexed".to_string()),
            };
        }

        let param = QueryParam::new(QueryMode::Hybrid, self.config.summary_top_k);
        match engine.query(summary_query, &param).await {
            Ok(summary) => BatchOutcome::Summarized { filenames, summary },
            Err(error) => {
                warn!(%batch_id, %error, "summary query failed");
                BatchOutcome::IndexedWithoutSummary { filenames, error }
            }
        }
    }

    /// Claim, store and extract one file, then record it as pending.
    ///
    /// A record still `pending` while its filename is unclaimed was left by
    /// an interrupted ingest and is replaced like any other.
    async fn prepare_file(
        &self,
        engine: &dyn IndexEngine,
        file: &UploadFile,
        prepared: &[PreparedFile<'_>],
    ) -> Result<PreparedFile<'_>> {
        FsBlobStore::validate_filename(&file.filename)?;
        let claim = self
            .claims
            .try_claim(&file.filename)
            .ok_or_else(|| being_ingested(&file.filename))?;

        if let Some(old) = self.documents.find_by_filename(&file.filename).await? {
            info!(filename = %file.filename, id = %old.id, status = %old.status, "replacing previous upload");
            self.delete_record(engine, &old).await?;
        }

        self.blobs.put(&file.filename, &file.bytes).await?;
        match self.register(engine, file, prepared).await {
            Ok((id, text)) => Ok(PreparedFile {
                filename: file.filename.clone(),
                id,
                text,
                _claim: claim,
            }),
            Err(e) => {
                if let Err(cleanup) = self.blobs.remove(&file.filename).await {
                    warn!(filename = %file.filename, error = %cleanup, "could not remove rejected blob");
                }
                Err(e)
            }
        }
    }

    async fn register(
        &self,
        engine: &dyn IndexEngine,
        file: &UploadFile,
        prepared: &[PreparedFile<'_>],
    ) -> Result<(String, String)> {
        let bytes = self
            .blobs
            .get(&file.filename)
            .await?
            .ok_or_else(|| Error::Storage(format!("blob '{}' missing after write", file.filename)))?;

        let text = self
            .extractor
            .extract(&file.filename, &bytes)
            .await
            .map_err(|e| match e {
                e @ Error::ExtractionFailed { .. } => e,
                other => Error::ExtractionFailed {
                    filename: file.filename.clone(),
                    reason: other.to_string(),
                },
            })?;

        let id = engine.document_id(&text);
        if let Some(other) = prepared.iter().find(|p| p.id == id) {
            return Err(Error::DuplicateContent {
                filename: file.filename.clone(),
                existing: other.filename.clone(),
            });
        }
        if let Some(existing) = self.documents.get(&id).await? {
            return Err(Error::DuplicateContent {
                filename: file.filename.clone(),
                existing: existing.filename,
            });
        }

        let record = self
            .documents
            .upsert(DocumentRecord::pending(&id, &file.filename, &text))
            .await?;
        debug!(filename = %file.filename, id = %record.id, seq = record.seq, "recorded pending document");

        Ok((id, text))
    }

    async fn roll_back(
        &self,
        engine: &dyn IndexEngine,
        batch_id: Uuid,
        prepared: &[PreparedFile<'_>],
        error: Error,
    ) -> BatchOutcome {
        warn!(%batch_id, files = prepared.len(), %error, "index insert failed, rolling back");
        for file in prepared {
            self.roll_back_file(engine, file).await;
        }
        BatchOutcome::NotIndexed { error }
    }

    /// Undo one pending document.
    ///
    /// When the index delete cannot be confirmed the record is kept as
    /// `failed` together with its blob, so it can still be deleted later.
    async fn roll_back_file(&self, engine: &dyn IndexEngine, file: &PreparedFile<'_>) {
        match engine.delete_by_id(&file.id).await {
            Ok(_) => {
                if let Err(e) = self.documents.remove(&file.id).await {
                    warn!(filename = %file.filename, error = %e, "could not remove pending record");
                }
                if let Err(e) = self.blobs.remove(&file.filename).await {
                    warn!(filename = %file.filename, error = %e, "could not remove blob");
                }
            }
            Err(e) => {
                error!(filename = %file.filename, id = %file.id, error = %e, "rollback not confirmed");
                if let Err(e) = self.documents.set_status(&file.id, DocumentStatus::Failed, 0).await {
                    warn!(filename = %file.filename, error = %e, "could not mark record failed");
                }
            }
        }
    }

    /// Indexed documents in insertion order.
    ///
    /// Fails with `InconsistentState` when the record filenames and the blob
    /// filenames differ.
    pub async fn list_documents(&self) -> Result<Vec<DocumentEntry>> {
        let records = self.documents.list().await?;
        let agreement = self.store_agreement(&records).await?;
        if !agreement.is_consistent() {
            return Err(Error::InconsistentState {
                orphan_blobs: agreement.orphan_blobs,
                missing_blobs: agreement.missing_blobs,
            });
        }
        Ok(indexed_entries(&records))
    }

    /// Delete the document uploaded as `filename` from the index, then its
    /// record, then its blob.
    ///
    /// Fails with `InvalidInput` while the file is being ingested.
    pub async fn delete_by_filename(&self, filename: &str) -> Result<DeleteOutcome> {
        let _claim = self
            .claims
            .try_claim(filename)
            .ok_or_else(|| being_ingested(filename))?;
        let record = self
            .documents
            .find_by_filename(filename)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no document named '{filename}'")))?;
        let engine = self.initialize().await?;
        self.delete_record(engine.as_ref(), &record).await
    }

    async fn delete_record(&self, engine: &dyn IndexEngine, record: &DocumentRecord) -> Result<DeleteOutcome> {
        let index_deleted = engine.delete_by_id(&record.id).await.map_err(|e| match e {
            e @ Error::IndexOperationFailed(_) => e,
            other => Error::IndexOperationFailed(format!("deleting {}: {other}", record.id)),
        })?;
        self.documents.remove(&record.id).await?;
        let blob_removed = self.blobs.remove(&record.filename).await?;

        info!(
            filename = %record.filename,
            id = %record.id,
            index_deleted,
            blob_removed,
            "deleted document"
        );
        Ok(DeleteOutcome {
            id: record.id.clone(),
            filename: record.filename.clone(),
            index_deleted,
            blob_removed,
        })
    }

    pub async fn query(&self, text: &str, param: &QueryParam) -> Result<String> {
        let engine = self.initialize().await?;
        debug!(mode = %param.mode, top_k = param.top_k, "query");
        engine.query(text, param).await
    }

    /// Exercise both providers and compare the stores. Never fails.
    pub async fn self_test(&self) -> HealthReport {
        let probe_texts = [EMBEDDING_PROBE_TEXT.to_string()];
        let (llm, embedding) = tokio::join!(
            self.completion.complete(LLM_PROBE_PROMPT, None, &[]),
            self.embedding.embed(&probe_texts),
        );

        let llm = match llm {
            Ok(answer) if !answer.trim().is_empty() => ProviderStatus::Ok,
            Ok(_) => ProviderStatus::Error("empty completion response".to_string()),
            Err(e) => ProviderStatus::Error(e.to_string()),
        };
        let embedding = match embedding {
            Ok(vectors) if vectors.first().is_some_and(|v| !v.is_empty()) => ProviderStatus::Ok,
            Ok(_) => ProviderStatus::Error("empty embedding response".to_string()),
            Err(e) => ProviderStatus::Error(e.to_string()),
        };
        let (index, embedding_dimension) = match self.initialize().await {
            Ok(engine) => (ProviderStatus::Ok, Some(engine.dimension())),
            Err(e) => (ProviderStatus::Error(e.to_string()), None),
        };

        let (stores, documents) = match self.documents.list().await {
            Ok(records) => match self.store_agreement(&records).await {
                Ok(stores) if stores.is_consistent() => {
                    let documents = indexed_entries(&records);
                    (stores, Some(documents))
                }
                Ok(stores) => (stores, None),
                Err(e) => (StoreAgreement::unavailable(&e), None),
            },
            Err(e) => (StoreAgreement::unavailable(&e), None),
        };

        let status = HealthReport::overall(&llm, &embedding, &index, &stores);
        info!(?status, ?llm, ?embedding, ?index, "self test finished");

        HealthReport {
            status,
            checked_at: Utc::now(),
            llm,
            embedding,
            index,
            embedding_dimension,
            stores,
            documents,
        }
    }

    async fn store_agreement(&self, records: &[DocumentRecord]) -> Result<StoreAgreement> {
        let blobs: BTreeSet<String> = self.blobs.list().await?.into_iter().collect();
        let referenced: BTreeSet<String> = records.iter().map(|r| r.filename.clone()).collect();

        let count = |status| records.iter().filter(|r| r.status == status).count();
        Ok(StoreAgreement {
            blob_count: blobs.len(),
            indexed_count: count(DocumentStatus::Indexed),
            pending_count: count(DocumentStatus::Pending),
            failed_count: count(DocumentStatus::Failed),
            orphan_blobs: blobs.difference(&referenced).cloned().collect(),
            missing_blobs: referenced.difference(&blobs).cloned().collect(),
            error: None,
        })
    }
}

fn indexed_entries(records: &[DocumentRecord]) -> Vec<DocumentEntry> {
    records
        .iter()
        .filter(|r| r.status == DocumentStatus::Indexed)
        .map(DocumentRecord::entry)
        .collect()
}

/// Assembles an [`Orchestrator`] from its collaborators.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    embedding: Option<Arc<dyn EmbeddingGateway>>,
    completion: Option<Arc<dyn CompletionGateway>>,
    documents: Option<Arc<dyn DocumentStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    factory: Option<Arc<dyn IndexEngineFactory>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn embedding(mut self, embedding: Arc<dyn EmbeddingGateway>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn completion(mut self, completion: Arc<dyn CompletionGateway>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn document_store(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Defaults to [`PlainTextExtractor`].
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn index_factory(mut self, factory: Arc<dyn IndexEngineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use the on-disk stores and the local index.
    ///
    /// Records and index data live in `index.working_dir`, blobs in `storage_dir`.
    pub async fn local_storage(self, index: IndexConfig, storage_dir: impl AsRef<Path>) -> Result<Self> {
        let documents = JsonDocumentStore::open(&index.working_dir).await?;
        let blobs = FsBlobStore::open(storage_dir.as_ref()).await?;
        Ok(self
            .document_store(Arc::new(documents))
            .blob_store(Arc::new(blobs))
            .index_factory(Arc::new(LocalIndexFactory::new(index))))
    }

    pub fn build(self) -> Result<Orchestrator> {
        let missing = |what: &str| Error::Configuration(format!("orchestrator needs {what}"));
        let permits = self.config.max_concurrent_batches.max(1);

        Ok(Orchestrator {
            embedding: self.embedding.ok_or_else(|| missing("an embedding gateway"))?,
            completion: self.completion.ok_or_else(|| missing("a completion gateway"))?,
            documents: self.documents.ok_or_else(|| missing("a document store"))?,
            blobs: self.blobs.ok_or_else(|| missing("a blob store"))?,
            extractor: self.extractor
                .unwrap_or_else(|| Arc::new(PlainTextExtractor) as Arc<dyn TextExtractor>),
            factory: self.factory.ok_or_else(|| missing("an index engine factory"))?,
            init: InitGuard::new(),
            claims: NameClaims::default(),
            batch_limit: Semaphore::new(permits),
            config: self.config,
        })
    }
}
