use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use vecsearch_common::{Result, VecSearchError};
use vecsearch_embed::EmbeddingProvider;

use crate::builder::build_index;
use crate::corpus::CorpusStore;
use crate::persistence;
use crate::similarity::normalized;
use crate::types::{IndexSnapshot, SearchResult};

type BuildOutcome = std::result::Result<Arc<IndexSnapshot>, Arc<VecSearchError>>;
type SharedBuild = Shared<BoxFuture<'static, BuildOutcome>>;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexState {
    Empty,
    Building,
    Ready,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexState::Empty => "Empty",
            IndexState::Building => "Building",
            IndexState::Ready => "Ready",
        };
        f.write_str(s)
    }
}

/// Snapshot of the manager for health reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub state: IndexState,
    /// Documents in the index currently serving queries
    pub documents: usize,
    pub embedding_dim: Option<usize>,
    pub embedding_model: String,
}

enum Slot {
    Empty,
    Building {
        id: u64,
        /// Index that keeps serving until the build lands
        previous: Option<Arc<IndexSnapshot>>,
        build: SharedBuild,
    },
    Ready(Arc<IndexSnapshot>),
}

enum Pending {
    Ready(Arc<IndexSnapshot>),
    Build(SharedBuild),
}

struct Inner {
    slot: RwLock<Slot>,
    provider: Arc<dyn EmbeddingProvider>,
    corpus: Arc<dyn CorpusStore>,
    snapshot_dir: PathBuf,
    next_build: AtomicU64,
    /// Id of the newest build written to disk; held across each save
    persisted: Mutex<u64>,
}

/// Owner of the single published index.
///
/// Searches read an `Arc` of an immutable snapshot. Builds run as spawned
/// tasks, concurrent build requests join the one in flight, and a result is
/// published with a single swap only when the build succeeds.
#[derive(Clone)]
pub struct IndexManager {
    inner: Arc<Inner>,
}

impl IndexManager {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        corpus: Arc<dyn CorpusStore>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: RwLock::new(Slot::Empty),
                provider,
                corpus,
                snapshot_dir: snapshot_dir.into(),
                next_build: AtomicU64::new(1),
                persisted: Mutex::new(0),
            }),
        }
    }

    pub fn model_name(&self) -> &str {
        self.inner.provider.model_name()
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.inner.snapshot_dir
    }

    /// Restore the last snapshot, if any. Never fails: a missing or unusable
    /// snapshot leaves the manager `Empty`.
    pub async fn startup(&self) -> IndexState {
        match self.load().await {
            Ok(snapshot) => info!("Index restored with {} documents", snapshot.len()),
            Err(VecSearchError::SnapshotMissing(msg)) => {
                info!("No index snapshot ({}), first search will build one", msg)
            }
            Err(e) => error!("Ignoring unusable index snapshot: {}", e),
        }
        self.status().await.state
    }

    /// Serving index, building one first if there is none
    pub async fn ensure_ready(&self) -> Result<Arc<IndexSnapshot>> {
        match self.begin(false).await {
            Pending::Ready(snapshot) => Ok(snapshot),
            Pending::Build(build) => build.await.map_err(|e| {
                VecSearchError::service_unavailable(format!("Index is not ready: {}", e))
            }),
        }
    }

    /// Build from the current corpus, joining a build already in flight
    pub async fn rebuild(&self) -> Result<Arc<IndexSnapshot>> {
        match self.begin(true).await {
            Pending::Ready(snapshot) => Ok(snapshot),
            Pending::Build(build) => build.await.map_err(|e| e.cloned()),
        }
    }

    /// Top-k records most similar to `query`
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(VecSearchError::validation("Query cannot be empty"));
        }
        if top_k == 0 {
            return Err(VecSearchError::validation("top_k must be at least 1"));
        }

        let snapshot = self.ensure_ready().await?;
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.inner.provider.embed(&[query.to_string()]).await?;
        let raw = match (vectors.pop(), vectors.is_empty()) {
            (Some(v), true) => v,
            _ => {
                return Err(VecSearchError::provider(
                    "Provider did not return exactly one query vector",
                ))
            }
        };
        if raw.len() != snapshot.dim() {
            return Err(VecSearchError::provider(format!(
                "Query dimension {} does not match index dimension {}",
                raw.len(),
                snapshot.dim()
            )));
        }
        let query_vector = normalized(&raw);

        let scan = snapshot.clone();
        let hits = tokio::task::spawn_blocking(move || scan.index.search(&query_vector, top_k))
            .await
            .map_err(|e| VecSearchError::internal(format!("Search task failed: {}", e)))??;

        debug!("Search returned {} hits (top_k {})", hits.len(), top_k);

        Ok(hits
            .into_iter()
            .map(|(position, score)| SearchResult {
                position,
                score,
                metadata: snapshot.metadata[position].clone(),
            })
            .collect())
    }

    /// Load the committed snapshot into the published slot.
    ///
    /// While a build is running the loaded index becomes the one served until
    /// that build lands.
    pub async fn load(&self) -> Result<Arc<IndexSnapshot>> {
        let dir = self.inner.snapshot_dir.clone();
        let snapshot = {
            let _saving = self.inner.persisted.lock().await;
            tokio::task::spawn_blocking(move || persistence::load(&dir))
                .await
                .map_err(|e| {
                    VecSearchError::internal(format!("Snapshot load task failed: {}", e))
                })??
        };

        if snapshot.embedding_model != self.model_name() {
            warn!(
                "Snapshot was built with model {}, provider is {}",
                snapshot.embedding_model,
                self.model_name()
            );
        }

        let snapshot = Arc::new(snapshot);
        let mut slot = self.inner.slot.write().await;
        match &mut *slot {
            Slot::Building { previous, .. } => *previous = Some(snapshot.clone()),
            other => *other = Slot::Ready(snapshot.clone()),
        }
        Ok(snapshot)
    }

    pub async fn status(&self) -> IndexStatus {
        let slot = self.inner.slot.read().await;
        let (state, serving) = match &*slot {
            Slot::Empty => (IndexState::Empty, None),
            Slot::Building { previous, .. } => (IndexState::Building, previous.as_ref()),
            Slot::Ready(snapshot) => (IndexState::Ready, Some(snapshot)),
        };
        IndexStatus {
            state,
            documents: serving.map_or(0, |s| s.len()),
            embedding_dim: serving.map(|s| s.dim()),
            embedding_model: self.model_name().to_string(),
        }
    }

    /// Decide under the write guard whether to serve, join, or start a build.
    /// `fresh` asks for a new build even when an index is ready.
    async fn begin(&self, fresh: bool) -> Pending {
        let mut slot = self.inner.slot.write().await;
        let previous = match &*slot {
            Slot::Ready(snapshot) if !fresh => return Pending::Ready(snapshot.clone()),
            Slot::Building {
                previous: Some(snapshot),
                ..
            } if !fresh => return Pending::Ready(snapshot.clone()),
            Slot::Building { build, .. } => return Pending::Build(build.clone()),
            Slot::Ready(snapshot) => Some(snapshot.clone()),
            Slot::Empty => None,
        };

        let id = self.inner.next_build.fetch_add(1, Ordering::Relaxed);
        let build = spawn_build(self.inner.clone(), id);
        *slot = Slot::Building {
            id,
            previous,
            build: build.clone(),
        };
        Pending::Build(build)
    }
}

/// Run build `id` on its own task so it finishes even if every waiter drops
fn spawn_build(inner: Arc<Inner>, id: u64) -> SharedBuild {
    info!("Index build {} started", id);
    let handle = tokio::spawn(async move {
        let work = {
            let inner = inner.clone();
            tokio::spawn(async move {
                let records = inner.corpus.fetch_all().await?;
                build_index(inner.provider.as_ref(), &records).await
            })
        };
        let outcome: BuildOutcome = match work.await {
            Ok(Ok(snapshot)) => Ok(Arc::new(snapshot)),
            Ok(Err(e)) => Err(Arc::new(e)),
            Err(e) => Err(Arc::new(VecSearchError::internal(format!(
                "Index build task failed: {}",
                e
            )))),
        };

        if inner.finish(id, &outcome).await {
            if let Ok(snapshot) = &outcome {
                inner.persist(id, snapshot.clone()).await;
            }
        }
        outcome
    });

    handle
        .map(|joined| match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(Arc::new(VecSearchError::internal(format!(
                "Index build task failed: {}",
                e
            )))),
        })
        .boxed()
        .shared()
}

impl Inner {
    /// Publish or roll back build `id`. Returns true when it was published.
    async fn finish(&self, id: u64, outcome: &BuildOutcome) -> bool {
        let mut slot = self.slot.write().await;
        let previous = match &*slot {
            Slot::Building {
                id: current,
                previous,
                ..
            } if *current == id => previous.clone(),
            _ => {
                warn!("Index build {} finished but is no longer current", id);
                return false;
            }
        };

        *slot = match outcome {
            Ok(snapshot) => {
                info!(
                    "Index build {} published: {} documents, dimension {}",
                    id,
                    snapshot.len(),
                    snapshot.dim()
                );
                Slot::Ready(snapshot.clone())
            }
            Err(e) => {
                warn!("Index build {} failed: {}", id, e);
                match previous {
                    Some(snapshot) => Slot::Ready(snapshot),
                    None => Slot::Empty,
                }
            }
        };
        outcome.is_ok()
    }

    /// Best-effort save of build `id`; failures are logged only. A build that
    /// finishes its save after a newer one does not overwrite it.
    async fn persist(&self, id: u64, snapshot: Arc<IndexSnapshot>) {
        let mut persisted = self.persisted.lock().await;
        if *persisted > id {
            debug!(
                "Skipping save of index build {}, build {} is already on disk",
                id, *persisted
            );
            return;
        }

        let dir = self.snapshot_dir.clone();
        match tokio::task::spawn_blocking(move || persistence::save(&snapshot, &dir)).await {
            Ok(Ok(bundle)) => {
                *persisted = id;
                debug!("Index build {} persisted to {}", id, bundle.display());
            }
            Ok(Err(e)) => warn!("Failed to persist index build {}: {}", id, e),
            Err(e) => warn!("Snapshot save task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::composite_text;
    use crate::builder::tests::sample_corpus;
    use crate::corpus::MemoryCorpusStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;
    use vecsearch_embed::HashingEmbedder;

    /// Hashing provider that counts calls, can be slowed down or switched off
    struct TestEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
        delay: Duration,
        down: AtomicBool,
    }

    impl TestEmbedder {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                inner: HashingEmbedder::new(32).unwrap(),
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(delay_ms),
                down: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TestEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.down.load(Ordering::SeqCst) {
                return Err(VecSearchError::provider("connection refused"));
            }
            self.inner.embed(texts).await
        }
    }

    fn manager(
        provider: Arc<TestEmbedder>,
        corpus: Arc<MemoryCorpusStore>,
        dir: &Path,
    ) -> IndexManager {
        IndexManager::new(provider, corpus, dir)
    }

    async fn wait_for(manager: &IndexManager, state: IndexState) {
        for _ in 0..200 {
            if manager.status().await.state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("manager never reached {}", state);
    }

    #[tokio::test]
    async fn test_startup_without_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(
            TestEmbedder::new(0),
            Arc::new(MemoryCorpusStore::new(sample_corpus())),
            dir.path(),
        );
        assert_eq!(m.startup().await, IndexState::Empty);
        let status = m.status().await;
        assert_eq!(status.documents, 0);
        assert_eq!(status.embedding_dim, None);
        assert_eq!(status.embedding_model, "hashing-32");
    }

    #[tokio::test]
    async fn test_first_search_builds_and_finds_exact_text() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = sample_corpus();
        let m = manager(
            TestEmbedder::new(0),
            Arc::new(MemoryCorpusStore::new(corpus.clone())),
            dir.path(),
        );

        let hits = m.search(&composite_text(&corpus[0]), 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.sector, "Fintech");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(m.status().await.state, IndexState::Ready);
    }

    #[tokio::test]
    async fn test_search_validation() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TestEmbedder::new(0);
        let m = manager(
            provider.clone(),
            Arc::new(MemoryCorpusStore::new(sample_corpus())),
            dir.path(),
        );
        assert!(matches!(m.search("  ", 5).await, Err(VecSearchError::Validation(_))));
        assert!(matches!(m.search("bank", 0).await, Err(VecSearchError::Validation(_))));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_corpus_keeps_serving_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryCorpusStore::new(sample_corpus()));
        let m = manager(TestEmbedder::new(0), store.clone(), dir.path());

        let first = m.rebuild().await.unwrap();
        store.replace(Vec::new());

        assert!(matches!(m.rebuild().await, Err(VecSearchError::EmptyCorpus)));
        let status = m.status().await;
        assert_eq!(status.state, IndexState::Ready);
        assert_eq!(status.documents, first.len());
        assert_eq!(m.search("bank", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_provider_down_is_unavailable_and_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TestEmbedder::new(0);
        provider.down.store(true, Ordering::SeqCst);
        let m = manager(
            provider.clone(),
            Arc::new(MemoryCorpusStore::new(sample_corpus())),
            dir.path(),
        );

        assert!(matches!(
            m.search("bank", 5).await,
            Err(VecSearchError::ServiceUnavailable(_))
        ));
        assert_eq!(m.status().await.state, IndexState::Empty);

        // next request retries the build
        assert!(m.ensure_ready().await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_builds_share_one_provider_call() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TestEmbedder::new(100);
        let m = manager(
            provider.clone(),
            Arc::new(MemoryCorpusStore::new(sample_corpus())),
            dir.path(),
        );

        let (a, b, c) = tokio::join!(m.rebuild(), m.rebuild(), m.ensure_ready());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(provider.calls(), 1);
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_ensure_ready_serves_previous_during_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TestEmbedder::new(150);
        let m = manager(
            provider.clone(),
            Arc::new(MemoryCorpusStore::new(sample_corpus())),
            dir.path(),
        );
        let first = m.rebuild().await.unwrap();

        let background = m.clone();
        let rebuild = tokio::spawn(async move { background.rebuild().await });
        wait_for(&m, IndexState::Building).await;

        let served = m.ensure_ready().await.unwrap();
        assert!(Arc::ptr_eq(&served, &first));
        assert_eq!(m.status().await.documents, first.len());

        let second = rebuild.await.unwrap().unwrap();
        assert!(!Arc::ptr_eq(&second, &first));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_build_survives_abandoned_waiter() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(
            TestEmbedder::new(100),
            Arc::new(MemoryCorpusStore::new(sample_corpus())),
            dir.path(),
        );

        let waited = tokio::time::timeout(Duration::from_millis(10), m.rebuild()).await;
        assert!(waited.is_err());

        wait_for(&m, IndexState::Ready).await;
        assert_eq!(m.status().await.documents, 3);
    }

    #[tokio::test]
    async fn test_build_is_persisted_and_restored() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryCorpusStore::new(sample_corpus()));
        let built = manager(TestEmbedder::new(0), store.clone(), dir.path())
            .rebuild()
            .await
            .unwrap();

        let provider = TestEmbedder::new(0);
        let restored = manager(provider.clone(), store, dir.path());
        assert_eq!(restored.startup().await, IndexState::Ready);
        assert_eq!(restored.status().await.documents, built.len());

        let hits = restored.search("Online courses", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        // only the query embedding, no rebuild
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_back_to_back_rebuilds_stay_restorable() {
        let store = Arc::new(MemoryCorpusStore::new(sample_corpus()));
        for _ in 0..10 {
            let dir = tempfile::tempdir().unwrap();
            let m = manager(TestEmbedder::new(0), store.clone(), dir.path());

            // second build starts as soon as the first is published,
            // while its save may still be running
            let first = tokio::spawn({
                let m = m.clone();
                async move { m.rebuild().await }
            });
            wait_for(&m, IndexState::Ready).await;
            let second = m.rebuild().await.unwrap();
            first.await.unwrap().unwrap();

            let restored = manager(TestEmbedder::new(0), store.clone(), dir.path());
            assert_eq!(restored.startup().await, IndexState::Ready);
            let on_disk = restored.load().await.unwrap();
            assert_eq!(on_disk.created_at, second.created_at);

            let bundles = std::fs::read_dir(dir.path().join(persistence::SNAPSHOTS_DIR))
                .unwrap()
                .count();
            assert_eq!(bundles, 1);
        }
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryCorpusStore::new(sample_corpus()));
        manager(TestEmbedder::new(0), store.clone(), dir.path())
            .rebuild()
            .await
            .unwrap();

        let name = std::fs::read_to_string(dir.path().join(persistence::CURRENT_FILE)).unwrap();
        let bundle = dir.path().join(persistence::SNAPSHOTS_DIR).join(name.trim());
        std::fs::write(bundle.join(persistence::VECTORS_FILE), b"garbage").unwrap();

        let m = manager(TestEmbedder::new(0), store, dir.path());
        assert_eq!(m.startup().await, IndexState::Empty);
        assert!(matches!(m.load().await, Err(VecSearchError::CorruptSnapshot(_))));
    }

    #[tokio::test]
    async fn test_load_without_snapshot_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(
            TestEmbedder::new(0),
            Arc::new(MemoryCorpusStore::new(sample_corpus())),
            dir.path(),
        );
        assert!(matches!(m.load().await, Err(VecSearchError::SnapshotMissing(_))));
        assert_eq!(m.status().await.state, IndexState::Empty);
    }
}
