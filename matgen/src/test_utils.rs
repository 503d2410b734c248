//! Test utilities: in-memory collaborators and a fully wired router over a temporary upload folder.

use crate::db::errors::Result as DbResult;
use crate::db::handlers::{ProjectStore, ProjectTransaction};
use crate::db::models::projects::ProjectDBResponse;
use crate::generation::{GenerationOrchestrator, GenerationSettings, MaterialPersister};
use crate::storage::LocalMaterialStorage;
use crate::synthesis::{ImageSynthesizer, SynthesisRequest, SynthesizedImage};
use crate::{AppState, build_router};
use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Uploads and workspaces as sibling directories under `root`.
pub fn create_test_config(root: &Path) -> crate::config::Config {
    let mut config = crate::config::Config {
        upload_folder: root.join("uploads"),
        workspace_folder: root.join("workspaces"),
        max_upload_size: 10 * 1024 * 1024,
        ..Default::default()
    };
    config.ai.api_key = "test-key".to_string();
    config
}

// ============================================================================
// Synthesizers
// ============================================================================

/// One observed synthesis call. File contents are read while the call is in flight, since the
/// workspace is gone by the time a test inspects it.
#[derive(Debug, Clone)]
pub struct SynthesisCall {
    pub request: SynthesisRequest,
    pub reference_contents: Option<Vec<u8>>,
    pub additional_contents: Vec<Vec<u8>>,
}

/// Records every call and answers with a fixed image, or with no image at all.
pub struct FakeSynthesizer {
    image: Option<Bytes>,
    calls: Mutex<Vec<SynthesisCall>>,
}

impl FakeSynthesizer {
    pub fn returning(data: &'static [u8]) -> Self {
        Self {
            image: Some(Bytes::from_static(data)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            image: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SynthesisCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSynthesizer for FakeSynthesizer {
    async fn generate_image(&self, request: SynthesisRequest) -> anyhow::Result<Option<SynthesizedImage>> {
        let reference_contents = match &request.reference_image {
            Some(path) => Some(tokio::fs::read(path).await?),
            None => None,
        };

        let mut additional_contents = Vec::new();
        for path in request.additional_reference_images.iter().flatten() {
            additional_contents.push(tokio::fs::read(path).await?);
        }

        self.calls.lock().unwrap().push(SynthesisCall {
            request,
            reference_contents,
            additional_contents,
        });

        Ok(self.image.clone().map(|data| SynthesizedImage {
            data,
            mime_type: "image/png".to_string(),
        }))
    }
}

/// Always fails with the given message.
pub struct FailingSynthesizer {
    message: String,
}

impl FailingSynthesizer {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ImageSynthesizer for FailingSynthesizer {
    async fn generate_image(&self, _request: SynthesisRequest) -> anyhow::Result<Option<SynthesizedImage>> {
        anyhow::bail!("{}", self.message)
    }
}

struct CountingSynthesizer {
    inner: Arc<dyn ImageSynthesizer>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ImageSynthesizer for CountingSynthesizer {
    async fn generate_image(&self, request: SynthesisRequest) -> anyhow::Result<Option<SynthesizedImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_image(request).await
    }
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Default)]
struct ProjectsInner {
    projects: HashMap<String, ProjectDBResponse>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Project store backed by a map, counting how transactions end.
#[derive(Clone, Default)]
pub struct InMemoryProjectStore {
    inner: Arc<ProjectsInner>,
}

impl InMemoryProjectStore {
    pub fn with_projects(ids: &[&str]) -> Self {
        let now = chrono::Utc::now();
        let projects = ids
            .iter()
            .map(|id| {
                let project = ProjectDBResponse {
                    id: id.to_string(),
                    name: format!("Project {id}"),
                    created_at: now,
                    updated_at: now,
                };
                (id.to_string(), project)
            })
            .collect();

        Self {
            inner: Arc::new(ProjectsInner {
                projects,
                ..Default::default()
            }),
        }
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn begin(&self) -> DbResult<Box<dyn ProjectTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            inner: self.inner.clone(),
        }))
    }
}

struct InMemoryTransaction {
    inner: Arc<ProjectsInner>,
}

#[async_trait]
impl ProjectTransaction for InMemoryTransaction {
    async fn find_project(&mut self, id: &str) -> DbResult<Option<ProjectDBResponse>> {
        Ok(self.inner.projects.get(id).cloned())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Application
// ============================================================================

/// The full router over in-memory projects, local storage in a temporary directory, and the given
/// synthesizer.
pub struct TestApp {
    pub server: TestServer,
    pub projects: InMemoryProjectStore,
    synthesizer_calls: Arc<AtomicUsize>,
    upload_root: PathBuf,
    workspace_root: PathBuf,
    _root: TempDir,
}

impl TestApp {
    pub fn with_project<S>(project_id: &str, synthesizer: Arc<S>) -> Self
    where
        S: ImageSynthesizer + 'static,
    {
        let root = tempfile::tempdir().expect("Failed to create upload folder");
        let config = create_test_config(root.path());

        let synthesizer_calls = Arc::new(AtomicUsize::new(0));
        let counting = Arc::new(CountingSynthesizer {
            inner: synthesizer,
            calls: synthesizer_calls.clone(),
        });

        let projects = InMemoryProjectStore::with_projects(&[project_id]);
        let storage = Arc::new(LocalMaterialStorage::new(config.upload_folder.clone(), None));

        let state = AppState::builder()
            .config(config.clone())
            .projects(Arc::new(projects.clone()))
            .generator(Arc::new(GenerationOrchestrator::new(counting, GenerationSettings::from_config(&config))))
            .persister(MaterialPersister::new(storage))
            .build();

        let server = TestServer::new(build_router(state)).unwrap();

        Self {
            server,
            projects,
            synthesizer_calls,
            upload_root: config.upload_folder,
            workspace_root: config.workspace_folder,
            _root: root,
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root.clone()
    }

    /// Workspaces still present on disk
    pub fn live_workspaces(&self) -> usize {
        std::fs::read_dir(self.workspace_root()).map(|entries| entries.count()).unwrap_or(0)
    }

    pub fn synthesizer_calls(&self) -> usize {
        self.synthesizer_calls.load(Ordering::SeqCst)
    }
}
