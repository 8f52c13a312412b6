//! Conversion pipeline orchestration
//!
//! One pipeline instance owns at most one loaded mesh and a single
//! background worker thread that runs every decode and encode. Within an
//! instance operations are serialized: the worker consumes jobs one at a
//! time, and an operation issued while another is in flight is rejected
//! up front with `OperationInProgress`.
//!
//! The output artifact is a single slot: `convertedModel.<ext>` inside
//! the configured output directory, replaced delete-then-write on every
//! conversion. Last write wins; that is the contract, not an accident.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use meshport_core::{CancelToken, CanonicalMesh, Error, Result, TargetFormat};
use meshport_parsers::{LoadedAsset, MeshDecoder, TextureRef, GLOBAL_REGISTRY};

use crate::buffers::ExportBufferPool;
use crate::state::{MeshSummary, PipelineEvent, PipelineState};
use crate::task::PipelineTask;

/// Fixed stem of the single-slot output artifact
pub const OUTPUT_STEM: &str = "convertedModel";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory the output artifact is written into
    pub output_dir: PathBuf,
    /// Size of the export staging buffer pool
    pub export_buffers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let output_dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("meshport");
        Self {
            output_dir,
            export_buffers: 4,
        }
    }
}

/// Mutable state shared between the API surface and the worker
struct Inner {
    state: PipelineState,
    mesh: Option<Arc<CanonicalMesh>>,
    textures: Vec<TextureRef>,
    cancel: CancelToken,
}

/// Unit of work consumed by the worker thread
enum Job {
    Load {
        source: PathBuf,
        cancel: CancelToken,
        reply: Sender<Result<MeshSummary>>,
    },
    Convert {
        target: TargetFormat,
        mesh: Arc<CanonicalMesh>,
        cancel: CancelToken,
        reply: Sender<Result<PathBuf>>,
    },
    Shutdown,
}

/// Stateful orchestrator of the load → convert flow
pub struct ConversionPipeline {
    inner: Arc<Mutex<Inner>>,
    jobs: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    events_tx: Sender<PipelineEvent>,
    events_rx: Mutex<Option<Receiver<PipelineEvent>>>,
    output_dir: PathBuf,
}

impl ConversionPipeline {
    /// Create a pipeline with default configuration
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a pipeline with explicit configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            state: PipelineState::Idle,
            mesh: None,
            textures: Vec::new(),
            cancel: CancelToken::new(),
        }));
        let (jobs_tx, jobs_rx) = std::sync::mpsc::channel();
        let (events_tx, events_rx) = std::sync::mpsc::channel();

        let worker = {
            let inner = Arc::clone(&inner);
            let events = events_tx.clone();
            let buffers = ExportBufferPool::new(config.export_buffers);
            let output_dir = config.output_dir.clone();
            std::thread::spawn(move || run_worker(jobs_rx, inner, events, buffers, output_dir))
        };

        Self {
            inner,
            jobs: jobs_tx,
            worker: Mutex::new(Some(worker)),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            output_dir: config.output_dir,
        }
    }

    /// Load a mesh from `source`, replacing any previously loaded mesh
    ///
    /// Transitions `Idle`/`Ready`/`Error` into `Loading` — clearing any
    /// previous error — and settles to `Ready` or `Error`. Rejected with
    /// `OperationInProgress` while another operation is in flight.
    pub fn load(&self, source: impl Into<PathBuf>) -> PipelineTask<MeshSummary> {
        let source = source.into();

        let cancel = {
            let mut inner = self.inner.lock();
            if let Some(operation) = in_flight_operation(&inner.state) {
                return PipelineTask::settled(Err(Error::OperationInProgress {
                    operation: operation.to_string(),
                }));
            }
            inner.state = PipelineState::Loading;
            inner.cancel = CancelToken::new();
            inner.cancel.clone()
        };

        let _ = self.events_tx.send(PipelineEvent::LoadStarted {
            source: source.clone(),
        });

        let (reply, task) = PipelineTask::channel();
        if self
            .jobs
            .send(Job::Load {
                source,
                cancel,
                reply,
            })
            .is_err()
        {
            // Worker is gone; leave a non-busy state behind.
            self.inner.lock().state = PipelineState::Error {
                kind: Error::Cancelled.kind(),
                message: "pipeline worker terminated".to_string(),
            };
        }
        task
    }

    /// Convert the loaded mesh and persist the single-slot artifact
    ///
    /// Requires `Ready`; otherwise fails immediately with `NoMeshLoaded`
    /// and touches neither the state nor any persisted output.
    pub fn convert(&self, target: TargetFormat) -> PipelineTask<PathBuf> {
        let (mesh, cancel) = {
            let mut inner = self.inner.lock();
            match &inner.state {
                PipelineState::Loading | PipelineState::Converting => {
                    let operation = in_flight_operation(&inner.state).unwrap_or("operation");
                    return PipelineTask::settled(Err(Error::OperationInProgress {
                        operation: operation.to_string(),
                    }));
                }
                PipelineState::Ready(mesh) => {
                    let mesh = Arc::clone(mesh);
                    inner.state = PipelineState::Converting;
                    inner.cancel = CancelToken::new();
                    (mesh, inner.cancel.clone())
                }
                PipelineState::Idle | PipelineState::Error { .. } => {
                    return PipelineTask::settled(Err(Error::NoMeshLoaded));
                }
            }
        };

        let _ = self
            .events_tx
            .send(PipelineEvent::ConvertStarted { target });

        let (reply, task) = PipelineTask::channel();
        if self
            .jobs
            .send(Job::Convert {
                target,
                mesh,
                cancel,
                reply,
            })
            .is_err()
        {
            self.inner.lock().state = PipelineState::Error {
                kind: Error::Cancelled.kind(),
                message: "pipeline worker terminated".to_string(),
            };
        }
        task
    }

    /// Current state, as a value
    pub fn current_state(&self) -> PipelineState {
        self.inner.lock().state.clone()
    }

    /// Read view of the loaded mesh, if any
    ///
    /// The pipeline keeps exclusive ownership; callers get a shared
    /// snapshot that stays valid across a later reload.
    pub fn mesh(&self) -> Option<Arc<CanonicalMesh>> {
        self.inner.lock().mesh.clone()
    }

    /// Texture references of the loaded asset, for rendering only
    pub fn textures(&self) -> Vec<TextureRef> {
        self.inner.lock().textures.clone()
    }

    /// Request cancellation of the in-flight operation, if any
    pub fn cancel(&self) {
        self.inner.lock().cancel.cancel();
    }

    /// Take the event receiver; the single presentation layer owns it
    pub fn take_events(&self) -> Option<Receiver<PipelineEvent>> {
        self.events_rx.lock().take()
    }

    /// Where the artifact for `target` is (or would be) written
    pub fn output_path(&self, target: TargetFormat) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", OUTPUT_STEM, target.extension()))
    }
}

impl Default for ConversionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConversionPipeline {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Name of the operation a busy state is running
fn in_flight_operation(state: &PipelineState) -> Option<&'static str> {
    match state {
        PipelineState::Loading => Some("load"),
        PipelineState::Converting => Some("convert"),
        _ => None,
    }
}

/// Worker loop: consumes jobs one at a time, serializing all work
fn run_worker(
    jobs: Receiver<Job>,
    inner: Arc<Mutex<Inner>>,
    events: Sender<PipelineEvent>,
    buffers: ExportBufferPool,
    output_dir: PathBuf,
) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Shutdown => break,
            Job::Load {
                source,
                cancel,
                reply,
            } => {
                let result = decode_job(&source, &cancel);
                match result {
                    Ok(asset) => {
                        let summary = MeshSummary::of(&asset);
                        let LoadedAsset { mesh, textures, .. } = asset;
                        let mesh = Arc::new(mesh);
                        {
                            // Swap-on-completion: the new mesh replaces
                            // the old one in one state assignment.
                            let mut inner = inner.lock();
                            inner.mesh = Some(Arc::clone(&mesh));
                            inner.textures = textures;
                            inner.state = PipelineState::Ready(mesh);
                        }
                        info!(
                            vertices = summary.vertex_count,
                            triangles = summary.triangle_count,
                            "load completed"
                        );
                        let _ = events.send(PipelineEvent::LoadCompleted {
                            summary: summary.clone(),
                        });
                        let _ = reply.send(Ok(summary));
                    }
                    Err(err) => {
                        {
                            let mut inner = inner.lock();
                            inner.state = PipelineState::Error {
                                kind: err.kind(),
                                message: err.to_string(),
                            };
                        }
                        error!(kind = %err.kind(), "load failed: {}", err);
                        let _ = events.send(PipelineEvent::LoadFailed {
                            kind: err.kind(),
                            message: err.to_string(),
                        });
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Job::Convert {
                target,
                mesh,
                cancel,
                reply,
            } => {
                let result = convert_job(&mesh, target, &buffers, &output_dir, &cancel);
                match result {
                    Ok(artifact) => {
                        {
                            // The mesh remains loaded after a conversion.
                            let mut inner = inner.lock();
                            inner.state = PipelineState::Ready(mesh);
                        }
                        info!(artifact = %artifact.display(), "conversion completed");
                        let _ = events.send(PipelineEvent::ConvertCompleted {
                            target,
                            artifact: artifact.clone(),
                        });
                        let _ = reply.send(Ok(artifact));
                    }
                    Err(err) => {
                        {
                            let mut inner = inner.lock();
                            inner.state = PipelineState::Error {
                                kind: err.kind(),
                                message: err.to_string(),
                            };
                        }
                        error!(kind = %err.kind(), "conversion failed: {}", err);
                        let _ = events.send(PipelineEvent::ConvertFailed {
                            kind: err.kind(),
                            message: err.to_string(),
                        });
                        let _ = reply.send(Err(err));
                    }
                }
            }
        }
    }
    debug!("pipeline worker stopped");
}

/// Resolve the decoder from the extension and decode the file
///
/// The registry lookup is the pre-decode gate: an unsupported extension
/// fails here before any bytes are read.
fn decode_job(source: &Path, cancel: &CancelToken) -> Result<LoadedAsset> {
    let decoder = GLOBAL_REGISTRY.for_path(source)?;
    info!(source = %source.display(), decoder = decoder.name(), "loading mesh");
    decoder.decode_file(source, cancel)
}

/// Encode the mesh and persist the artifact through a staging buffer
fn convert_job(
    mesh: &CanonicalMesh,
    target: TargetFormat,
    buffers: &ExportBufferPool,
    output_dir: &Path,
    cancel: &CancelToken,
) -> Result<PathBuf> {
    // The lease scopes the allocator resource: released when this
    // function returns, on the error paths included.
    let mut lease = buffers.acquire()?;

    let bytes = meshport_export::encode(mesh, target, cancel)?;
    let staging = lease.buffer();
    staging.extend_from_slice(&bytes);

    persist_artifact(output_dir, target, staging)
}

/// Write the single-slot artifact, delete-then-write
fn persist_artifact(output_dir: &Path, target: TargetFormat, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| Error::OutputPathFailure {
        path: output_dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let path = output_dir.join(format!("{}.{}", OUTPUT_STEM, target.extension()));
    match std::fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(Error::OutputPathFailure {
                path,
                message: e.to_string(),
            })
        }
    }
    std::fs::write(&path, bytes).map_err(|e| Error::OutputPathFailure {
        path: path.clone(),
        message: e.to_string(),
    })?;

    Ok(path)
}
