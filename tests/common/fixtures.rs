//! Pipeline harness wired the same way the binary wires it

use super::predictor::ScriptedPredictor;
use affect_curator::config::{AppConfig, CliConfig, PipelineSettings, StorageBackend};
use affect_curator::curation_store::{open_store, CurationStore};
use affect_curator::experiment::ExperimentScorer;
use affect_curator::library::VideoLibrary;
use affect_curator::pipeline::AffectPipeline;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Sqlite,
}

#[allow(dead_code)]
impl Backend {
    pub fn all() -> [Backend; 2] {
        [Backend::Memory, Backend::Sqlite]
    }
}

#[allow(dead_code)]
pub struct TestPipeline {
    /// Keeps the SQLite file alive for the duration of the test
    pub dir: TempDir,
    pub config: AppConfig,
    pub store: Arc<dyn CurationStore>,
    pub predictor: Arc<ScriptedPredictor>,
    pub pipeline: AffectPipeline,
    pub library: VideoLibrary,
    pub scorer: ExperimentScorer,
}

#[allow(dead_code)]
impl TestPipeline {
    pub fn new(backend: Backend) -> Self {
        Self::with_settings(backend, PipelineSettings::default())
    }

    pub fn with_settings(backend: Backend, settings: PipelineSettings) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let cli = CliConfig {
            db_path: Some(dir.path().join("curation.db")),
            storage_backend: match backend {
                Backend::Memory => StorageBackend::Memory,
                Backend::Sqlite => StorageBackend::Sqlite,
            },
            max_pending: Some(settings.max_pending),
            ..Default::default()
        };
        let mut config = AppConfig::resolve(&cli, None).expect("Failed to resolve config");
        config.pipeline = settings;

        let store = open_store(&config).expect("Failed to open store");
        Self::from_store(dir, config, store)
    }

    /// Reopens the same database file, as a restarted process would.
    pub fn reopen(self) -> Self {
        assert_eq!(self.config.storage_backend, StorageBackend::Sqlite);
        let TestPipeline { dir, config, .. } = self;
        let store = open_store(&config).expect("Failed to reopen store");
        Self::from_store(dir, config, store)
    }

    fn from_store(dir: TempDir, config: AppConfig, store: Arc<dyn CurationStore>) -> Self {
        let predictor = Arc::new(ScriptedPredictor::new());
        let pipeline = AffectPipeline::new(store.clone(), predictor.clone(), config.pipeline);
        let library = VideoLibrary::new(store.clone());
        let scorer = ExperimentScorer::new(store.clone(), predictor.clone());
        Self {
            dir,
            config,
            store,
            predictor,
            pipeline,
            library,
            scorer,
        }
    }
}

/// Writes a shell script that plays the external predictor.
/// Returns the path to run with `sh`.
#[cfg(unix)]
#[allow(dead_code)]
pub fn write_predictor_script(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("video_processor.sh");
    std::fs::write(&path, body).expect("Failed to write predictor script");
    path
}
