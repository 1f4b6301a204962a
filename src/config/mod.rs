mod file_config;

pub use file_config::{FileConfig, PipelineConfig, PredictorConfig};

use crate::predictor::ProcessPredictorConfig;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PREDICTOR_PROGRAM: &str = "python3";
pub const DEFAULT_MODEL_PATH: &str = "models/rvm_model.joblib";
pub const DEFAULT_PREDICTOR_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_PENDING: usize = 50;
pub const DEFAULT_SQUARE_SUM_THRESHOLD: f64 = 5.0;
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 1.0;

/// Which `CurationStore` implementation backs the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub storage_backend: StorageBackend,
    pub predictor_program: Option<PathBuf>,
    pub predictor_script: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub predictor_timeout_secs: Option<u64>,
    pub max_pending: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: Option<PathBuf>,
    pub storage_backend: StorageBackend,

    // Feature configs (with defaults)
    pub predictor: PredictorSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorSettings {
    pub program: PathBuf,
    pub script: Option<PathBuf>,
    pub model_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PREDICTOR_PROGRAM),
            script: None,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            timeout_secs: DEFAULT_PREDICTOR_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Capacity of the pending queue.
    pub max_pending: usize,
    /// Prescreen `square_sum` must be strictly above this to be admitted.
    pub square_sum_threshold: f64,
    /// Largest squared difference between automated and human rating, per axis.
    pub variance_threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            square_sum_threshold: DEFAULT_SQUARE_SUM_THRESHOLD,
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_pending == 0 {
            bail!("max_pending must be greater than 0");
        }
        if !self.square_sum_threshold.is_finite() || self.square_sum_threshold < 0.0 {
            bail!(
                "square_sum_threshold must be a finite, non-negative number, got {}",
                self.square_sum_threshold
            );
        }
        if !self.variance_threshold.is_finite() || self.variance_threshold < 0.0 {
            bail!(
                "variance_threshold must be a finite, non-negative number, got {}",
                self.variance_threshold
            );
        }
        Ok(())
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let storage_backend = match file.storage_backend {
            Some(s) => parse_storage_backend(&s)
                .ok_or_else(|| anyhow::anyhow!("Unknown storage_backend in config file: {}", s))?,
            None => cli.storage_backend,
        };

        // TOML overrides CLI for each field
        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone());

        if storage_backend == StorageBackend::Sqlite {
            let Some(path) = &db_path else {
                bail!("db_path must be specified via --db-path or in config file when using the sqlite backend");
            };
            if path.is_dir() {
                bail!("db_path is a directory: {:?}", path);
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.is_dir() {
                    bail!("Database directory does not exist: {:?}", parent);
                }
            }
        }

        let predictor_file = file.predictor.unwrap_or_default();
        let defaults = PredictorSettings::default();
        let predictor = PredictorSettings {
            program: predictor_file
                .program
                .map(PathBuf::from)
                .or_else(|| cli.predictor_program.clone())
                .unwrap_or(defaults.program),
            script: predictor_file
                .script
                .map(PathBuf::from)
                .or_else(|| cli.predictor_script.clone()),
            model_path: predictor_file
                .model_path
                .map(PathBuf::from)
                .or_else(|| cli.model_path.clone())
                .unwrap_or(defaults.model_path),
            timeout_secs: predictor_file
                .timeout_secs
                .or(cli.predictor_timeout_secs)
                .unwrap_or(defaults.timeout_secs),
        };
        if predictor.timeout_secs == 0 {
            bail!("predictor timeout_secs must be greater than 0");
        }

        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline = PipelineSettings {
            max_pending: pipeline_file
                .max_pending
                .or(cli.max_pending)
                .unwrap_or(DEFAULT_MAX_PENDING),
            square_sum_threshold: pipeline_file
                .square_sum_threshold
                .unwrap_or(DEFAULT_SQUARE_SUM_THRESHOLD),
            variance_threshold: pipeline_file
                .variance_threshold
                .unwrap_or(DEFAULT_VARIANCE_THRESHOLD),
        };
        pipeline.validate()?;

        Ok(Self {
            db_path,
            storage_backend,
            predictor,
            pipeline,
        })
    }

    pub fn predictor_config(&self) -> ProcessPredictorConfig {
        ProcessPredictorConfig {
            program: self.predictor.program.clone(),
            script: self.predictor.script.clone(),
            model_path: self.predictor.model_path.clone(),
            timeout: Duration::from_secs(self.predictor.timeout_secs),
        }
    }
}

/// Parses a storage backend name using clap's ValueEnum trait.
fn parse_storage_backend(s: &str) -> Option<StorageBackend> {
    StorageBackend::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_storage_backend() {
        assert_eq!(parse_storage_backend("sqlite"), Some(StorageBackend::Sqlite));
        assert_eq!(parse_storage_backend("memory"), Some(StorageBackend::Memory));
        // Case insensitive
        assert_eq!(parse_storage_backend("MEMORY"), Some(StorageBackend::Memory));
        // Invalid
        assert!(parse_storage_backend("postgres").is_none());
    }

    #[test]
    fn test_resolve_defaults() {
        let cli = CliConfig {
            storage_backend: StorageBackend::Memory,
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert!(config.db_path.is_none());
        assert_eq!(config.predictor, PredictorSettings::default());
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.pipeline.max_pending, 50);
        assert_eq!(config.pipeline.square_sum_threshold, 5.0);
        assert_eq!(config.pipeline.variance_threshold, 1.0);
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("curation.db");
        let cli = CliConfig {
            db_path: Some(db_path.clone()),
            storage_backend: StorageBackend::Sqlite,
            predictor_program: Some(PathBuf::from("/usr/bin/python3")),
            predictor_script: Some(PathBuf::from("ml/video_processor.py")),
            model_path: Some(PathBuf::from("/models/m.joblib")),
            predictor_timeout_secs: Some(15),
            max_pending: Some(7),
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_path, Some(db_path));
        assert_eq!(config.predictor.program, PathBuf::from("/usr/bin/python3"));
        assert_eq!(
            config.predictor.script,
            Some(PathBuf::from("ml/video_processor.py"))
        );
        assert_eq!(config.predictor.model_path, PathBuf::from("/models/m.joblib"));
        assert_eq!(config.predictor.timeout_secs, 15);
        assert_eq!(config.pipeline.max_pending, 7);

        let process = config.predictor_config();
        assert_eq!(process.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/should/be/overridden.db")),
            predictor_timeout_secs: Some(15),
            max_pending: Some(7),
            ..Default::default()
        };
        let file_config = FileConfig {
            db_path: Some(
                temp_dir
                    .path()
                    .join("toml.db")
                    .to_string_lossy()
                    .to_string(),
            ),
            predictor: Some(PredictorConfig {
                timeout_secs: Some(45),
                ..Default::default()
            }),
            pipeline: Some(PipelineConfig {
                max_pending: Some(3),
                variance_threshold: Some(0.25),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.db_path, Some(temp_dir.path().join("toml.db")));
        assert_eq!(config.predictor.timeout_secs, 45);
        assert_eq!(config.pipeline.max_pending, 3);
        assert_eq!(config.pipeline.variance_threshold, 0.25);
        // Defaults used when neither specifies
        assert_eq!(config.pipeline.square_sum_threshold, 5.0);
    }

    #[test]
    fn test_resolve_toml_storage_backend() {
        let file_config = FileConfig {
            storage_backend: Some("memory".to_string()),
            ..Default::default()
        };
        let config = AppConfig::resolve(&CliConfig::default(), Some(file_config)).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);

        let file_config = FileConfig {
            storage_backend: Some("redis".to_string()),
            ..Default::default()
        };
        let err = AppConfig::resolve(&CliConfig::default(), Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("Unknown storage_backend"));
    }

    #[test]
    fn test_resolve_missing_db_path_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_path must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/nonexistent/path/curation.db")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_path_is_directory_error() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("is a directory"));
    }

    #[test]
    fn test_resolve_rejects_invalid_pipeline_settings() {
        let cli = CliConfig {
            storage_backend: StorageBackend::Memory,
            max_pending: Some(0),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, None).unwrap_err();
        assert!(err.to_string().contains("max_pending"));

        let file_config = FileConfig {
            pipeline: Some(PipelineConfig {
                square_sum_threshold: Some(f64::NAN),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cli = CliConfig {
            storage_backend: StorageBackend::Memory,
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("square_sum_threshold"));

        let file_config = FileConfig {
            pipeline: Some(PipelineConfig {
                variance_threshold: Some(-1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("variance_threshold"));
    }

    #[test]
    fn test_resolve_rejects_zero_timeout() {
        let cli = CliConfig {
            storage_backend: StorageBackend::Memory,
            predictor_timeout_secs: Some(0),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, None).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }
}
