use affect_curator::classify;
use affect_curator::config::{AppConfig, CliConfig, FileConfig, StorageBackend};
use affect_curator::curation_store::{open_store, CurationStore};
use affect_curator::experiment::{ExperimentError, ExperimentScorer};
use affect_curator::library::{LibraryError, VideoLibrary};
use affect_curator::metrics;
use affect_curator::pipeline::{AffectPipeline, PipelineError};
use affect_curator::predictor::{PredictorGateway, ProcessPredictor};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path = PathBuf::from(s);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path))
}

#[derive(Parser, Debug)]
#[command(name = "affect-curator", version = env!("APP_VERSION"))]
/// Affective rating pipeline for a curated video library.
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite curation database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Storage backend. `memory` keeps nothing between runs.
    #[clap(long, value_enum, default_value = "sqlite")]
    pub storage_backend: StorageBackend,

    /// Executable that runs the predictor (default: python3).
    #[clap(long)]
    pub predictor_program: Option<PathBuf>,

    /// Predictor script passed to the program before the mode arguments.
    #[clap(long)]
    pub predictor_script: Option<PathBuf>,

    /// Model artifact used for evaluation, training and cross-validation.
    #[clap(long)]
    pub model_path: Option<PathBuf>,

    /// Seconds before a predictor call is killed and reported as failed.
    #[clap(long)]
    pub predictor_timeout_secs: Option<u64>,

    /// Capacity of the pending queue.
    #[clap(long)]
    pub max_pending: Option<usize>,

    /// Print Prometheus metrics after the command has run.
    #[clap(long)]
    pub print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            storage_backend: self.storage_backend,
            predictor_program: self.predictor_program.clone(),
            predictor_script: self.predictor_script.clone(),
            model_path: self.model_path.clone(),
            predictor_timeout_secs: self.predictor_timeout_secs,
            max_pending: self.max_pending,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prescreens a clip and queues it for a human rating if it qualifies.
    Submit { clip: String },

    /// Resolves a pending candidate against a human rating.
    #[command(allow_negative_numbers = true)]
    Resolve {
        id: String,
        valence: f64,
        arousal: f64,
    },

    /// Prints the quadrant label of a rating.
    #[command(allow_negative_numbers = true)]
    Classify { valence: f64, arousal: f64 },

    /// Lists candidates awaiting a human rating, oldest first.
    Pending {
        #[clap(long, default_value_t = 50)]
        limit: usize,
        #[clap(long, default_value_t = 0)]
        offset: usize,
    },

    /// Lists library videos.
    Videos {
        #[clap(long, default_value_t = 50)]
        limit: usize,
        #[clap(long, default_value_t = 0)]
        offset: usize,
    },

    ShowVideo { id: String },

    /// Replaces the scores of a video read at `version`.
    #[command(allow_negative_numbers = true)]
    UpdateScores {
        id: String,
        version: i64,
        valence: f64,
        arousal: f64,
    },

    DeleteVideo { id: String },

    /// Picks up to `count` random videos for an experiment session.
    Sample { count: usize },

    /// Scores experiment features against a video and records the evaluation.
    Score { video_id: String, features: String },

    /// Retrains the model from a data set.
    Train {
        #[clap(value_parser = parse_path)]
        data: PathBuf,
    },

    /// Cross-validates the model. Needs at least one recorded evaluation.
    CrossValidate {
        #[clap(value_parser = parse_path)]
        data: PathBuf,
    },
}

/// A command that ended in a fault, printed as `{"error": kind, "message": ...}`.
#[derive(Debug, Serialize)]
struct CommandFailure {
    error: &'static str,
    message: String,
}

impl From<PipelineError> for CommandFailure {
    fn from(e: PipelineError) -> Self {
        Self {
            error: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<LibraryError> for CommandFailure {
    fn from(e: LibraryError) -> Self {
        Self {
            error: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<ExperimentError> for CommandFailure {
    fn from(e: ExperimentError) -> Self {
        Self {
            error: e.kind(),
            message: e.to_string(),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CommandFailure> {
    serde_json::to_value(value).map_err(|e| CommandFailure {
        error: "SerializationFailed",
        message: e.to_string(),
    })
}

fn classification(valence: f64, arousal: f64) -> Value {
    json!({
        "valence": valence,
        "arousal": arousal,
        "label": classify(valence, arousal),
    })
}

/// Resolves configuration and opens the store only for commands that touch
/// persisted state, so `classify` works without a database.
async fn execute(cli_args: CliArgs) -> Result<Result<Value, CommandFailure>> {
    let cli_config = cli_args.to_cli_config();
    let command = match cli_args.command {
        Command::Classify { valence, arousal } => {
            return Ok(Ok(classification(valence, arousal)));
        }
        command => command,
    };

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let store = open_store(&config)?;
    let gateway: Arc<dyn PredictorGateway> =
        Arc::new(ProcessPredictor::new(config.predictor_config()));

    Ok(run_command(command, &config, store, gateway).await)
}

async fn run_command(
    command: Command,
    config: &AppConfig,
    store: Arc<dyn CurationStore>,
    gateway: Arc<dyn PredictorGateway>,
) -> Result<Value, CommandFailure> {
    let pipeline = AffectPipeline::new(store.clone(), gateway.clone(), config.pipeline);
    let library = VideoLibrary::new(store.clone());
    let scorer = ExperimentScorer::new(store, gateway);

    match command {
        Command::Submit { clip } => to_json(&pipeline.submit_candidate(&clip).await?),
        Command::Resolve {
            id,
            valence,
            arousal,
        } => to_json(&pipeline.resolve_candidate(&id, valence, arousal)?),
        Command::Classify { valence, arousal } => Ok(classification(valence, arousal)),
        Command::Pending { limit, offset } => to_json(&pipeline.list_pending(limit, offset)?),
        Command::Videos { limit, offset } => to_json(&library.list(limit, offset)?),
        Command::ShowVideo { id } => to_json(&library.get(&id)?),
        Command::UpdateScores {
            id,
            version,
            valence,
            arousal,
        } => to_json(&library.update_scores(&id, version, valence, arousal)?),
        Command::DeleteVideo { id } => {
            library.delete(&id)?;
            Ok(json!({ "deleted": id }))
        }
        Command::Sample { count } => to_json(&library.random_sample(count)?),
        Command::Score { video_id, features } => {
            to_json(&scorer.score(&video_id, &features).await?)
        }
        Command::Train { data } => to_json(&scorer.train(&data).await?),
        Command::CrossValidate { data } => to_json(&scorer.cross_validate(&data).await?),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli_args = CliArgs::parse();

    // stdout carries the JSON result, logs go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    metrics::init_metrics();

    let print_metrics = cli_args.print_metrics;
    let exit_code = match execute(cli_args).await? {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!("{}: {}", failure.error, failure.message);
            println!("{}", serde_json::to_string_pretty(&failure)?);
            ExitCode::FAILURE
        }
    };

    if print_metrics {
        print!("{}", metrics::gather_text());
    }

    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_classify_needs_no_database() {
        let cli_args = CliArgs::parse_from(["affect-curator", "classify", "6", "4"]);

        let value = execute(cli_args).await.unwrap().unwrap();
        assert_eq!(value["label"], "HALV");
        assert_eq!(value["valence"], 6.0);
    }

    #[tokio::test]
    async fn test_store_commands_still_require_db_path() {
        let cli_args = CliArgs::parse_from(["affect-curator", "videos"]);

        let err = execute(cli_args).await.unwrap_err();
        assert!(err.to_string().contains("db_path must be specified"));
    }

    #[tokio::test]
    async fn test_store_command_reports_domain_error_as_failure() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("curation.db");
        let cli_args = CliArgs::parse_from([
            "affect-curator",
            "--db-path",
            db_path.to_str().unwrap(),
            "show-video",
            "missing",
        ]);

        let failure = execute(cli_args).await.unwrap().unwrap_err();
        assert_eq!(failure.error, "NotFound");
    }
}
