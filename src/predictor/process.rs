//! Predictor gateway backed by one subprocess per call.

use super::models::{
    CrossValidationReport, Prediction, PredictionError, PredictorMode, Prescreen, TrainingReport,
};
use super::output::{parse_cross_validation, parse_prediction, parse_prescreen};
use super::PredictorGateway;
use crate::metrics;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Largest amount of stderr kept for error reports.
const MAX_STDERR_CHARS: usize = 4096;

/// How long output readers may keep going once the predictor has exited.
const OUTPUT_DRAIN_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ProcessPredictorConfig {
    /// Executable to launch, e.g. `python3`.
    pub program: PathBuf,
    /// Optional script passed to the program before the mode arguments.
    pub script: Option<PathBuf>,
    /// Model artifact handed to `evaluate`, `train` and `cross_validate`.
    pub model_path: PathBuf,
    pub timeout: Duration,
}

/// Runs `<program> [script] <mode> <args...>` and reads its stdout line by line.
///
/// A call fails when the process cannot be started, exits non-zero, is still
/// running after the configured timeout (it is killed), or prints output that
/// cannot be read or parsed. No retries are attempted here.
pub struct ProcessPredictor {
    config: ProcessPredictorConfig,
}

struct ProcessOutput {
    lines: Vec<String>,
}

impl ProcessPredictor {
    pub fn new(config: ProcessPredictorConfig) -> Self {
        Self { config }
    }

    fn command(&self, mode: PredictorMode, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.config.program);
        if let Some(script) = &self.config.script {
            cmd.arg(script);
        }
        cmd.arg(mode.as_str())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(
        &self,
        mode: PredictorMode,
        args: Vec<OsString>,
    ) -> Result<ProcessOutput, PredictionError> {
        let started = Instant::now();
        let result = self.run_inner(mode, args).await;
        let status = match &result {
            Ok(_) => "ok",
            Err(PredictionError::Timeout { .. }) => "timeout",
            Err(_) => "error",
        };
        metrics::record_predictor_call(mode, status, started.elapsed());
        result
    }

    async fn run_inner(
        &self,
        mode: PredictorMode,
        args: Vec<OsString>,
    ) -> Result<ProcessOutput, PredictionError> {
        debug!("Launching predictor {:?} in {} mode", self.config.program, mode);

        let mut child = self
            .command(mode, &args)
            .spawn()
            .map_err(|source| PredictionError::Spawn { mode, source })?;

        let stdout_lines = Arc::new(Mutex::new(Vec::new()));
        let stderr_bytes = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(read_lines(stdout, stdout_lines.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_bytes(stderr, stderr_bytes.clone())));

        // The deadline covers the predictor itself. Processes it leaves
        // behind may hold the pipes open long after it has answered.
        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                abort_reader(stdout_task);
                abort_reader(stderr_task);
                return Err(PredictionError::Wait { mode, source });
            }
            Err(_) => {
                warn!(
                    "Predictor {} timed out after {:?}, killing it",
                    mode, self.config.timeout
                );
                let _ = child.start_kill();
                abort_reader(stdout_task);
                abort_reader(stderr_task);
                return Err(PredictionError::Timeout {
                    mode,
                    timeout: self.config.timeout,
                });
            }
        };

        let stdout_read = drain_reader(mode, stdout_task).await;
        // Lossy stderr is acceptable, it only feeds error messages.
        let _ = drain_reader(mode, stderr_task).await;

        if !status.success() {
            let stderr_text = {
                let bytes = stderr_bytes.lock().unwrap();
                String::from_utf8_lossy(&bytes).into_owned()
            };
            let stderr: String = stderr_text.trim().chars().take(MAX_STDERR_CHARS).collect();
            warn!("Predictor {} failed with {}: {}", mode, status, stderr);
            return Err(PredictionError::NonZeroExit {
                mode,
                code: status.code(),
                stderr,
            });
        }

        if let Err(e) = stdout_read {
            return Err(PredictionError::MalformedOutput {
                mode,
                reason: format!("unreadable output: {}", e),
            });
        }

        let lines = std::mem::take(&mut *stdout_lines.lock().unwrap());
        debug!("Predictor {} printed {} lines", mode, lines.len());
        Ok(ProcessOutput { lines })
    }
}

async fn read_lines(stdout: ChildStdout, sink: Arc<Mutex<Vec<String>>>) -> io::Result<()> {
    let mut reader = BufReader::new(stdout).lines();
    while let Some(line) = reader.next_line().await? {
        sink.lock().unwrap().push(line);
    }
    Ok(())
}

async fn read_bytes(mut stderr: ChildStderr, sink: Arc<Mutex<Vec<u8>>>) -> io::Result<()> {
    let mut chunk = [0u8; 1024];
    loop {
        let n = stderr.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        sink.lock().unwrap().extend_from_slice(&chunk[..n]);
    }
}

/// Waits briefly for a reader to reach EOF after the predictor exited.
/// A reader still blocked after the window is abandoned and whatever it
/// collected so far is used.
async fn drain_reader(
    mode: PredictorMode,
    task: Option<JoinHandle<io::Result<()>>>,
) -> io::Result<()> {
    let Some(mut task) = task else {
        return Ok(());
    };
    match tokio::time::timeout(OUTPUT_DRAIN_WINDOW, &mut task).await {
        Ok(Ok(read)) => read,
        Ok(Err(join_error)) => Err(io::Error::other(join_error)),
        Err(_) => {
            debug!(
                "Predictor {} exited but its output pipe is still open, not waiting for EOF",
                mode
            );
            task.abort();
            Ok(())
        }
    }
}

fn abort_reader(task: Option<JoinHandle<io::Result<()>>>) {
    if let Some(task) = task {
        task.abort();
    }
}

#[async_trait]
impl PredictorGateway for ProcessPredictor {
    async fn evaluate(&self, features: &str) -> Result<Prediction, PredictionError> {
        let args = vec![
            OsString::from(features),
            self.config.model_path.clone().into_os_string(),
        ];
        let output = self.run(PredictorMode::Evaluate, args).await?;
        parse_prediction(&output.lines)
    }

    async fn prescreen(&self, clip_path: &Path) -> Result<Prescreen, PredictionError> {
        let output = self
            .run(PredictorMode::Predict, vec![clip_path.as_os_str().to_owned()])
            .await?;
        let prescreen = parse_prescreen(&output.lines)?;
        info!(
            "Prescreened {:?}: passed={} valence={:.2} arousal={:.2} square_sum={:.2}",
            clip_path, prescreen.passed, prescreen.valence, prescreen.arousal, prescreen.square_sum
        );
        Ok(prescreen)
    }

    async fn train(&self, data_path: &Path) -> Result<TrainingReport, PredictionError> {
        let args = vec![
            data_path.as_os_str().to_owned(),
            self.config.model_path.clone().into_os_string(),
        ];
        let output = self.run(PredictorMode::Train, args).await?;
        Ok(TrainingReport {
            output: output.lines,
        })
    }

    async fn cross_validate(
        &self,
        data_path: &Path,
    ) -> Result<CrossValidationReport, PredictionError> {
        let args = vec![
            data_path.as_os_str().to_owned(),
            self.config.model_path.clone().into_os_string(),
        ];
        let output = self.run(PredictorMode::CrossValidate, args).await?;
        parse_cross_validation(&output.lines)
    }
}
