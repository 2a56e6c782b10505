//! Out-of-process prediction engine.
//!
//! Every prediction runs the configured program once, with the normalized
//! payload appended as a single JSON argument. An [`Invocation`] owns the child
//! and its two output buffers:
//!
//! - [`Invocation::spawn`] moves from idle to spawned, or fails without a
//!   process ever existing.
//! - [`Invocation::finish`] drains stdout and stderr concurrently while
//!   waiting for exit, bounded by the configured timeout. On expiry the child
//!   is killed and reaped.
//! - [`ExitReport::into_outcome`] classifies the exited process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::error::EngineError;
use crate::inference::Predictor;
use crate::models::{NormalizedPayload, PredictionResult};

const READ_CHUNK_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Executable to run, resolved through `PATH` when not absolute.
    pub program: String,
    /// Arguments placed before the payload argument.
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
    /// Per-stream cap on captured output.
    pub max_output_bytes: usize,
}

impl EngineConfig {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Append-only capture of one output stream, capped at `limit` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl StreamBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Appends a chunk, discarding whatever goes past the limit.
    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A live engine process, owned by exactly one request.
pub struct Invocation {
    child: Child,
    program: String,
    started: Instant,
}

impl Invocation {
    pub fn spawn(config: &EngineConfig, argument: &str) -> Result<Self, EngineError> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .arg(argument)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| EngineError::Spawn {
            program: config.program.clone(),
            source,
        })?;
        debug!("engine `{}` spawned (pid {:?})", config.program, child.id());

        Ok(Self {
            child,
            program: config.program.clone(),
            started: Instant::now(),
        })
    }

    /// Waits for the process to exit with both streams fully drained.
    pub async fn finish(
        mut self,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Result<ExitReport, EngineError> {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();
        let child = &mut self.child;

        let streaming = async move {
            let (stdout, stderr, status) = tokio::join!(
                drain(stdout, max_output_bytes),
                drain(stderr, max_output_bytes),
                child.wait(),
            );
            status.map(|status| ExitReport {
                success: status.success(),
                exit_code: status.code(),
                stdout,
                stderr,
            })
        };
        let outcome = tokio::time::timeout(timeout, streaming).await;

        match outcome {
            Ok(Ok(report)) => {
                debug!(
                    "engine `{}` exited with {:?} after {} ms ({} bytes stdout, {} bytes stderr)",
                    self.program,
                    report.exit_code,
                    self.started.elapsed().as_millis(),
                    report.stdout.len(),
                    report.stderr.len()
                );
                Ok(report)
            }
            Ok(Err(e)) => Err(EngineError::Io(e)),
            Err(_) => {
                warn!(
                    "engine `{}` still running after {:?}, killing it",
                    self.program, timeout
                );
                if let Err(e) = self.child.kill().await {
                    warn!("failed to kill engine `{}`: {}", self.program, e);
                }
                Err(EngineError::Timeout(timeout))
            }
        }
    }
}

async fn drain<R>(reader: Option<R>, limit: usize) -> StreamBuffer
where
    R: AsyncRead + Unpin,
{
    let mut buffer = StreamBuffer::new(limit);
    let Some(mut reader) = reader else {
        return buffer;
    };

    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.push(&chunk[..n]),
            Err(e) => {
                warn!("engine stream read failed: {}", e);
                break;
            }
        }
    }
    buffer
}

/// What an exited engine left behind.
#[derive(Debug, Clone)]
pub struct ExitReport {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: StreamBuffer,
    pub stderr: StreamBuffer,
}

impl ExitReport {
    pub fn into_outcome(self) -> Result<PredictionResult, EngineError> {
        if !self.success {
            return Err(EngineError::Failure {
                exit_code: self.exit_code,
                diagnostics: self.stderr.text(),
            });
        }

        if self.stdout.is_truncated() {
            return Err(EngineError::Failure {
                exit_code: self.exit_code,
                diagnostics: format!(
                    "engine output exceeded {} bytes",
                    self.stdout.limit
                ),
            });
        }

        let output = self.stdout.text();
        if output.trim().is_empty() {
            return Err(EngineError::Failure {
                exit_code: self.exit_code,
                diagnostics: self.stderr.text(),
            });
        }

        parse_envelope(&output)
    }
}

fn parse_envelope(output: &str) -> Result<PredictionResult, EngineError> {
    let malformed = |reason: String| EngineError::Malformed {
        reason,
        output: output.to_string(),
    };

    match serde_json::from_str::<Value>(output.trim()) {
        Ok(value @ Value::Object(_)) => {
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
        }
        Ok(other) => Err(malformed(format!("expected a JSON object, got `{}`", other))),
        Err(e) => Err(malformed(e.to_string())),
    }
}

/// Runs the configured command once per prediction.
pub struct SubprocessPredictor {
    config: EngineConfig,
}

impl SubprocessPredictor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Predictor for SubprocessPredictor {
    async fn predict(&self, payload: &NormalizedPayload) -> Result<PredictionResult, EngineError> {
        let argument = payload.to_argument()?;
        let invocation = Invocation::spawn(&self.config, &argument)?;
        let report = invocation
            .finish(self.config.timeout, self.config.max_output_bytes)
            .await?;
        report.into_outcome()
    }

    fn describe(&self) -> String {
        self.config.command_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn buffer(content: &str) -> StreamBuffer {
        let mut buffer = StreamBuffer::new(1024);
        buffer.push(content.as_bytes());
        buffer
    }

    fn report(exit_code: i32, stdout: &str, stderr: &str) -> ExitReport {
        ExitReport {
            success: exit_code == 0,
            exit_code: Some(exit_code),
            stdout: buffer(stdout),
            stderr: buffer(stderr),
        }
    }

    #[test]
    fn stream_buffer_caps_and_flags_overflow() {
        let mut buffer = StreamBuffer::new(8);
        buffer.push(b"abc");
        buffer.push(b"defgh");
        assert!(!buffer.is_truncated());
        buffer.push(b"ij");
        assert!(buffer.is_truncated());
        assert_eq!(buffer.text(), "abcdefgh");
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn successful_exit_with_envelope_is_a_prediction() {
        let outcome = report(0, "{\"prediction\": \">50K\"}\n", "").into_outcome();
        assert_eq!(outcome.unwrap(), PredictionResult::new(">50K"));
    }

    #[test]
    fn extra_envelope_members_are_kept() {
        let outcome = report(0, r#"{"prediction": ">50K", "probability": 0.87}"#, "")
            .into_outcome()
            .unwrap();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"prediction": ">50K", "probability": 0.87})
        );
    }

    #[test]
    fn nonzero_exit_is_a_failure_even_with_valid_output() {
        let outcome = report(2, r#"{"prediction": ">50K"}"#, "warning: stale model").into_outcome();
        match outcome {
            Err(EngineError::Failure {
                exit_code,
                diagnostics,
            }) => {
                assert_eq!(exit_code, Some(2));
                assert_eq!(diagnostics, "warning: stale model");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_output_on_success_is_a_failure_not_malformed() {
        for stdout in ["", " \n\t"] {
            let outcome = report(0, stdout, "nothing to say").into_outcome();
            assert!(
                matches!(outcome, Err(EngineError::Failure { ref diagnostics, .. }) if diagnostics == "nothing to say"),
                "stdout {stdout:?}: {outcome:?}"
            );
        }
    }

    #[test]
    fn unparsable_output_is_malformed() {
        for stdout in ["not json", "{\"prediction\": ", "[\">50K\"]", "{\"label\": \">50K\"}"] {
            let outcome = report(0, stdout, "").into_outcome();
            match outcome {
                Err(EngineError::Malformed { output, .. }) => assert_eq!(output, stdout),
                other => panic!("stdout {stdout:?}: unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn truncated_output_is_a_failure() {
        let mut stdout = StreamBuffer::new(4);
        stdout.push(br#"{"prediction": ">50K"}"#);
        let outcome = ExitReport {
            success: true,
            exit_code: Some(0),
            stdout,
            stderr: StreamBuffer::new(4),
        }
        .into_outcome();
        assert!(matches!(
            outcome,
            Err(EngineError::Failure { ref diagnostics, .. }) if diagnostics == "engine output exceeded 4 bytes"
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn sh(script: &str) -> EngineConfig {
            EngineConfig {
                program: "sh".into(),
                args: vec!["-c".into(), script.into(), "engine".into()],
                working_dir: None,
                timeout: Duration::from_secs(10),
                max_output_bytes: 1024 * 1024,
            }
        }

        fn payload() -> NormalizedPayload {
            let mut fields = Map::new();
            fields.insert("age".into(), json!(39));
            fields.insert("education_num".into(), json!(13));
            fields.insert("sex".into(), json!("Male"));
            NormalizedPayload::new(fields)
        }

        async fn predict(config: EngineConfig) -> Result<PredictionResult, EngineError> {
            SubprocessPredictor::new(config).predict(&payload()).await
        }

        #[actix_web::test]
        async fn relays_the_engine_prediction() {
            let outcome = predict(sh(r#"printf '{"prediction": ">50K"}'"#)).await;
            assert_eq!(outcome.unwrap(), PredictionResult::new(">50K"));
        }

        #[actix_web::test]
        async fn engine_object_is_relayed_whole() {
            let outcome = predict(sh(
                r#"printf '{"prediction": "<=50K", "probability": 0.13, "model": "xgb"}'"#,
            ))
            .await
            .unwrap();
            assert_eq!(outcome.prediction, json!("<=50K"));
            assert_eq!(outcome.extra.get("probability"), Some(&json!(0.13)));
            assert_eq!(outcome.extra.get("model"), Some(&json!("xgb")));
        }

        #[actix_web::test]
        async fn payload_is_the_last_argument() {
            let outcome = predict(sh(r#"printf '{"prediction": %s}' "$1""#)).await.unwrap();
            assert_eq!(
                outcome.prediction,
                json!({"age": 39, "education_num": 13, "sex": "Male"})
            );
        }

        #[actix_web::test]
        async fn nonzero_exit_carries_stderr() {
            let outcome = predict(sh("printf 'model file not found' >&2; exit 1")).await;
            match outcome {
                Err(EngineError::Failure {
                    exit_code,
                    diagnostics,
                }) => {
                    assert_eq!(exit_code, Some(1));
                    assert_eq!(diagnostics, "model file not found");
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        #[actix_web::test]
        async fn silent_success_is_a_failure() {
            let outcome = predict(sh("exit 0")).await;
            assert!(matches!(outcome, Err(EngineError::Failure { exit_code: Some(0), .. })));
        }

        #[actix_web::test]
        async fn text_output_is_malformed() {
            let outcome = predict(sh("echo 'prediction: >50K'")).await;
            assert!(matches!(outcome, Err(EngineError::Malformed { .. })));
        }

        #[actix_web::test]
        async fn missing_program_is_a_dispatch_failure() {
            let mut config = sh("exit 0");
            config.program = "/nonexistent/income-engine".into();
            let err = predict(config).await.unwrap_err();
            assert!(err.is_dispatch_failure(), "{err:?}");
            assert!(matches!(err, EngineError::Spawn { .. }));
        }

        #[actix_web::test]
        async fn hung_engine_is_killed_at_the_deadline() {
            let mut config = sh("exec sleep 30");
            config.timeout = Duration::from_millis(200);
            let started = Instant::now();
            let err = predict(config).await.unwrap_err();
            assert!(matches!(err, EngineError::Timeout(d) if d == Duration::from_millis(200)));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[actix_web::test]
        async fn large_streams_are_drained_concurrently() {
            // Both streams exceed a pipe buffer, so sequential reads would deadlock.
            let script = r#"
                head -c 300000 /dev/zero | tr '\0' 'e' >&2
                printf '{"prediction": "'
                head -c 300000 /dev/zero | tr '\0' 'x'
                printf '"}'
            "#;
            let outcome = predict(sh(script)).await.unwrap();
            assert_eq!(outcome.prediction.as_str().map(str::len), Some(300000));
        }

        #[actix_web::test]
        async fn oversized_output_is_truncated() {
            let mut config = sh("head -c 5000 /dev/zero | tr '\\0' 'x'; head -c 5000 /dev/zero | tr '\\0' 'e' >&2; exit 1");
            config.max_output_bytes = 1024;
            match predict(config).await {
                Err(EngineError::Failure { diagnostics, .. }) => {
                    assert_eq!(diagnostics.len(), 1024);
                    assert!(diagnostics.chars().all(|c| c == 'e'));
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        #[actix_web::test]
        async fn runs_in_the_configured_directory() {
            let mut config = sh(r#"printf '{"prediction": "%s"}' "$(pwd)""#);
            config.working_dir = Some(PathBuf::from("/"));
            let outcome = predict(config).await.unwrap();
            assert_eq!(outcome.prediction, json!("/"));
        }
    }
}
