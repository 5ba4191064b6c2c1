//! Say-selected-text pipeline
//!
//! A hotkey only enqueues a `SpeechRequest`. One worker task drains the
//! queue: it reads the primary selection and, when non-empty, hands it to the
//! speech service. Failures are logged, successes ignored. Because the worker
//! handles one request at a time, overlapping requests speak in order.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Errors from the selection reader or the speech service
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },

    #[error("speech command is empty")]
    EmptyCommand,
}

/// Source of the primary text selection
#[async_trait]
pub trait SelectionSource: Send + Sync {
    /// Current primary selection, `None` when there is none
    async fn primary_text(&self) -> Result<Option<String>, SpeechError>;
}

/// Remote text-to-speech service
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn say_text(&self, text: &str) -> Result<(), SpeechError>;
}

/// A queued request to speak the current selection
#[derive(Debug, Clone, Copy)]
pub struct SpeechRequest {
    pub requested_at: Instant,
}

/// Sending half of the speech queue, held by the key handler
#[derive(Debug, Clone)]
pub struct SpeechQueue {
    tx: mpsc::UnboundedSender<SpeechRequest>,
}

impl SpeechQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SpeechRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a request; returns false if the worker has stopped
    pub fn request(&self) -> bool {
        let sent = self
            .tx
            .send(SpeechRequest {
                requested_at: Instant::now(),
            })
            .is_ok();
        if !sent {
            warn!("speech worker not running, request dropped");
        }
        sent
    }
}

/// Drain the speech queue until every sender is gone
pub async fn run_speech_worker<S, T>(
    mut rx: mpsc::UnboundedReceiver<SpeechRequest>,
    selection: S,
    speech: T,
) where
    S: SelectionSource,
    T: SpeechService,
{
    info!("speech worker started");

    while let Some(request) = rx.recv().await {
        let text = match selection.primary_text().await {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => {
                debug!("primary selection empty, nothing to say");
                continue;
            }
            Err(e) => {
                error!(?e, "failed to read primary selection");
                continue;
            }
        };

        debug!(
            chars = text.chars().count(),
            queued_ms = request.requested_at.elapsed().as_millis() as u64,
            "speaking selection"
        );

        if let Err(e) = speech.say_text(&text).await {
            error!(?e, "speech service error");
        }
    }

    info!("speech worker stopped");
}

/// Reads the selection by running a command such as `xsel -o -p`
#[derive(Debug, Clone)]
pub struct CommandSelection {
    argv: Vec<String>,
}

impl CommandSelection {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl SelectionSource for CommandSelection {
    async fn primary_text(&self) -> Result<Option<String>, SpeechError> {
        let (program, args) = self.argv.split_first().ok_or(SpeechError::EmptyCommand)?;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| SpeechError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SpeechError::Failed {
                program: program.clone(),
                status: output.status.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok((!text.is_empty()).then_some(text))
    }
}

/// Speaks text by piping it to a command such as `espeak --stdin`
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    argv: Vec<String>,
}

impl CommandSpeech {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl SpeechService for CommandSpeech {
    async fn say_text(&self, text: &str) -> Result<(), SpeechError> {
        let (program, args) = self.argv.split_first().ok_or(SpeechError::EmptyCommand)?;
        let spawn_err = |source| SpeechError::Spawn {
            program: program.clone(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await.map_err(spawn_err)?;
        }

        let status = child.wait().await.map_err(spawn_err)?;
        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Failed {
                program: program.clone(),
                status: status.to_string(),
            })
        }
    }
}
