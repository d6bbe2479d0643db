//! Playwright-backed [`Rasterizer`]: one node process for the whole run.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use super::script::{
    ensure_node_available, ensure_playwright_available, map_spawn_error, map_worker_error,
    WORKER_SCRIPT,
};
use super::Rasterizer;
use crate::{DcovError, Result, Viewport};

/// Default time allowed for chromium to come up.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default grace period for the worker to exit after a close request.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Screenshots travel base64-encoded on a single line.
const MAX_LINE_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    pub headless: bool,
    /// Directory the worker runs in; `playwright` resolves from its
    /// `node_modules`. Defaults to the current directory.
    pub working_dir: Option<PathBuf>,
    pub launch_timeout: Duration,
    /// Upper bound for a single render, page load included.
    pub render_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            headless: true,
            working_dir: None,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            render_timeout: crate::config::DEFAULT_RENDER_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    id: u64,
    html: &'a str,
    width: u32,
    height: u32,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct WorkerMessage {
    status: String,
    #[serde(default)]
    id: u64,
    png: Option<String>,
    message: Option<String>,
}

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: FramedRead<ChildStdout, LinesCodec>,
    next_id: u64,
}

impl WorkerProcess {
    async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    async fn next_message(&mut self) -> Result<WorkerMessage> {
        loop {
            let line = match self.stdout.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    return Err(DcovError::rasterization(format!(
                        "failed to read from render worker: {e}"
                    )))
                }
                None => {
                    return Err(DcovError::rasterization(
                        "render worker exited unexpectedly",
                    ))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkerMessage>(&line) {
                Ok(msg) => return Ok(msg),
                Err(_) => debug!(line = %line.trim(), "ignoring non-protocol worker output"),
            }
        }
    }
}

/// Owns the node/Playwright worker. Renders are serialized by the mutex;
/// the worker never sees two requests in flight.
pub struct PlaywrightWorker {
    options: WorkerOptions,
    process: Mutex<Option<WorkerProcess>>,
}

impl PlaywrightWorker {
    pub fn new(options: WorkerOptions) -> Self {
        Self {
            options,
            process: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    async fn spawn(&self) -> Result<WorkerProcess> {
        let mut cmd = Command::new(&self.options.node_command);
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }
        cmd.arg("-e")
            .arg(WORKER_SCRIPT)
            .arg(if self.options.headless { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &self.options.node_command))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            DcovError::WorkerLifecycle("render worker stdin unavailable".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            DcovError::WorkerLifecycle("render worker stdout unavailable".to_string())
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "dcov::worker", "{}", line);
                }
            });
        }

        Ok(WorkerProcess {
            child,
            stdin,
            stdout: FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
            next_id: 1,
        })
    }

    async fn await_ready(&self, process: &mut WorkerProcess) -> Result<()> {
        let msg = timeout(self.options.launch_timeout, process.next_message())
            .await
            .map_err(|_| {
                DcovError::WorkerLifecycle(format!(
                    "render worker did not start within {:?}",
                    self.options.launch_timeout
                ))
            })?
            .map_err(|e| DcovError::WorkerLifecycle(e.to_string()))?;

        match msg.status.as_str() {
            "ready" => Ok(()),
            _ => Err(map_worker_error(
                msg.message.as_deref().unwrap_or("worker failed to start"),
            )),
        }
    }
}

#[async_trait]
impl Rasterizer for PlaywrightWorker {
    async fn launch(&self) -> Result<()> {
        let mut guard = self.process.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        ensure_node_available(&self.options.node_command).await?;
        ensure_playwright_available(
            &self.options.node_command,
            self.options.working_dir.as_deref(),
        )
        .await?;

        let mut process = self.spawn().await?;
        if let Err(err) = self.await_ready(&mut process).await {
            let _ = process.child.kill().await;
            return Err(err);
        }

        info!(
            node = %self.options.node_command,
            headless = self.options.headless,
            "render worker launched"
        );
        *guard = Some(process);
        Ok(())
    }

    async fn render(&self, markup: &str, viewport: Viewport) -> Result<Vec<u8>> {
        let mut guard = self.process.lock().await;
        let process = guard
            .as_mut()
            .ok_or_else(|| DcovError::rasterization("render worker is not running"))?;

        let id = process.next_id;
        process.next_id += 1;

        let request = RenderRequest {
            id,
            html: markup,
            width: viewport.width,
            height: viewport.height,
            timeout_ms: self.options.render_timeout.as_millis() as u64,
        };
        let line = serde_json::to_string(&request)?;
        process.send_line(&line).await.map_err(|e| {
            DcovError::rasterization(format!("failed to send render request: {e}"))
        })?;

        let wait_for_reply = async {
            loop {
                let msg = process.next_message().await?;
                if msg.id == id {
                    return Ok::<_, DcovError>(msg);
                }
                // Reply to a request whose caller already gave up.
                debug!(stale_id = msg.id, "discarding stale worker reply");
            }
        };
        let msg: WorkerMessage = timeout(self.options.render_timeout, wait_for_reply)
            .await
            .map_err(|_| {
                DcovError::rasterization(format!(
                    "render timed out after {:?} ({})",
                    self.options.render_timeout, viewport
                ))
            })??;

        if msg.status != "ok" {
            return Err(DcovError::rasterization(
                msg.message.unwrap_or_else(|| format!("worker status {}", msg.status)),
            ));
        }
        let encoded = msg
            .png
            .ok_or_else(|| DcovError::rasterization("worker reply carried no image"))?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| DcovError::rasterization(format!("invalid image payload: {e}")))
    }

    async fn terminate(&self) -> Result<()> {
        let Some(mut process) = self.process.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = process.send_line(r#"{"cmd":"close"}"#).await {
            debug!(error = %e, "render worker stdin already closed");
        }
        drop(process.stdin);

        match timeout(self.options.shutdown_timeout, process.child.wait()).await {
            Ok(Ok(status)) => {
                info!(%status, "render worker terminated");
                Ok(())
            }
            Ok(Err(e)) => Err(DcovError::WorkerLifecycle(format!(
                "failed to wait for render worker: {e}"
            ))),
            Err(_) => {
                warn!(
                    "render worker did not exit within {:?}; killing it",
                    self.options.shutdown_timeout
                );
                process.child.kill().await.map_err(|e| {
                    DcovError::WorkerLifecycle(format!("failed to kill render worker: {e}"))
                })
            }
        }
    }
}
