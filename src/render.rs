// src/render.rs
use log::{debug, error, info, warn};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{CommandSpec, RenderSettings};
use crate::errors::{AnimationError, Result};
use crate::models::RenderOutcome;

/// How long output keeps being collected after the interpreter exits. A helper process that
/// inherited the pipes can hold them open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Runs a synthesized script in the configured interpreter under a hard timeout.
#[derive(Debug, Clone)]
pub struct RenderExecutor {
    interpreter: CommandSpec,
    timeout: Duration,
}

impl RenderExecutor {
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            interpreter: settings.python.clone(),
            timeout: settings.timeout(),
        }
    }

    /// Spawns `<interpreter> <script_path>` in `working_dir`.
    ///
    /// A non-zero exit is reported through [`RenderOutcome::exited_cleanly`]; spawn failures and
    /// timeouts are errors. The child is killed if this future is dropped.
    pub async fn execute(&self, script_path: &Path, working_dir: &Path) -> Result<RenderOutcome> {
        let mut cmd = self.interpreter.command();
        cmd.arg(script_path)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Executing render command: {:?}", cmd);
        let mut child = cmd.spawn().map_err(AnimationError::RenderSpawn)?;
        let mut group = ProcessGroupGuard::new(child.id());
        info!("Render process started (pid {:?})", child.id());

        let stdout = OutputCapture::spawn(child.stdout.take());
        let stderr = OutputCapture::spawn(child.stderr.take());

        let start = Instant::now();
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(AnimationError::RenderSpawn)?,
            Err(_) => {
                error!("Render process exceeded {}s, killing it", self.timeout.as_secs());
                return Err(AnimationError::RenderTimeout(self.timeout.as_secs()));
            }
        };
        group.disarm();

        let outcome = RenderOutcome {
            exited_cleanly: status.success(),
            status: status.to_string(),
            stdout: stdout.finish().await,
            stderr: stderr.finish().await,
        };

        info!(
            "Render process finished with {} in {}ms",
            outcome.status,
            start.elapsed().as_millis()
        );
        debug!("Render stdout:\n{}", outcome.stdout);
        if !outcome.stderr.is_empty() {
            if outcome.exited_cleanly {
                debug!("Render stderr:\n{}", outcome.stderr);
            } else {
                warn!("Render stderr:\n{}", outcome.stderr);
            }
        }
        Ok(outcome)
    }
}

/// Collects one output pipe in the background so waiting on the child never depends on EOF.
struct OutputCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl OutputCapture {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let task = reader.map(|mut reader| {
            let sink = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buffer, task }
    }

    /// Waits briefly for EOF, then returns whatever was read.
    async fn finish(mut self) -> String {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(OUTPUT_GRACE, &mut task).await.is_err() {
                debug!("Render output still open after exit, a helper process holds the pipe");
                task.abort();
            }
        }
        let bytes = self.buffer.lock().await;
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Terminates the render's whole process group unless disarmed, so helpers spawned by the
/// interpreter do not outlive a timed-out or abandoned request.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            let result = std::process::Command::new("kill")
                .args(["-TERM", "--", &format!("-{}", pgid)])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if let Err(e) = result {
                warn!("Could not signal render process group {}: {}", pgid, e);
            }
        }
    }
}
